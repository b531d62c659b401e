pub mod autopilot;
pub mod index;
pub mod keys;
pub mod memory;

pub use autopilot::AutopilotCommand;
pub use index::IndexCommand;
pub use keys::KeysCommand;
pub use memory::MemoryCommand;
