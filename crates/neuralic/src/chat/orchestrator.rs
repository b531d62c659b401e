use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use super::{ChatMessage, ChatModel, OpenAiChat};
use crate::config::Config;
use crate::error::Result;
use crate::memory::{MemoryError, MemoryStore, Owner};

/// Answer to one conversational turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: String,
    /// Memory texts placed in the prompt, best match first
    pub memories_used: Vec<String>,
}

/// Runs a conversational turn: recall, complete, remember.
#[derive(Clone)]
pub struct ChatOrchestrator {
    memory: MemoryStore,
    model: Arc<dyn ChatModel>,
    system_prompt: String,
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator")
            .field("memory", &self.memory)
            .field("model", &self.model.name())
            .finish()
    }
}

impl ChatOrchestrator {
    pub fn new(
        memory: MemoryStore,
        model: Arc<dyn ChatModel>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            memory,
            model,
            system_prompt: system_prompt.into(),
        }
    }

    /// Build the configured chat backend around an existing memory store
    pub fn from_config(config: &Config, memory: MemoryStore) -> Result<Self> {
        let model = Arc::new(OpenAiChat::from_env(&config.chat)?);
        Ok(Self::new(memory, model, config.chat.system_prompt.clone()))
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Answer `message` for `owner` using their most relevant memories.
    ///
    /// Retrieval and remembering failures are logged and do not fail the
    /// turn; a chat model failure does.
    pub async fn respond(&self, owner: &str, message: &str) -> Result<ChatReply> {
        let owner = Owner::try_from(owner)?;
        if message.trim().is_empty() {
            return Err(MemoryError::InvalidArgument("message cannot be empty".to_string()).into());
        }

        let memories_used = match self
            .memory
            .query(owner.as_str(), message, self.memory.default_top_k())
            .await
        {
            Ok(memories) => memories,
            Err(e) => {
                warn!("Memory lookup failed for owner {}: {}", owner, e);
                Vec::new()
            }
        };

        let prompt = self.build_prompt(&memories_used, message);
        let reply = self.model.complete(&prompt).await?;
        debug!(
            "Owner {} got a {}-char reply using {} memories",
            owner,
            reply.len(),
            memories_used.len()
        );

        self.remember(&owner, &format!("user: {message}")).await;
        self.remember(&owner, &format!("assistant: {reply}")).await;

        Ok(ChatReply {
            reply,
            memories_used,
        })
    }

    fn build_prompt(&self, memories: &[String], message: &str) -> Vec<ChatMessage> {
        let context = if memories.is_empty() {
            "No memory found.".to_string()
        } else {
            format!("Relevant memories:\n{}", memories.join("\n"))
        };

        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::system(context),
            ChatMessage::user(message),
        ]
    }

    async fn remember(&self, owner: &Owner, text: &str) {
        if let Err(e) = self.memory.store(owner.as_str(), text).await {
            warn!("Failed to remember turn for owner {}: {}", owner, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatError;
    use crate::error::NeuralicError;
    use crate::memory::StoreOptions;
    use crate::storage::{InMemoryIndex, VectorIndex};
    use crate::testing::{FailingIndex, MockEmbeddingProvider, ScriptedChatModel};

    const SYSTEM: &str = "You are a helpful AI assistant with memory.";

    fn orchestrator(
        index: Arc<dyn VectorIndex>,
        model: Arc<ScriptedChatModel>,
    ) -> ChatOrchestrator {
        let memory = MemoryStore::new(
            Arc::new(MockEmbeddingProvider::new()),
            index,
            StoreOptions::default(),
        );
        ChatOrchestrator::new(memory, model, SYSTEM)
    }

    #[tokio::test]
    async fn test_first_turn_has_no_memory() {
        let model = Arc::new(ScriptedChatModel::new().with_reply("Hi there"));
        let orch = orchestrator(Arc::new(InMemoryIndex::new()), model.clone());

        let reply = orch.respond("alice", "hello").await.unwrap();

        assert_eq!(reply.reply, "Hi there");
        assert!(reply.memories_used.is_empty());

        let prompt = &model.prompts()[0];
        assert_eq!(prompt.len(), 3);
        assert_eq!(prompt[0], ChatMessage::system(SYSTEM));
        assert_eq!(prompt[1], ChatMessage::system("No memory found."));
        assert_eq!(prompt[2], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn test_turn_is_remembered() {
        let index = Arc::new(InMemoryIndex::new());
        let model = Arc::new(ScriptedChatModel::new().with_reply("Noted"));
        let orch = orchestrator(index.clone(), model.clone());

        orch.respond("alice", "my cat is Tom").await.unwrap();

        let texts: Vec<String> = index
            .entries()
            .await
            .iter()
            .filter_map(|e| e.metadata.get("text").and_then(|v| v.as_str()))
            .map(str::to_string)
            .collect();
        assert_eq!(texts, vec!["user: my cat is Tom", "assistant: Noted"]);

        let second = orch.respond("alice", "my cat is Tom").await.unwrap();
        assert!(second.memories_used.contains(&"user: my cat is Tom".to_string()));
        assert!(model.prompts()[1][1].content.starts_with("Relevant memories:\n"));
    }

    #[tokio::test]
    async fn test_memory_failure_degrades_to_empty_context() {
        let model = Arc::new(ScriptedChatModel::new().with_reply("still here"));
        let orch = orchestrator(Arc::new(FailingIndex), model.clone());

        let reply = orch.respond("alice", "hello").await.unwrap();

        assert_eq!(reply.reply, "still here");
        assert!(reply.memories_used.is_empty());
        assert_eq!(model.prompts()[0][1].content, "No memory found.");
    }

    #[tokio::test]
    async fn test_chat_failure_is_returned() {
        let index = Arc::new(InMemoryIndex::new());
        let model = Arc::new(
            ScriptedChatModel::new().with_error(ChatError::Api("API returned 500".to_string())),
        );
        let orch = orchestrator(index.clone(), model);

        let err = orch.respond("alice", "hello").await.unwrap_err();

        assert!(matches!(err, NeuralicError::Chat(_)));
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected() {
        let model = Arc::new(ScriptedChatModel::new());
        let orch = orchestrator(Arc::new(InMemoryIndex::new()), model.clone());

        let err = orch.respond("alice", "   ").await.unwrap_err();

        assert!(matches!(
            err,
            NeuralicError::Memory(MemoryError::InvalidArgument(_))
        ));
        assert!(model.prompts().is_empty());
    }
}
