//! Autonomous conversation loop
//!
//! Repeatedly feeds a fixed prompt through a [`ChatOrchestrator`] for one
//! owner. Each loop is owned by the handle returned from
//! [`AutonomousLoop::spawn`]; there is no process-wide registry.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, warn};

use crate::chat::{ChatOrchestrator, ChatReply};
use crate::config::AutonomyConfig;
use crate::error::{NeuralicError, Result};

/// Loop timing and limits
#[derive(Debug, Clone)]
pub struct AutonomyOptions {
    /// Pause between the end of one turn and the start of the next
    pub interval: Duration,
    /// Replies buffered before the loop waits for the consumer
    pub channel_capacity: usize,
    /// Stop after this many turns (successful or not)
    pub max_turns: Option<u64>,
}

impl Default for AutonomyOptions {
    fn default() -> Self {
        Self::from_config(&AutonomyConfig::default())
    }
}

impl AutonomyOptions {
    pub fn from_config(config: &AutonomyConfig) -> Self {
        Self {
            interval: Duration::from_secs(config.interval_secs),
            channel_capacity: config.channel_capacity.max(1),
            max_turns: None,
        }
    }
}

/// Counters reported when a loop ends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopSummary {
    pub turns: u64,
    pub failures: u64,
}

/// Spawns autonomous loops
pub struct AutonomousLoop;

impl AutonomousLoop {
    /// Start a loop for `owner` and return its handle plus the reply stream.
    ///
    /// The stream ends when the loop stops.
    pub fn spawn(
        orchestrator: ChatOrchestrator,
        owner: impl Into<String>,
        prompt: impl Into<String>,
        options: AutonomyOptions,
    ) -> (AutonomousHandle, mpsc::Receiver<ChatReply>) {
        let (tx, rx) = mpsc::channel(options.channel_capacity.max(1));
        let cancel = CancellationToken::new();
        let owner = owner.into();
        let prompt = prompt.into();

        info!(
            "Starting autonomous loop for owner {} every {:?}",
            owner, options.interval
        );

        let join = tokio::spawn(run_loop(
            orchestrator,
            owner,
            prompt,
            options,
            tx,
            cancel.clone(),
        ));

        let handle = AutonomousHandle {
            _guard: cancel.clone().drop_guard(),
            cancel,
            join,
        };
        (handle, rx)
    }
}

/// Owner of a running loop. Dropping it cancels the loop.
#[derive(Debug)]
pub struct AutonomousHandle {
    cancel: CancellationToken,
    _guard: DropGuard,
    join: JoinHandle<LoopSummary>,
}

impl AutonomousHandle {
    /// Whether the loop task has exited
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Cancel the loop and wait for it to exit
    pub async fn stop(self) -> Result<LoopSummary> {
        self.cancel.cancel();
        self.join
            .await
            .map_err(|e| NeuralicError::Server(format!("autonomous loop task failed: {e}")))
    }

    /// Wait for the loop to exit on its own (turn limit or closed stream)
    pub async fn join(self) -> Result<LoopSummary> {
        self.join
            .await
            .map_err(|e| NeuralicError::Server(format!("autonomous loop task failed: {e}")))
    }
}

async fn run_loop(
    orchestrator: ChatOrchestrator,
    owner: String,
    prompt: String,
    options: AutonomyOptions,
    tx: mpsc::Sender<ChatReply>,
    cancel: CancellationToken,
) -> LoopSummary {
    let mut summary = LoopSummary::default();

    loop {
        if options.max_turns.is_some_and(|max| summary.turns >= max) {
            break;
        }

        let turn = tokio::select! {
            _ = cancel.cancelled() => break,
            turn = orchestrator.respond(&owner, &prompt) => turn,
        };
        summary.turns += 1;

        match turn {
            Ok(reply) => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    sent = tx.send(reply) => {
                        if sent.is_err() {
                            debug!("Reply stream for owner {} closed", owner);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                summary.failures += 1;
                warn!("Autonomous turn {} for owner {} failed: {}", summary.turns, owner, e);
            }
        }

        if options.max_turns.is_some_and(|max| summary.turns >= max) {
            break;
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.interval) => {}
        }
    }

    info!(
        "Autonomous loop for owner {} stopped after {} turns ({} failed)",
        owner, summary.turns, summary.failures
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::chat::ChatError;
    use crate::memory::{MemoryStore, StoreOptions};
    use crate::storage::InMemoryIndex;
    use crate::testing::{MockEmbeddingProvider, ScriptedChatModel};

    fn orchestrator(model: ScriptedChatModel) -> ChatOrchestrator {
        let memory = MemoryStore::new(
            Arc::new(MockEmbeddingProvider::new()),
            Arc::new(InMemoryIndex::new()),
            StoreOptions::default(),
        );
        ChatOrchestrator::new(memory, Arc::new(model), "system")
    }

    fn options(interval_ms: u64, max_turns: Option<u64>) -> AutonomyOptions {
        AutonomyOptions {
            interval: Duration::from_millis(interval_ms),
            channel_capacity: 4,
            max_turns,
        }
    }

    #[tokio::test]
    async fn test_loop_runs_until_turn_limit() {
        let (handle, mut rx) = AutonomousLoop::spawn(
            orchestrator(ScriptedChatModel::new()),
            "alice",
            "think",
            options(5, Some(3)),
        );

        let mut replies = Vec::new();
        while let Some(reply) = rx.recv().await {
            replies.push(reply.reply);
        }

        assert_eq!(replies, vec!["echo: think"; 3]);
        let summary = handle.join().await.unwrap();
        assert_eq!(summary, LoopSummary { turns: 3, failures: 0 });
    }

    #[tokio::test]
    async fn test_failed_turn_does_not_stop_loop() {
        let model = ScriptedChatModel::new()
            .with_error(ChatError::Network("connection reset".to_string()))
            .with_reply("recovered");
        let (handle, mut rx) =
            AutonomousLoop::spawn(orchestrator(model), "alice", "think", options(5, Some(2)));

        let first = rx.recv().await.unwrap();
        assert_eq!(first.reply, "recovered");
        assert!(rx.recv().await.is_none());

        let summary = handle.join().await.unwrap();
        assert_eq!(summary, LoopSummary { turns: 2, failures: 1 });
    }

    #[tokio::test]
    async fn test_stop_cancels_sleeping_loop() {
        let (handle, mut rx) = AutonomousLoop::spawn(
            orchestrator(ScriptedChatModel::new()),
            "alice",
            "think",
            options(60_000, None),
        );

        assert!(rx.recv().await.is_some());

        let summary = tokio::time::timeout(Duration::from_secs(1), handle.stop())
            .await
            .expect("stop should not wait for the interval")
            .unwrap();
        assert_eq!(summary.turns, 1);
    }

    #[tokio::test]
    async fn test_dropping_handle_cancels_loop() {
        let (handle, mut rx) = AutonomousLoop::spawn(
            orchestrator(ScriptedChatModel::new()),
            "alice",
            "think",
            options(60_000, None),
        );

        assert!(rx.recv().await.is_some());
        drop(handle);

        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("stream should close once the handle is dropped");
        assert!(next.is_none());
    }

    #[tokio::test]
    async fn test_closed_stream_ends_loop() {
        let (handle, rx) = AutonomousLoop::spawn(
            orchestrator(ScriptedChatModel::new()),
            "alice",
            "think",
            options(5, None),
        );
        drop(rx);

        let summary = tokio::time::timeout(Duration::from_secs(1), handle.join())
            .await
            .expect("loop should notice the closed stream")
            .unwrap();
        assert_eq!(summary.turns, 1);
    }

    #[tokio::test]
    async fn test_zero_turn_limit_runs_nothing() {
        let (handle, mut rx) = AutonomousLoop::spawn(
            orchestrator(ScriptedChatModel::new()),
            "alice",
            "think",
            options(5, Some(0)),
        );

        assert!(rx.recv().await.is_none());
        let summary = handle.join().await.unwrap();
        assert_eq!(summary, LoopSummary::default());
    }
}
