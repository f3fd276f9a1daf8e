//! In-memory store.

use async_trait::async_trait;
use chronicle_core::{Chapter, ChatMessage, Checkpoint, RunProgress, SessionId};
use chronicle_error::ChronicleResult;
use chronicle_interface::{CheckpointStore, MessageSource};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local checkpoint store and message log.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    checkpoints: RwLock<HashMap<SessionId, Checkpoint>>,
    messages: RwLock<HashMap<SessionId, Vec<ChatMessage>>>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append messages to a session's log.
    pub async fn append_messages(
        &self,
        session: &SessionId,
        messages: impl IntoIterator<Item = ChatMessage>,
    ) {
        let mut logs = self.messages.write().await;
        logs.entry(session.clone()).or_default().extend(messages);
    }

    /// Snapshot of the stored checkpoint of a session.
    pub async fn checkpoint(&self, session: &SessionId) -> Option<Checkpoint> {
        self.checkpoints.read().await.get(session).cloned()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryStore {
    async fn load_checkpoint(&self, session: &SessionId) -> ChronicleResult<Option<Checkpoint>> {
        Ok(self.checkpoints.read().await.get(session).cloned())
    }

    async fn save_checkpoint(
        &self,
        session: &SessionId,
        checkpoint: &Checkpoint,
    ) -> ChronicleResult<()> {
        self.checkpoints
            .write()
            .await
            .insert(session.clone(), checkpoint.clone());
        Ok(())
    }

    async fn save_chapters(
        &self,
        session: &SessionId,
        chapters: &[Chapter],
    ) -> ChronicleResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.entry(session.clone()).or_default().chapters = chapters.to_vec();
        Ok(())
    }

    async fn save_progress(
        &self,
        session: &SessionId,
        progress: &RunProgress,
    ) -> ChronicleResult<()> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.entry(session.clone()).or_default().progress = progress.clone();
        Ok(())
    }
}

#[async_trait]
impl MessageSource for InMemoryStore {
    async fn load_messages(&self, session: &SessionId) -> ChronicleResult<Vec<ChatMessage>> {
        Ok(self
            .messages
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }
}
