//! One archiver per chat session.

use crate::{ArchiveSession, UnitProcessor};
use chronicle_core::{ModelConfig, SessionId};
use chronicle_error::ChronicleResult;
use chronicle_interface::{ChapterGenerator, CheckpointStore, MessageSource};
use chronicle_rate_limit::ArchiveSettings;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Opens and caches [`ArchiveSession`]s that share a backend and stores.
///
/// Sessions never interact; each has its own run state and lock.
pub struct SessionRegistry<G: ChapterGenerator> {
    processor: Arc<UnitProcessor<G>>,
    store: Arc<dyn CheckpointStore>,
    source: Arc<dyn MessageSource>,
    settings: ArchiveSettings,
    model: ModelConfig,
    sessions: Mutex<HashMap<SessionId, Arc<ArchiveSession<G>>>>,
}

impl<G: ChapterGenerator> SessionRegistry<G> {
    /// Create an empty registry.
    pub fn new(
        processor: Arc<UnitProcessor<G>>,
        store: Arc<dyn CheckpointStore>,
        source: Arc<dyn MessageSource>,
        settings: ArchiveSettings,
        model: ModelConfig,
    ) -> Self {
        Self {
            processor,
            store,
            source,
            settings,
            model,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// The session's archiver, opened from its checkpoint on first use.
    pub async fn session(&self, session_id: &SessionId) -> ChronicleResult<Arc<ArchiveSession<G>>> {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.get(session_id) {
            return Ok(Arc::clone(session));
        }

        let session = Arc::new(
            ArchiveSession::open(
                session_id.clone(),
                Arc::clone(&self.processor),
                Arc::clone(&self.store),
                Arc::clone(&self.source),
                self.settings.clone(),
                self.model.clone(),
            )
            .await?,
        );
        tracing::debug!(session = %session_id, "Opened archive session");
        sessions.insert(session_id.clone(), Arc::clone(&session));
        Ok(session)
    }

    /// The session's archiver if it is open.
    pub async fn get(&self, session_id: &SessionId) -> Option<Arc<ArchiveSession<G>>> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    /// Drop the cached archiver; the next [`session`](Self::session) call reopens it.
    pub async fn close(&self, session_id: &SessionId) -> Option<Arc<ArchiveSession<G>>> {
        self.sessions.lock().await.remove(session_id)
    }

    /// Ids of the open sessions, sorted.
    pub async fn session_ids(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }
}
