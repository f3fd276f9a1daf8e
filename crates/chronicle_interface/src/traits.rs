//! Trait definitions for archiver collaborators.

use async_trait::async_trait;
use chronicle_core::{
    Chapter, ChapterRequest, ChapterResponse, ChatMessage, Checkpoint, RunProgress, SessionId,
};
use chronicle_error::ChronicleResult;

/// Text-generation backend that turns one chunk transcript into chapter output.
///
/// Implementations should request schema-constrained JSON where the provider
/// supports it, but may return free text; the caller normalizes and parses it.
/// Transport failures, refusals and malformed output are all plain errors.
#[async_trait]
pub trait ChapterGenerator: Send + Sync {
    /// Generate chapter output for a chunk.
    async fn generate(&self, req: &ChapterRequest) -> ChronicleResult<ChapterResponse>;

    /// Provider name (e.g., "openai", "mock").
    fn provider_name(&self) -> &'static str;

    /// Default model identifier of the backend.
    fn model_name(&self) -> &str;
}

/// Durable, session-scoped record of run progress and chapters.
///
/// Called after every committed chunk, so the partial writes should be cheap.
/// `save_chapters` and `save_progress` must each leave the other half of the
/// checkpoint untouched.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Load the checkpoint of a session, `None` if nothing was saved yet.
    async fn load_checkpoint(&self, session: &SessionId) -> ChronicleResult<Option<Checkpoint>>;

    /// Replace the whole checkpoint.
    async fn save_checkpoint(
        &self,
        session: &SessionId,
        checkpoint: &Checkpoint,
    ) -> ChronicleResult<()>;

    /// Overwrite only the chapter list.
    async fn save_chapters(&self, session: &SessionId, chapters: &[Chapter])
    -> ChronicleResult<()>;

    /// Overwrite only the run progress (next index, watermark, run record).
    async fn save_progress(
        &self,
        session: &SessionId,
        progress: &RunProgress,
    ) -> ChronicleResult<()>;
}

/// Read access to a session's append-only message log.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// All messages of the session, in log order.
    async fn load_messages(&self, session: &SessionId) -> ChronicleResult<Vec<ChatMessage>>;
}
