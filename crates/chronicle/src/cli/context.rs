//! Shared setup for CLI commands.

use chronicle::{
    ArchiveSession, BackendConfig, ChronicleConfig, ChronicleResult, FileSystemStore,
    OpenAiChapterGenerator, RequestLimiter, SessionId, UnitProcessor,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration and stores resolved from the global flags.
pub struct AppContext {
    /// Effective configuration
    pub config: ChronicleConfig,
    /// Session store rooted at the data directory
    pub store: Arc<FileSystemStore>,
}

impl AppContext {
    /// Load configuration and open the data directory.
    pub fn load(config: Option<PathBuf>, data_dir: Option<PathBuf>) -> ChronicleResult<Self> {
        let config = match config {
            Some(path) => ChronicleConfig::from_file(path)?,
            None => ChronicleConfig::load()?,
        };
        let data_dir = data_dir.unwrap_or_else(|| config.storage.resolve_data_dir());
        tracing::debug!(data_dir = %data_dir.display(), "Using data directory");

        let store = Arc::new(FileSystemStore::new(data_dir)?);
        Ok(Self { config, store })
    }

    /// Open the archiver of `session` with the configured backend.
    pub async fn session(
        &self,
        session: &str,
    ) -> ChronicleResult<Arc<ArchiveSession<OpenAiChapterGenerator>>> {
        let generator =
            OpenAiChapterGenerator::new(BackendConfig::from_env()?, &self.config.model.name);
        let processor = UnitProcessor::new(generator, self.config.retry.clone())
            .with_limiter(RequestLimiter::new(&self.config.rate_limit));

        let session = ArchiveSession::open(
            SessionId::new(session),
            Arc::new(processor),
            self.store.clone(),
            self.store.clone(),
            self.config.archive.clone(),
            self.config.model.clone(),
        )
        .await?;
        Ok(Arc::new(session))
    }
}
