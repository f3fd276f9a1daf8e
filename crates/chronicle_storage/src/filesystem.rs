//! Filesystem-backed store.
//!
//! Every document is written to a temporary sibling and renamed into place, so a
//! crash mid-write leaves the previous version intact.

use async_trait::async_trait;
use chronicle_core::{Chapter, ChatMessage, Checkpoint, RunProgress, SessionId};
use chronicle_error::{ChronicleResult, StorageError, StorageErrorKind};
use chronicle_interface::{CheckpointStore, MessageSource};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

const MESSAGES_FILE: &str = "messages.json";
const CHAPTERS_FILE: &str = "chapters.json";
const PROGRESS_FILE: &str = "progress.json";

/// Filesystem storage backend, one directory per session.
#[derive(Debug, Clone)]
pub struct FileSystemStore {
    base_path: PathBuf,
}

impl FileSystemStore {
    /// Create a new filesystem store.
    ///
    /// Creates the base directory if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    #[tracing::instrument(skip(base_path))]
    pub fn new(base_path: impl Into<PathBuf>) -> ChronicleResult<Self> {
        let base_path = base_path.into();

        std::fs::create_dir_all(&base_path).map_err(|e| {
            StorageError::new(StorageErrorKind::DirectoryCreation(format!(
                "{}: {}",
                base_path.display(),
                e
            )))
        })?;

        tracing::info!(path = %base_path.display(), "Created filesystem store");
        Ok(Self { base_path })
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding one session's documents.
    fn session_dir(&self, session: &SessionId) -> ChronicleResult<PathBuf> {
        let id = session.as_str();
        let valid = !id.is_empty()
            && !id.starts_with('.')
            && !id.contains(['/', '\\'])
            && !id.contains("..");
        if !valid {
            return Err(StorageError::new(StorageErrorKind::InvalidPath(format!(
                "Session id '{}' is not a valid directory name",
                id
            )))
            .into());
        }
        Ok(self.base_path.join(id))
    }

    /// Replace a session's message log.
    #[tracing::instrument(skip(self, messages), fields(session = %session, count = messages.len()))]
    pub async fn import_messages(
        &self,
        session: &SessionId,
        messages: &[ChatMessage],
    ) -> ChronicleResult<()> {
        let dir = self.session_dir(session)?;
        write_document(&dir, MESSAGES_FILE, &messages).await
    }

    /// Append messages to a session's log.
    #[tracing::instrument(skip(self, messages), fields(session = %session, count = messages.len()))]
    pub async fn append_messages(
        &self,
        session: &SessionId,
        messages: &[ChatMessage],
    ) -> ChronicleResult<()> {
        let mut log = self.load_messages(session).await?;
        log.extend_from_slice(messages);
        self.import_messages(session, &log).await
    }
}

/// Read a JSON document, `None` if it does not exist.
async fn read_document<T: DeserializeOwned>(path: &Path) -> ChronicleResult<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StorageError::new(StorageErrorKind::FileRead(format!(
                "{}: {}",
                path.display(),
                e
            )))
            .into());
        }
    };

    let document = serde_json::from_slice(&bytes).map_err(|e| {
        StorageError::new(StorageErrorKind::Serialization(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(Some(document))
}

/// Write a JSON document atomically (temp file + rename).
async fn write_document<T: Serialize + ?Sized>(
    dir: &Path,
    file_name: &str,
    document: &T,
) -> ChronicleResult<()> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        StorageError::new(StorageErrorKind::DirectoryCreation(format!(
            "{}: {}",
            dir.display(),
            e
        )))
    })?;

    let bytes = serde_json::to_vec_pretty(document).map_err(|e| {
        StorageError::new(StorageErrorKind::Serialization(format!(
            "{}: {}",
            file_name, e
        )))
    })?;

    let path = dir.join(file_name);
    let temp_path = dir.join(format!("{}.tmp", file_name));

    tokio::fs::write(&temp_path, &bytes).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            temp_path.display(),
            e
        )))
    })?;

    tokio::fs::rename(&temp_path, &path).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileWrite(format!(
            "{}: {}",
            path.display(),
            e
        )))
    })?;

    tracing::debug!(path = %path.display(), size = bytes.len(), "Wrote document");
    Ok(())
}

#[async_trait]
impl CheckpointStore for FileSystemStore {
    #[tracing::instrument(skip(self), fields(session = %session))]
    async fn load_checkpoint(&self, session: &SessionId) -> ChronicleResult<Option<Checkpoint>> {
        let dir = self.session_dir(session)?;
        let chapters: Option<Vec<Chapter>> = read_document(&dir.join(CHAPTERS_FILE)).await?;
        let progress: Option<RunProgress> = read_document(&dir.join(PROGRESS_FILE)).await?;

        if chapters.is_none() && progress.is_none() {
            tracing::debug!("No checkpoint on disk");
            return Ok(None);
        }

        Ok(Some(Checkpoint {
            chapters: chapters.unwrap_or_default(),
            progress: progress.unwrap_or_default(),
        }))
    }

    #[tracing::instrument(skip(self, checkpoint), fields(session = %session))]
    async fn save_checkpoint(
        &self,
        session: &SessionId,
        checkpoint: &Checkpoint,
    ) -> ChronicleResult<()> {
        let dir = self.session_dir(session)?;
        write_document(&dir, CHAPTERS_FILE, &checkpoint.chapters).await?;
        write_document(&dir, PROGRESS_FILE, &checkpoint.progress).await
    }

    #[tracing::instrument(skip(self, chapters), fields(session = %session, count = chapters.len()))]
    async fn save_chapters(
        &self,
        session: &SessionId,
        chapters: &[Chapter],
    ) -> ChronicleResult<()> {
        let dir = self.session_dir(session)?;
        write_document(&dir, CHAPTERS_FILE, chapters).await
    }

    #[tracing::instrument(skip(self, progress), fields(session = %session, next_index = progress.next_index))]
    async fn save_progress(
        &self,
        session: &SessionId,
        progress: &RunProgress,
    ) -> ChronicleResult<()> {
        let dir = self.session_dir(session)?;
        write_document(&dir, PROGRESS_FILE, progress).await
    }
}

#[async_trait]
impl MessageSource for FileSystemStore {
    #[tracing::instrument(skip(self), fields(session = %session))]
    async fn load_messages(&self, session: &SessionId) -> ChronicleResult<Vec<ChatMessage>> {
        let dir = self.session_dir(session)?;
        Ok(read_document(&dir.join(MESSAGES_FILE))
            .await?
            .unwrap_or_default())
    }
}
