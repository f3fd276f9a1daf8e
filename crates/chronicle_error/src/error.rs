//! Top-level error wrapper types.

use crate::{
    ArchiveError, ArchiveErrorKind, BackendError, BuilderError, ConfigError, JsonError,
    ModelsError, StorageError,
};

/// Every error condition the Chronicle workspace can surface.
///
/// # Examples
///
/// ```
/// use chronicle_error::{ChronicleError, BackendError};
///
/// let backend_err = BackendError::new("Connection reset");
/// let err: ChronicleError = backend_err.into();
/// assert!(format!("{}", err).contains("Backend Error"));
/// ```
#[derive(Debug, derive_more::From, derive_more::Display, derive_more::Error)]
pub enum ChronicleErrorKind {
    /// Archiver pipeline error
    #[from(ArchiveError)]
    Archive(ArchiveError),
    /// Checkpoint or message store error
    #[from(StorageError)]
    Storage(StorageError),
    /// Generation backend error
    #[from(BackendError)]
    Backend(BackendError),
    /// HTTP backend client error
    #[from(ModelsError)]
    Models(ModelsError),
    /// JSON serialization/deserialization error
    #[from(JsonError)]
    Json(JsonError),
    /// Configuration error
    #[from(ConfigError)]
    Config(ConfigError),
    /// Builder error
    #[from(BuilderError)]
    Builder(BuilderError),
}

/// Chronicle error with kind discrimination.
///
/// # Examples
///
/// ```
/// use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};
///
/// fn prepare() -> ChronicleResult<()> {
///     Err(ArchiveError::new(ArchiveErrorKind::EmptyInput))?
/// }
///
/// let err = prepare().unwrap_err();
/// assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::EmptyInput));
/// ```
#[derive(Debug, derive_more::Display, derive_more::Error)]
#[display("Chronicle Error: {}", _0)]
pub struct ChronicleError(Box<ChronicleErrorKind>);

impl ChronicleError {
    /// Create a new error from a kind.
    pub fn new(kind: ChronicleErrorKind) -> Self {
        Self(Box::new(kind))
    }

    /// Get the error kind.
    pub fn kind(&self) -> &ChronicleErrorKind {
        &self.0
    }

    /// The archiver condition behind this error, if it is one.
    pub fn archive_kind(&self) -> Option<&ArchiveErrorKind> {
        match self.kind() {
            ChronicleErrorKind::Archive(err) => Some(&err.kind),
            _ => None,
        }
    }

    /// Whether the error means "there was nothing to archive".
    pub fn is_empty_input(&self) -> bool {
        matches!(self.archive_kind(), Some(ArchiveErrorKind::EmptyInput))
    }
}

// Generic From implementation for any type that converts to ChronicleErrorKind
impl<T> From<T> for ChronicleError
where
    T: Into<ChronicleErrorKind>,
{
    fn from(err: T) -> Self {
        Self::new(err.into())
    }
}

/// Result type for Chronicle operations.
pub type ChronicleResult<T> = std::result::Result<T, ChronicleError>;
