//! Archiver error types.

/// Specific error conditions raised by the archiver pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
pub enum ArchiveErrorKind {
    /// No candidate messages remain after the watermark
    #[display("No messages to archive")]
    EmptyInput,
    /// Operation is not allowed in the current run phase
    #[display("Cannot {} while run is {}", operation, phase)]
    InvalidPhase {
        /// Operation that was attempted
        operation: String,
        /// Phase the run was in
        phase: String,
    },
    /// Another call is already driving the run loop
    #[display("A run is already in progress")]
    RunInProgress,
    /// Index does not address an element of the list
    #[display("Index {} out of range (length {})", index, len)]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Length of the list
        len: usize,
    },
    /// No chapter carries the given chapter number
    #[display("Chapter {} not found", _0)]
    ChapterNotFound(u32),
    /// Chapter is being regenerated and cannot be edited
    #[display("Chapter {} is being processed and cannot be modified", _0)]
    ChapterLocked(u32),
    /// A retry for this chapter is already running
    #[display("Retry already in flight for chapter {}", _0)]
    RetryInFlight(u32),
    /// Chapter carries no source span to rebuild its chunk from
    #[display("Chapter {} has no recoverable source messages", _0)]
    MissingSource(u32),
}

/// Error type for archiver operations.
///
/// # Examples
///
/// ```
/// use chronicle_error::{ArchiveError, ArchiveErrorKind};
///
/// let err = ArchiveError::new(ArchiveErrorKind::ChapterNotFound(3));
/// assert!(format!("{}", err).contains("Chapter 3 not found"));
/// ```
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Archive Error: {} at line {} in {}", kind, line, file)]
pub struct ArchiveError {
    /// The specific error condition
    pub kind: ArchiveErrorKind,
    /// Line number where the error occurred
    pub line: u32,
    /// Source file where the error occurred
    pub file: &'static str,
}

impl ArchiveError {
    /// Create a new ArchiveError with automatic location tracking.
    #[track_caller]
    pub fn new(kind: ArchiveErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Shorthand for an [`ArchiveErrorKind::InvalidPhase`] error.
    #[track_caller]
    pub fn invalid_phase(operation: impl Into<String>, phase: impl ToString) -> Self {
        Self::new(ArchiveErrorKind::InvalidPhase {
            operation: operation.into(),
            phase: phase.to_string(),
        })
    }
}
