//! Errors raised by the data model builders.

use derive_builder::UninitializedFieldError;

/// What a builder could not produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash, derive_more::Display)]
pub enum BuilderErrorKind {
    /// A field without a default was never set
    #[display("Required field '{}' was not set", _0)]
    MissingField(&'static str),
}

/// Builder error with location tracking.
///
/// Every builder in the workspace returns this instead of a generated error type,
/// so `build()?` works in functions returning `ChronicleResult`.
#[derive(Debug, Clone, derive_more::Display, derive_more::Error)]
#[display("Builder Error: {} at line {} in {}", kind, line, file)]
pub struct BuilderError {
    kind: BuilderErrorKind,
    line: u32,
    file: &'static str,
}

impl BuilderError {
    /// Create a new builder error with caller location tracking.
    #[track_caller]
    pub fn new(kind: BuilderErrorKind) -> Self {
        let location = std::panic::Location::caller();
        Self {
            kind,
            line: location.line(),
            file: location.file(),
        }
    }

    /// Get the error kind.
    pub fn kind(&self) -> &BuilderErrorKind {
        &self.kind
    }
}

impl From<UninitializedFieldError> for BuilderError {
    #[track_caller]
    fn from(err: UninitializedFieldError) -> Self {
        Self::new(BuilderErrorKind::MissingField(err.field_name()))
    }
}
