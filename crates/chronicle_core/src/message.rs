//! Chat message and session identifier types.

use chrono::{DateTime, Utc};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// One entry of a session's append-only message log.
///
/// # Examples
///
/// ```
/// use chronicle_core::ChatMessageBuilder;
/// use chrono::Utc;
///
/// let message = ChatMessageBuilder::default()
///     .id("m-1")
///     .author("Ada")
///     .content("The engine hums.")
///     .timestamp(Utc::now())
///     .build()
///     .unwrap();
///
/// assert_eq!(message.author, "Ada");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "chronicle_error::BuilderError"))]
pub struct ChatMessage {
    /// Stable message identifier
    pub id: String,
    /// Display name of the sender
    pub author: String,
    /// Message text
    pub content: String,
    /// When the message was sent
    pub timestamp: DateTime<Utc>,
}

/// Identifies one chat session; each session owns an independent archive.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
