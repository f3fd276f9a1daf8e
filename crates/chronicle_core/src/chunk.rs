//! Chunks: contiguous slices of the message log proposed as one unit of work.

use crate::{ChatMessage, MessageSpan};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Processing status of a chunk within a run.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Not processed yet
    #[default]
    #[display("pending")]
    Pending,
    /// Backend call in flight
    #[display("processing")]
    Processing,
    /// Chapter generated
    #[display("success")]
    Success,
    /// Retries exhausted, placeholder chapter committed
    #[display("error")]
    Error,
}

/// A contiguous slice of the message log selected for processing.
///
/// Messages are shared with the log rather than copied.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Position in the current chunking pass (0-based, contiguous)
    pub index: usize,
    /// Chapter number shown to the user, fixed at chunking time
    pub display_id: u32,
    /// Messages spanned by the chunk, in log order
    pub messages: Vec<Arc<ChatMessage>>,
    /// Short excerpt of the first non-empty message
    pub preview_text: String,
    /// Whether the user included this chunk in the run
    pub selected: bool,
    /// Processing status
    pub status: ChunkStatus,
}

impl Chunk {
    /// The last message of the chunk.
    pub fn last_message(&self) -> Option<&ChatMessage> {
        self.messages.last().map(|m| m.as_ref())
    }

    /// Identifiers of the first and last message, used to rebuild the chunk later.
    pub fn span(&self) -> Option<MessageSpan> {
        let first = self.messages.first()?;
        let last = self.messages.last()?;
        Some(MessageSpan {
            first_message_id: first.id.clone(),
            last_message_id: last.id.clone(),
            message_count: self.messages.len(),
        })
    }
}
