//! Run state, watermarks and checkpoint records.

use crate::{Chapter, ChatMessage, ChunkStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Phase of a session's archiving run.
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
pub enum RunPhase {
    /// No run prepared
    #[default]
    #[display("idle")]
    Idle,
    /// Chunks computed, user may adjust the selection
    #[display("reviewing")]
    Reviewing,
    /// Run loop is processing chunks
    #[display("processing")]
    Processing,
    /// Run stopped at a chunk boundary, can be resumed
    #[display("paused")]
    Paused,
    /// Every chunk has been processed or skipped
    #[display("completed")]
    Completed,
}

/// Last archived message; anchors incremental runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Watermark {
    /// Id of the last archived message
    pub message_id: String,
    /// Timestamp of the last archived message
    pub timestamp: DateTime<Utc>,
}

impl Watermark {
    /// Watermark pointing at `message`.
    pub fn of(message: &ChatMessage) -> Self {
        Self {
            message_id: message.id.clone(),
            timestamp: message.timestamp,
        }
    }

    /// Whether `message` comes strictly after this watermark by time.
    pub fn precedes(&self, message: &ChatMessage) -> bool {
        message.timestamp > self.timestamp
    }
}

/// Persisted outcome of one chunk of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkOutcome {
    /// Chapter number of the chunk
    pub display_id: u32,
    /// Whether the chunk was selected
    pub selected: bool,
    /// Last known status
    pub status: ChunkStatus,
}

/// Parameters and per-chunk outcomes of a run, enough to rebuild its chunk list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    /// Watermark the run started after (`None` for a full pass)
    pub anchor: Option<Watermark>,
    /// Display id of the first chunk
    pub first_chapter_number: u32,
    /// Maximum messages per chunk used for chunking
    pub max_per_unit: usize,
    /// Number of candidate messages chunked
    pub candidate_count: usize,
    /// One outcome per chunk, in index order
    pub outcomes: Vec<ChunkOutcome>,
}

/// Run-progress part of the checkpoint, written independently of the chapters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunProgress {
    /// Index of the next chunk to process
    pub next_index: usize,
    /// Last archived message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watermark: Option<Watermark>,
    /// Active or last run, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<RunRecord>,
}

impl RunProgress {
    /// Whether the progress describes a run that stopped before its end.
    pub fn is_resumable(&self) -> bool {
        self.run
            .as_ref()
            .is_some_and(|run| self.next_index > 0 && self.next_index < run.outcomes.len())
    }
}

/// Durable snapshot of a session's archive and run progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Accumulated chapters
    #[serde(default)]
    pub chapters: Vec<Chapter>,
    /// Run progress
    #[serde(default)]
    pub progress: RunProgress,
}

/// Observable summary of a run for UI binding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Current phase
    pub phase: RunPhase,
    /// Share of selected chunks processed, 0 to 100
    pub progress_percent: u8,
    /// One-line status for display
    pub status_text: String,
    /// Index of the next chunk to process
    pub next_index: usize,
    /// Chunks in the current pass
    pub total_chunks: usize,
    /// Selected chunks in the current pass
    pub selected_chunks: usize,
    /// Selected chunks already committed
    pub committed_chunks: usize,
}

/// Direction for moving a chapter within the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
pub enum Direction {
    /// Towards the start of the archive
    #[display("up")]
    Up,
    /// Towards the end of the archive
    #[display("down")]
    Down,
}
