//! Core data types for the Chronicle chat archiver.
//!
//! This crate provides the data model shared by every Chronicle crate: chat messages,
//! the chunks they are split into, the chapters produced from those chunks, and the
//! run/checkpoint records that make archiving resumable.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod chapter;
mod chunk;
mod message;
mod model;
mod request;
mod run;

pub use chapter::{
    Chapter, ChapterBuilder, ChapterContent, ChapterEdit, ChapterEditBuilder, MessageSpan,
    chapter_schema,
};
pub use chunk::{Chunk, ChunkStatus};
pub use message::{ChatMessage, ChatMessageBuilder, SessionId};
pub use model::{ModelConfig, ModelConfigBuilder};
pub use request::{ChapterRequest, ChapterResponse};
pub use run::{
    Checkpoint, ChunkOutcome, Direction, RunPhase, RunProgress, RunRecord, RunSnapshot,
    Watermark,
};
