//! Chronicle - chat logs into story chapters
//!
//! Chronicle splits an append-only chat log into bounded chunks, asks an LLM
//! backend to turn each chunk into a structured chapter, and keeps the result
//! as an editable, durable archive. Runs survive backend failures, pauses and
//! process restarts.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use chronicle::{
//!     ArchiveSession, ChronicleConfig, FileSystemStore, OpenAiChapterGenerator,
//!     BackendConfig, UnitProcessor,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChronicleConfig::load()?;
//!     let generator = OpenAiChapterGenerator::new(BackendConfig::from_env()?, &config.model.name);
//!     let processor = Arc::new(UnitProcessor::new(generator, config.retry.clone()));
//!     let store = Arc::new(FileSystemStore::new(config.storage.resolve_data_dir())?);
//!
//!     let session = ArchiveSession::open(
//!         "chat-1".into(), processor, store.clone(), store,
//!         config.archive.clone(), config.model.clone(),
//!     ).await?;
//!     session.prepare_run(true).await?;
//!     session.execute().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - `chronicle_error` - Error types
//! - `chronicle_core` - Messages, chunks, chapters, run records
//! - `chronicle_interface` - Generator, checkpoint store and message source traits
//! - `chronicle_rate_limit` - Configuration, retry policy, request limiter
//! - `chronicle_storage` - In-memory and filesystem stores
//! - `chronicle_models` - OpenAI-compatible backend
//! - `chronicle_narrative` - Chunker, normalizer, processor, run executor
//!
//! This crate re-exports everything for convenience.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod telemetry;

pub use telemetry::init_console_telemetry;

pub use chronicle_error::{
    ArchiveError, ArchiveErrorKind, BackendError, BuilderError, BuilderErrorKind, ChronicleError,
    ChronicleErrorKind, ChronicleResult, ConfigError, JsonError, ModelsError, ModelsErrorKind,
    StorageError, StorageErrorKind,
};

pub use chronicle_core::{
    Chapter, ChapterBuilder, ChapterContent, ChapterEdit, ChapterEditBuilder, ChapterRequest,
    ChapterResponse, ChatMessage, ChatMessageBuilder, Checkpoint, Chunk, ChunkOutcome,
    ChunkStatus, Direction, MessageSpan, ModelConfig, ModelConfigBuilder, RunPhase, RunProgress,
    RunRecord, RunSnapshot, SessionId, Watermark, chapter_schema,
};

pub use chronicle_interface::{ChapterGenerator, CheckpointStore, MessageSource};

pub use chronicle_rate_limit::{
    ArchiveSettings, ChronicleConfig, RateLimitSettings, RequestLimiter, RequestPermit,
    RetryPolicy, StorageSettings,
};

pub use chronicle_storage::{FileSystemStore, InMemoryStore};

pub use chronicle_models::{BackendConfig, OpenAiChapterGenerator};

pub use chronicle_narrative::{
    Archive, ArchiveSession, ReviewState, SessionRegistry, UnitProcessor, chunker,
    normalize_llm_json, parse_chapter_content,
};
