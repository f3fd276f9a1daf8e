//! Archiving pipeline for Chronicle.
//!
//! Turns a session's message log into a persisted sequence of chapters:
//!
//! - [`chunker`] splits the log into numbered chunks
//! - [`ReviewState`] holds the user's per-chunk selection
//! - [`UnitProcessor`] generates one chapter per chunk, with retry
//! - [`normalize_llm_json`] repairs model output before parsing
//! - [`Archive`] is the editable chapter list
//! - [`ArchiveSession`] runs the state machine and checkpoints every commit
//! - [`SessionRegistry`] keeps one session archiver per chat
//!
//! # Example
//!
//! ```rust,ignore
//! use chronicle_narrative::{ArchiveSession, UnitProcessor};
//! use chronicle_storage::InMemoryStore;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let processor = Arc::new(UnitProcessor::new(generator, RetryPolicy::default()));
//! let session = ArchiveSession::open(
//!     "chat-1".into(), processor, store.clone(), store, ArchiveSettings::default(),
//!     ModelConfig::new("gpt-4o-mini"),
//! ).await?;
//!
//! session.prepare_run(true).await?;
//! session.execute().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod archive;
pub mod chunker;
mod normalizer;
mod processor;
mod registry;
mod review;
mod session;

pub use archive::Archive;
pub use normalizer::{
    fix_leading_zeros, normalize_llm_json, parse_chapter_content, parse_normalized,
    strip_code_fences,
};
pub use processor::{UnitProcessor, build_request, participants, transcript};
pub use registry::SessionRegistry;
pub use review::ReviewState;
pub use session::ArchiveSession;
