//! Checkpoint and message log storage for Chronicle.
//!
//! Two backends implement the [`CheckpointStore`](chronicle_interface::CheckpointStore)
//! and [`MessageSource`](chronicle_interface::MessageSource) traits:
//!
//! - [`InMemoryStore`] keeps everything in process memory, for tests and embedding
//! - [`FileSystemStore`] keeps one directory of JSON documents per session
//!
//! # Filesystem layout
//!
//! ```text
//! {base_path}/
//! └── {session_id}/
//!     ├── messages.json   (message log)
//!     ├── chapters.json   (archive)
//!     └── progress.json   (next index, watermark, run record)
//! ```
//!
//! Chapters and progress live in separate documents so that the per-chunk
//! checkpoint can rewrite one without touching the other.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod filesystem;
mod memory;

pub use filesystem::FileSystemStore;
pub use memory::InMemoryStore;
