//! Error types for the Chronicle chat archiver.
//!
//! This crate provides the foundation error types used throughout the Chronicle workspace.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern for clean error handling:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! # Examples
//!
//! ```
//! use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};
//!
//! fn prepare() -> ChronicleResult<usize> {
//!     Err(ArchiveError::new(ArchiveErrorKind::EmptyInput))?
//! }
//!
//! match prepare() {
//!     Ok(count) => println!("Prepared {} chunks", count),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod archive;
mod backend;
mod builder;
mod config;
mod error;
mod json;
mod models;
mod storage;

pub use archive::{ArchiveError, ArchiveErrorKind};
pub use backend::BackendError;
pub use builder::{BuilderError, BuilderErrorKind};
pub use config::ConfigError;
pub use error::{ChronicleError, ChronicleErrorKind, ChronicleResult};
pub use json::JsonError;
pub use models::{ModelsError, ModelsErrorKind};
pub use storage::{StorageError, StorageErrorKind};
