//! Trait definitions for the Chronicle chat archiver.
//!
//! The archiver treats its collaborators as opaque services with fixed contracts:
//! a text-generation backend, a checkpoint store and the session message log.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod traits;

pub use traits::{ChapterGenerator, CheckpointStore, MessageSource};
