//! Configuration, retry policy and rate limiting for the Chronicle archiver.
//!
//! Backend calls are rate- and cost-sensitive. This crate holds the knobs that
//! govern them:
//! - `ChronicleConfig` - layered TOML configuration (bundled defaults + user overrides)
//! - `RetryPolicy` - bounded exponential backoff for failed generations
//! - `RequestLimiter` - requests-per-minute and concurrency limits for the backend

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod limiter;
mod retry;

pub use config::{ArchiveSettings, ChronicleConfig, RateLimitSettings, StorageSettings};
pub use limiter::{RequestLimiter, RequestPermit};
pub use retry::RetryPolicy;
