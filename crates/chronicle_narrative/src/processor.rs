//! One generation call per chunk, with retry and output normalization.

use crate::parse_chapter_content;
use chronicle_core::{Chapter, ChapterContent, ChapterRequest, Chunk, ModelConfig, chapter_schema};
use chronicle_error::ChronicleResult;
use chronicle_interface::ChapterGenerator;
use chronicle_rate_limit::{RequestLimiter, RetryPolicy};
use std::sync::atomic::{AtomicU32, Ordering};
use tokio_retry2::{Retry, RetryError};
use tracing::{debug, instrument, warn};

/// Turns chunks into chapters through a [`ChapterGenerator`].
///
/// Every failure inside a unit (transport, refusal, unparseable output) is
/// retried per the [`RetryPolicy`]. Once the attempts are used up the unit
/// still yields a chapter: a placeholder flagged `is_error` that carries the
/// last error message. [`process`](Self::process) never fails.
#[derive(Debug)]
pub struct UnitProcessor<G: ChapterGenerator> {
    generator: G,
    retry: RetryPolicy,
    limiter: RequestLimiter,
}

impl<G: ChapterGenerator> UnitProcessor<G> {
    /// Create a processor without request throttling.
    pub fn new(generator: G, retry: RetryPolicy) -> Self {
        Self {
            generator,
            retry,
            limiter: RequestLimiter::unlimited(),
        }
    }

    /// Throttle backend calls with `limiter`.
    pub fn with_limiter(mut self, limiter: RequestLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    /// The underlying generator.
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// The retry policy in use.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Generate the chapter for `chunk`.
    #[instrument(skip(self, chunk, model), fields(chapter = chunk.display_id, messages = chunk.messages.len(), model = %model.name))]
    pub async fn process(&self, chunk: &Chunk, model: &ModelConfig) -> Chapter {
        let request = build_request(chunk, model);
        let attempts = AtomicU32::new(0);

        let request_ref = &request;
        let attempts_ref = &attempts;
        let result = Retry::spawn(self.retry.backoff_schedule(), move || async move {
            let attempt = attempts_ref.fetch_add(1, Ordering::SeqCst) + 1;
            let _permit = self.limiter.acquire().await;

            match self.attempt(request_ref).await {
                Ok(chapter) => Ok(chapter),
                Err(err) => {
                    warn!(attempt, error = %err, "Chapter generation failed, will retry");
                    Err(RetryError::Transient {
                        err,
                        retry_after: None,
                    })
                }
            }
        })
        .await;

        match result {
            Ok(content) => {
                debug!(
                    attempts = attempts.load(Ordering::SeqCst),
                    "Chapter generated"
                );
                Chapter::from_content(chunk.display_id, content, chunk.span())
            }
            Err(err) => {
                warn!(
                    attempts = attempts.load(Ordering::SeqCst),
                    error = %err,
                    "Retries exhausted, committing placeholder chapter"
                );
                Chapter::placeholder(chunk.display_id, err.to_string(), chunk.span())
            }
        }
    }

    async fn attempt(&self, request: &ChapterRequest) -> ChronicleResult<ChapterContent> {
        let response = self.generator.generate(request).await?;
        parse_chapter_content(&response)
    }
}

/// Distinct authors of the chunk, in order of first appearance.
pub fn participants(chunk: &Chunk) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for message in &chunk.messages {
        if !names.iter().any(|name| name == &message.author) {
            names.push(message.author.clone());
        }
    }
    names
}

/// One line per message: `[2024-01-01 10:00] author: content`.
pub fn transcript(chunk: &Chunk) -> String {
    chunk
        .messages
        .iter()
        .map(|m| {
            format!(
                "[{}] {}: {}",
                m.timestamp.format("%Y-%m-%d %H:%M"),
                m.author,
                m.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Backend request for `chunk`.
pub fn build_request(chunk: &Chunk, model: &ModelConfig) -> ChapterRequest {
    ChapterRequest {
        chapter_number: chunk.display_id,
        transcript: transcript(chunk),
        participants: participants(chunk),
        model: model.clone(),
        schema: chapter_schema(),
    }
}
