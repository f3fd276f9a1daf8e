//! Shared fixtures for archive session tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use chronicle_core::{
    Chapter, ChapterRequest, ChapterResponse, ChatMessage, Checkpoint, ModelConfig, RunProgress,
    SessionId,
};
use chronicle_error::{BackendError, ChronicleResult, StorageError, StorageErrorKind};
use chronicle_interface::{ChapterGenerator, CheckpointStore, MessageSource};
use chronicle_narrative::{ArchiveSession, UnitProcessor};
use chronicle_rate_limit::{ArchiveSettings, RetryPolicy};
use chronicle_storage::InMemoryStore;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// Deterministic generator answering with fenced, slightly malformed JSON.
///
/// Chapters can be made to fail permanently, or to block once until released.
#[derive(Default)]
pub struct ScriptedGenerator {
    failing: Mutex<HashSet<u32>>,
    gated: Mutex<HashSet<u32>>,
    calls: Mutex<Vec<(u32, String)>>,
    /// Signalled when a gated call starts
    pub started: Notify,
    /// Lets a gated call finish
    pub release: Notify,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_chapter(&self, chapter_number: u32) {
        self.failing.lock().unwrap().insert(chapter_number);
    }

    pub fn heal_chapter(&self, chapter_number: u32) {
        self.failing.lock().unwrap().remove(&chapter_number);
    }

    /// Block the next call for `chapter_number` until `release` is notified.
    pub fn gate_chapter(&self, chapter_number: u32) {
        self.gated.lock().unwrap().insert(chapter_number);
    }

    /// Chapter numbers of every call, in order.
    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(n, _)| *n).collect()
    }

    /// Model names of every call, in order.
    pub fn models(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, model)| model.clone())
            .collect()
    }

    pub fn calls_for(&self, chapter_number: u32) -> usize {
        self.calls()
            .into_iter()
            .filter(|n| *n == chapter_number)
            .count()
    }
}

#[async_trait]
impl ChapterGenerator for ScriptedGenerator {
    async fn generate(&self, req: &ChapterRequest) -> ChronicleResult<ChapterResponse> {
        let number = req.chapter_number;
        self.calls
            .lock()
            .unwrap()
            .push((number, req.model.name.clone()));

        let gated = self.gated.lock().unwrap().remove(&number);
        if gated {
            self.started.notify_one();
            self.release.notified().await;
        }

        if self.failing.lock().unwrap().contains(&number) {
            return Err(BackendError::new(format!("backend refused chapter {}", number)).into());
        }

        let narrative = serde_json::to_string(&req.transcript).unwrap();
        Ok(ChapterResponse::Text(format!(
            "```json\n{{\"chapter\": {:02}, \"title\": \"Chapter {}\", \"time_range\": \"\", \"narrative\": {}, \"key_quotes\": [\"{}\"]}}\n```",
            number,
            number,
            narrative,
            req.participants.join(" & ")
        )))
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }

    fn model_name(&self) -> &str {
        "mock-model-v1"
    }
}

/// In-memory store whose chapter or progress writes can be made to fail.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_chapters: AtomicBool,
    pub fail_progress: AtomicBool,
}

impl FlakyStore {
    fn check(flag: &AtomicBool) -> ChronicleResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StorageError::new(StorageErrorKind::FileWrite("disk full".to_string())).into());
        }
        Ok(())
    }
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn load_checkpoint(&self, session: &SessionId) -> ChronicleResult<Option<Checkpoint>> {
        self.inner.load_checkpoint(session).await
    }

    async fn save_checkpoint(
        &self,
        session: &SessionId,
        checkpoint: &Checkpoint,
    ) -> ChronicleResult<()> {
        Self::check(&self.fail_chapters)?;
        Self::check(&self.fail_progress)?;
        self.inner.save_checkpoint(session, checkpoint).await
    }

    async fn save_chapters(&self, session: &SessionId, chapters: &[Chapter]) -> ChronicleResult<()> {
        Self::check(&self.fail_chapters)?;
        self.inner.save_chapters(session, chapters).await
    }

    async fn save_progress(&self, session: &SessionId, progress: &RunProgress) -> ChronicleResult<()> {
        Self::check(&self.fail_progress)?;
        self.inner.save_progress(session, progress).await
    }
}

#[async_trait]
impl MessageSource for FlakyStore {
    async fn load_messages(&self, session: &SessionId) -> ChronicleResult<Vec<ChatMessage>> {
        self.inner.load_messages(session).await
    }
}

/// Messages `range` of a two-person chat, one minute apart.
pub fn messages(range: std::ops::Range<u32>) -> Vec<ChatMessage> {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
    range
        .map(|i| ChatMessage {
            id: format!("m{}", i),
            author: if i % 2 == 0 { "Ada" } else { "Brook" }.to_string(),
            content: format!("line {}", i),
            timestamp: start + ChronoDuration::minutes(i as i64),
        })
        .collect()
}

pub fn settings(max_messages_per_chunk: usize) -> ArchiveSettings {
    ArchiveSettings {
        max_messages_per_chunk,
        preview_chars: 40,
        auto_archive_threshold: 4,
    }
}

pub fn processor(generator: ScriptedGenerator) -> Arc<UnitProcessor<ScriptedGenerator>> {
    Arc::new(UnitProcessor::new(
        generator,
        RetryPolicy::new(3, Duration::from_millis(1)),
    ))
}

pub fn session_id() -> SessionId {
    SessionId::new("chat-1")
}

pub async fn open<S>(
    store: Arc<S>,
    processor: Arc<UnitProcessor<ScriptedGenerator>>,
    settings: ArchiveSettings,
) -> Arc<ArchiveSession<ScriptedGenerator>>
where
    S: CheckpointStore + MessageSource + 'static,
{
    Arc::new(
        ArchiveSession::open(
            session_id(),
            processor,
            store.clone(),
            store,
            settings,
            ModelConfig::new("mock-model-v1"),
        )
        .await
        .unwrap(),
    )
}

/// Chapter numbers of `chapters`, in order.
pub fn numbers(chapters: &[Chapter]) -> Vec<u32> {
    chapters.iter().map(|c| c.chapter_number).collect()
}
