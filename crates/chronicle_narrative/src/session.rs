//! Run control for one chat session.
//!
//! [`ArchiveSession`] drives the archiving state machine:
//!
//! ```text
//! idle ─prepare─▶ reviewing ─execute─▶ processing ⇄ paused
//!                                          │
//!                                          ▼
//!                                      completed
//! ```
//!
//! Any phase returns to `idle` on cancel. Cancelling discards the chunk list
//! and run position but never the committed chapters.
//!
//! Chunks are processed strictly one at a time. The state lock is released
//! while the backend call is in flight, so archive edits, pause and cancel
//! requests stay responsive; pause and cancel are only acted on between chunks.

use crate::{Archive, ReviewState, UnitProcessor, chunker};
use chronicle_core::{
    Chapter, ChapterEdit, ChatMessage, Checkpoint, Chunk, ChunkStatus, Direction, ModelConfig,
    RunPhase, RunProgress, RunRecord, RunSnapshot, SessionId, Watermark,
};
use chronicle_error::{ArchiveError, ArchiveErrorKind, ChronicleResult};
use chronicle_interface::{ChapterGenerator, CheckpointStore, MessageSource};
use chronicle_rate_limit::ArchiveSettings;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{Mutex, oneshot, watch};
use tracing::{debug, info, instrument, warn};

#[derive(Debug)]
struct SessionState {
    phase: RunPhase,
    review: ReviewState,
    next_index: usize,
    run: Option<RunRecord>,
    archive: Archive,
    watermark: Option<Watermark>,
    model: ModelConfig,
    status_text: String,
}

impl SessionState {
    fn progress(&self) -> RunProgress {
        let run = self.run.clone().map(|mut run| {
            // Outcomes loaded from disk stay until the chunk list is rebuilt
            if !self.review.is_empty() {
                run.outcomes = self.review.outcomes();
            }
            run
        });
        RunProgress {
            next_index: self.next_index,
            watermark: self.watermark.clone(),
            run,
        }
    }

    /// A persisted run that stopped part way and has not been rebuilt yet.
    fn has_resumable_run(&self) -> bool {
        self.review.is_empty() && self.progress().is_resumable()
    }

    fn snapshot(&self) -> RunSnapshot {
        let total_chunks = self.review.len();
        let selected_chunks = self.review.selected_count();
        let committed_chunks = self.review.selected_before(self.next_index);
        let progress_percent = match selected_chunks {
            0 if self.phase == RunPhase::Completed => 100,
            0 => 0,
            selected => (committed_chunks * 100 / selected) as u8,
        };

        RunSnapshot {
            phase: self.phase,
            progress_percent,
            status_text: self.status_text.clone(),
            next_index: self.next_index,
            total_chunks,
            selected_chunks,
            committed_chunks,
        }
    }

    fn reset_run(&mut self) {
        self.phase = RunPhase::Idle;
        self.review = ReviewState::default();
        self.next_index = 0;
        self.run = None;
        self.status_text = "Idle".to_string();
    }

    fn position_text(&self) -> String {
        format!(
            "chunk {} of {}",
            (self.next_index + 1).min(self.review.len()),
            self.review.len()
        )
    }
}

type RetrySlots = std::sync::Mutex<HashMap<u32, (u64, oneshot::Sender<()>)>>;

/// Marks the run loop as owned; clears pending requests when the loop exits.
struct RunningGuard<'a> {
    running: &'a AtomicBool,
    pause_requested: &'a AtomicBool,
    cancel_requested: &'a AtomicBool,
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.pause_requested.store(false, Ordering::SeqCst);
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Frees a chapter's retry slot, unless a newer retry has taken it over.
struct RetryGuard<'a> {
    slots: &'a RetrySlots,
    chapter_number: u32,
    ticket: u64,
}

impl Drop for RetryGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if slots
            .get(&self.chapter_number)
            .is_some_and(|(ticket, _)| *ticket == self.ticket)
        {
            slots.remove(&self.chapter_number);
        }
    }
}

/// Archiver for one chat session.
///
/// Holds the run state machine, the chapter archive, and observers for UI
/// binding. Every chapter change is written through the [`CheckpointStore`]
/// before it is published.
pub struct ArchiveSession<G: ChapterGenerator> {
    session_id: SessionId,
    processor: Arc<UnitProcessor<G>>,
    store: Arc<dyn CheckpointStore>,
    source: Arc<dyn MessageSource>,
    settings: ArchiveSettings,
    state: Mutex<SessionState>,
    running: AtomicBool,
    pause_requested: AtomicBool,
    cancel_requested: AtomicBool,
    retries: RetrySlots,
    retry_tickets: AtomicU64,
    snapshots: watch::Sender<RunSnapshot>,
    chapters: watch::Sender<Arc<Vec<Chapter>>>,
}

impl<G: ChapterGenerator> ArchiveSession<G> {
    /// Open a session, restoring chapters and run progress from its checkpoint.
    #[instrument(skip_all, fields(session = %session_id))]
    pub async fn open(
        session_id: SessionId,
        processor: Arc<UnitProcessor<G>>,
        store: Arc<dyn CheckpointStore>,
        source: Arc<dyn MessageSource>,
        settings: ArchiveSettings,
        model: ModelConfig,
    ) -> ChronicleResult<Self> {
        let Checkpoint { chapters, progress } = store
            .load_checkpoint(&session_id)
            .await?
            .unwrap_or_default();

        let mut state = SessionState {
            phase: RunPhase::Idle,
            review: ReviewState::default(),
            next_index: progress.next_index,
            run: progress.run,
            archive: Archive::new(chapters),
            watermark: progress.watermark,
            model,
            status_text: "Idle".to_string(),
        };
        if state.has_resumable_run() {
            let total = state.run.as_ref().map_or(0, |run| run.outcomes.len());
            state.status_text = format!(
                "Unfinished run stopped at chunk {} of {}",
                state.next_index + 1,
                total
            );
        }
        debug!(
            chapters = state.archive.len(),
            resumable = state.has_resumable_run(),
            "Session opened"
        );

        let (snapshots, _) = watch::channel(state.snapshot());
        let (chapters, _) = watch::channel(Arc::new(state.archive.chapters().to_vec()));

        Ok(Self {
            session_id,
            processor,
            store,
            source,
            settings,
            state: Mutex::new(state),
            running: AtomicBool::new(false),
            pause_requested: AtomicBool::new(false),
            cancel_requested: AtomicBool::new(false),
            retries: std::sync::Mutex::new(HashMap::new()),
            retry_tickets: AtomicU64::new(0),
            snapshots,
            chapters,
        })
    }

    /// Session this archiver belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Archive parameters in use.
    pub fn settings(&self) -> &ArchiveSettings {
        &self.settings
    }

    // ── Run control ────────────────────────────────────────────────────────

    /// Compute the chunk list for a new run, or restore an unfinished one.
    ///
    /// - `resume = true` with an unfinished persisted run rebuilds its exact
    ///   chunk list and parks it in `paused`; call [`execute`](Self::execute)
    ///   to continue. Review is skipped.
    /// - `resume = true` otherwise chunks only the messages after the
    ///   watermark, numbering on from the last chapter.
    /// - `resume = false` chunks the whole log from chapter 1.
    ///
    /// # Errors
    ///
    /// [`ArchiveErrorKind::EmptyInput`] when there is nothing to archive; the
    /// session state is left unchanged.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn prepare_run(&self, resume: bool) -> ChronicleResult<RunSnapshot> {
        let mut state = self.state.lock().await;
        match state.phase {
            RunPhase::Processing => {
                return Err(ArchiveError::new(ArchiveErrorKind::RunInProgress).into());
            }
            RunPhase::Paused if resume => return Ok(state.snapshot()),
            RunPhase::Paused => {
                return Err(ArchiveError::invalid_phase("prepare a new run", state.phase).into());
            }
            _ => {}
        }

        let messages = self.load_log().await?;

        if resume
            && state.has_resumable_run()
            && let Some(run) = state.run.clone()
        {
            let candidates = chunker::candidates_after(&messages, run.anchor.as_ref());
            let candidates = &candidates[..run.candidate_count.min(candidates.len())];
            let chunks = chunker::chunk_candidates(
                candidates,
                run.max_per_unit,
                run.first_chapter_number,
                self.settings.preview_chars,
            )?;

            let mut review = ReviewState::new(chunks);
            review.apply_outcomes(&run.outcomes);
            state.next_index = state.next_index.min(review.len());
            state.review = review;
            state.phase = RunPhase::Paused;
            state.status_text = format!("Ready to resume at {}", state.position_text());
            info!(next_index = state.next_index, "Restored unfinished run");
            self.publish(&state);
            return Ok(state.snapshot());
        }

        let (anchor, first_chapter_number) = if resume {
            (
                state.watermark.clone(),
                state.archive.last_chapter_number() + 1,
            )
        } else {
            (None, 1)
        };
        let max_per_unit = self.settings.max_messages_per_chunk;
        let candidates = chunker::candidates_after(&messages, anchor.as_ref());
        let chunks = chunker::chunk_candidates(
            candidates,
            max_per_unit,
            first_chapter_number,
            self.settings.preview_chars,
        )?;

        state.run = Some(RunRecord {
            anchor,
            first_chapter_number,
            max_per_unit,
            candidate_count: candidates.len(),
            outcomes: Vec::new(),
        });
        state.review = ReviewState::new(chunks);
        state.next_index = 0;
        state.phase = RunPhase::Reviewing;
        state.status_text = format!("Reviewing {} chunks", state.review.len());
        info!(
            chunks = state.review.len(),
            first_chapter_number, "Prepared run"
        );
        self.publish(&state);
        Ok(state.snapshot())
    }

    /// Process the selected chunks from the current position.
    ///
    /// Returns when the run completes, pauses or is cancelled. Chunk failures
    /// never end the run: they are committed as placeholder chapters.
    ///
    /// # Errors
    ///
    /// Fails when called outside `reviewing`/`paused`, when another call is
    /// already running the loop, or when a checkpoint write fails. In the last
    /// case the unsaved commit is rolled back and the run is left `paused`.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn execute(&self) -> ChronicleResult<RunSnapshot> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ArchiveError::new(ArchiveErrorKind::RunInProgress).into());
        }
        let _running = RunningGuard {
            running: &self.running,
            pause_requested: &self.pause_requested,
            cancel_requested: &self.cancel_requested,
        };

        {
            let mut state = self.state.lock().await;
            let previous_phase = state.phase;
            match previous_phase {
                RunPhase::Reviewing | RunPhase::Paused => {}
                // Left over from a run loop that was dropped mid-chunk
                RunPhase::Processing => {
                    let index = state.next_index;
                    state.review.set_status(index, ChunkStatus::Pending);
                }
                phase => return Err(ArchiveError::invalid_phase("execute", phase).into()),
            }
            self.pause_requested.store(false, Ordering::SeqCst);
            self.cancel_requested.store(false, Ordering::SeqCst);

            state.phase = RunPhase::Processing;
            state.status_text = format!("Starting at {}", state.position_text());
            if let Err(err) = self
                .store
                .save_progress(&self.session_id, &state.progress())
                .await
            {
                state.phase = previous_phase;
                self.publish(&state);
                return Err(err);
            }
            info!(
                next_index = state.next_index,
                selected = state.review.selected_count(),
                "Run started"
            );
            self.publish(&state);
        }

        loop {
            if self.cancel_requested.swap(false, Ordering::SeqCst) {
                let mut state = self.state.lock().await;
                return self.reset(&mut state).await;
            }

            if self.pause_requested.swap(false, Ordering::SeqCst) {
                let mut state = self.state.lock().await;
                state.phase = RunPhase::Paused;
                state.status_text = format!("Paused at {}", state.position_text());
                self.publish(&state);
                info!(next_index = state.next_index, "Run paused");
                self.store
                    .save_progress(&self.session_id, &state.progress())
                    .await?;
                return Ok(state.snapshot());
            }

            let (chunk, model) = {
                let mut state = self.state.lock().await;
                let index = state.next_index;

                let Some(chunk) = state.review.get(index).cloned() else {
                    state.phase = RunPhase::Completed;
                    state.status_text = format!(
                        "Completed: {} chapters, {} failed",
                        state.archive.len(),
                        state.archive.error_count()
                    );
                    self.publish(&state);
                    info!(chapters = state.archive.len(), "Run completed");
                    self.store
                        .save_progress(&self.session_id, &state.progress())
                        .await?;
                    return Ok(state.snapshot());
                };

                if !chunk.selected {
                    debug!(chapter = chunk.display_id, "Skipping deselected chunk");
                    state.next_index += 1;
                    self.publish(&state);
                    continue;
                }

                state.review.set_status(index, ChunkStatus::Processing);
                state.status_text = format!(
                    "Processing chapter {} ({} of {})",
                    chunk.display_id,
                    state.review.selected_before(index) + 1,
                    state.review.selected_count()
                );
                self.publish(&state);
                (chunk, state.model.clone())
            };

            let chapter = self.processor.process(&chunk, &model).await;

            let mut state = self.state.lock().await;
            self.commit(&mut state, &chunk, chapter).await?;
        }
    }

    /// Ask the run to pause after the chunk in flight.
    ///
    /// The phase turns `paused` only once that chunk is committed.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn pause(&self) -> ChronicleResult<RunSnapshot> {
        let mut state = self.state.lock().await;
        match state.phase {
            RunPhase::Processing if self.running.load(Ordering::SeqCst) => {
                self.pause_requested.store(true, Ordering::SeqCst);
                state.status_text = "Pausing after the current chunk".to_string();
                debug!("Pause requested");
            }
            RunPhase::Processing => {
                let index = state.next_index;
                state.review.set_status(index, ChunkStatus::Pending);
                state.phase = RunPhase::Paused;
                state.status_text = format!("Paused at {}", state.position_text());
            }
            RunPhase::Paused => {}
            phase => return Err(ArchiveError::invalid_phase("pause", phase).into()),
        }
        self.publish(&state);
        Ok(state.snapshot())
    }

    /// Abandon the run and return to `idle`, keeping every committed chapter.
    ///
    /// While the loop is running this only requests the cancel; it takes
    /// effect after the chunk in flight.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn cancel(&self) -> ChronicleResult<RunSnapshot> {
        let mut state = self.state.lock().await;
        if state.phase == RunPhase::Processing && self.running.load(Ordering::SeqCst) {
            self.cancel_requested.store(true, Ordering::SeqCst);
            state.status_text = "Cancelling after the current chunk".to_string();
            self.publish(&state);
            return Ok(state.snapshot());
        }
        self.reset(&mut state).await
    }

    /// Regenerate one chapter in place from the chunk it was built from.
    ///
    /// Returns `None` when the retry was cancelled with
    /// [`cancel_retry`](Self::cancel_retry); the chapter is then unchanged.
    ///
    /// # Errors
    ///
    /// Fails while the run loop is processing, when the chapter is unknown or
    /// has no recoverable source messages, or when a retry of the same chapter
    /// is already in flight.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn retry_chunk(&self, chapter_number: u32) -> ChronicleResult<Option<Chapter>> {
        let (chunk, model, previous_status, cancelled, _slot) = {
            let mut state = self.state.lock().await;
            if state.phase == RunPhase::Processing {
                return Err(ArchiveError::invalid_phase("retry a chapter", state.phase).into());
            }
            // Manual chapters are never regenerated
            let chapter = match state.archive.get_generated(chapter_number) {
                Some(chapter) => chapter.clone(),
                None if state.archive.get(chapter_number).is_some() => {
                    return Err(
                        ArchiveError::new(ArchiveErrorKind::MissingSource(chapter_number)).into(),
                    );
                }
                None => {
                    return Err(
                        ArchiveError::new(ArchiveErrorKind::ChapterNotFound(chapter_number)).into(),
                    );
                }
            };

            let messages = match state.review.find_display_id(chapter_number) {
                Some(chunk) => chunk.messages.clone(),
                None => self.source_messages(&chapter).await?,
            };

            let (cancel_tx, cancelled) = oneshot::channel();
            let slot = self.claim_retry(chapter_number, cancel_tx)?;

            let previous_status = state.review.status_of(chapter_number);
            if let Some(index) = self.review_index(&state, chapter_number) {
                state.review.set_status(index, ChunkStatus::Processing);
            }
            state.status_text = format!("Retrying chapter {}", chapter_number);
            self.publish(&state);

            let chunk = chunker::single_chunk(messages, chapter_number, self.settings.preview_chars);
            (chunk, state.model.clone(), previous_status, cancelled, slot)
        };

        let outcome = tokio::select! {
            chapter = self.processor.process(&chunk, &model) => Some(chapter),
            _ = cancelled => None,
        };

        let mut state = self.state.lock().await;
        let index = self.review_index(&state, chapter_number);
        let restore_status = |state: &mut SessionState| {
            if let (Some(index), Some(status)) = (index, previous_status) {
                state.review.set_status(index, status);
            }
        };

        let Some(chapter) = outcome else {
            restore_status(&mut *state);
            state.status_text = format!("Retry of chapter {} cancelled", chapter_number);
            self.publish(&state);
            info!(chapter_number, "Retry cancelled");
            return Ok(None);
        };

        let before = state.archive.clone();
        let replaced = state.archive.replace_generated(chapter_number, chapter.clone());
        let saved = match replaced {
            Ok(_) => {
                self.store
                    .save_chapters(&self.session_id, state.archive.chapters())
                    .await
            }
            Err(err) => Err(err),
        };
        if let Err(err) = saved {
            warn!(chapter_number, error = %err, "Retried chapter not saved");
            state.archive = before;
            restore_status(&mut *state);
            self.publish(&state);
            return Err(err);
        }

        let status = if chapter.is_error {
            ChunkStatus::Error
        } else {
            ChunkStatus::Success
        };
        if let Some(index) = index {
            state.review.set_status(index, status);
        }
        state.status_text = format!("Chapter {} retried: {}", chapter_number, status);
        info!(chapter_number, %status, "Chapter retried");
        self.publish(&state);
        self.publish_chapters(&state);
        Ok(Some(chapter))
    }

    /// Cancel the in-flight retry of a chapter. Returns `false` if none was running.
    pub fn cancel_retry(&self, chapter_number: u32) -> bool {
        let slot = self
            .retries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&chapter_number);
        match slot {
            Some((_, cancel)) => {
                // The retry may have finished already
                let _ = cancel.send(());
                true
            }
            None => false,
        }
    }

    /// Whether a retry of `chapter_number` is in flight.
    pub fn is_retrying(&self, chapter_number: u32) -> bool {
        self.retries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&chapter_number)
    }

    // ── Review ─────────────────────────────────────────────────────────────

    /// Flip the selection of the chunk at `index`. Only allowed while reviewing.
    pub async fn toggle_selection(&self, index: usize) -> ChronicleResult<bool> {
        let mut state = self.state.lock().await;
        Self::ensure_reviewing(&state, "change the selection")?;
        let selected = state.review.toggle_selection(index)?;
        self.publish(&state);
        Ok(selected)
    }

    /// Select or deselect every chunk. Only allowed while reviewing.
    pub async fn set_all_selection(&self, selected: bool) -> ChronicleResult<()> {
        let mut state = self.state.lock().await;
        Self::ensure_reviewing(&state, "change the selection")?;
        state.review.set_all_selection(selected);
        self.publish(&state);
        Ok(())
    }

    /// Chunks of the current run.
    pub async fn chunks(&self) -> Vec<Chunk> {
        self.state.lock().await.review.chunks().to_vec()
    }

    // ── Archive editing ────────────────────────────────────────────────────

    /// Append a chapter at the end of the archive.
    pub async fn append_chapter(&self, chapter: Chapter) -> ChronicleResult<()> {
        let mut state = self.state.lock().await;
        let before = state.archive.clone();
        state.archive.append(chapter);
        self.write_through(&mut state, before).await
    }

    /// Replace the chapter numbered `chapter_number`, keeping its position.
    pub async fn replace_chapter(
        &self,
        chapter_number: u32,
        chapter: Chapter,
    ) -> ChronicleResult<Chapter> {
        let mut state = self.state.lock().await;
        if let Some(current) = state.archive.get(chapter_number) {
            self.ensure_unlocked(&state, current)?;
        }
        let before = state.archive.clone();
        let previous = state.archive.replace(chapter_number, chapter)?;
        self.write_through(&mut state, before).await?;
        Ok(previous)
    }

    /// Delete the chapter at `index`.
    pub async fn delete_chapter(&self, index: usize) -> ChronicleResult<Chapter> {
        let mut state = self.state.lock().await;
        self.ensure_unlocked(&state, state.archive.at(index)?)?;
        let before = state.archive.clone();
        let removed = state.archive.delete(index)?;
        self.write_through(&mut state, before).await?;
        Ok(removed)
    }

    /// Edit the chapter at `index`.
    pub async fn edit_chapter(&self, index: usize, edit: ChapterEdit) -> ChronicleResult<Chapter> {
        let mut state = self.state.lock().await;
        self.ensure_unlocked(&state, state.archive.at(index)?)?;
        let before = state.archive.clone();
        let edited = state.archive.edit(index, &edit)?.clone();
        self.write_through(&mut state, before).await?;
        Ok(edited)
    }

    /// Move the chapter at `index` one place. `false` when already at that end.
    pub async fn move_chapter(&self, index: usize, direction: Direction) -> ChronicleResult<bool> {
        let mut state = self.state.lock().await;
        let before = state.archive.clone();
        if !state.archive.move_chapter(index, direction)? {
            return Ok(false);
        }
        self.write_through(&mut state, before).await?;
        Ok(true)
    }

    /// Add a user-written chapter, numbered `len + 1` unless `chapter_number` is given.
    pub async fn insert_manual(
        &self,
        chapter: Chapter,
        chapter_number: Option<u32>,
    ) -> ChronicleResult<Chapter> {
        let mut state = self.state.lock().await;
        let before = state.archive.clone();
        let inserted = state.archive.insert_manual(chapter, chapter_number).clone();
        self.write_through(&mut state, before).await?;
        Ok(inserted)
    }

    // ── Model ──────────────────────────────────────────────────────────────

    /// Use `model` for every chunk processed from now on.
    pub async fn set_model_config(&self, model: ModelConfig) {
        let mut state = self.state.lock().await;
        info!(from = %state.model.name, to = %model.name, "Switching model");
        state.model = model;
    }

    /// Model used for the next chunk.
    pub async fn model_config(&self) -> ModelConfig {
        self.state.lock().await.model.clone()
    }

    // ── Observers ──────────────────────────────────────────────────────────

    /// Receive a [`RunSnapshot`] on every state change.
    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.snapshots.subscribe()
    }

    /// Receive the chapter list after every archive change.
    pub fn subscribe_chapters(&self) -> watch::Receiver<Arc<Vec<Chapter>>> {
        self.chapters.subscribe()
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> RunSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Current phase.
    pub async fn phase(&self) -> RunPhase {
        self.state.lock().await.phase
    }

    /// Current chapter list.
    pub async fn chapters(&self) -> Vec<Chapter> {
        self.state.lock().await.archive.chapters().to_vec()
    }

    /// Last archived message.
    pub async fn watermark(&self) -> Option<Watermark> {
        self.state.lock().await.watermark.clone()
    }

    // ── Auto-archiving ─────────────────────────────────────────────────────

    /// Whether enough messages arrived after the watermark to archive them.
    pub async fn auto_archive_due(&self) -> ChronicleResult<bool> {
        let threshold = self.settings.auto_archive_threshold;
        if threshold == 0 {
            return Ok(false);
        }
        let watermark = self.state.lock().await.watermark.clone();
        let messages = self.load_log().await?;
        let pending = chunker::candidates_after(&messages, watermark.as_ref()).len();
        debug!(pending, threshold, "Checked auto-archive threshold");
        Ok(pending >= threshold)
    }

    /// Archive the messages after the watermark if the threshold is reached.
    ///
    /// Does nothing while a run is being reviewed, processed or paused, or
    /// while an unfinished run waits to be resumed.
    #[instrument(skip(self), fields(session = %self.session_id))]
    pub async fn auto_archive(&self) -> ChronicleResult<Option<RunSnapshot>> {
        {
            let state = self.state.lock().await;
            let at_rest = matches!(state.phase, RunPhase::Idle | RunPhase::Completed);
            if !at_rest || state.has_resumable_run() || self.running.load(Ordering::SeqCst) {
                return Ok(None);
            }
        }
        if !self.auto_archive_due().await? {
            return Ok(None);
        }

        info!("Auto-archiving new messages");
        self.prepare_run(true).await?;
        self.set_all_selection(true).await?;
        self.execute().await.map(Some)
    }

    // ── Internals ──────────────────────────────────────────────────────────

    async fn load_log(&self) -> ChronicleResult<Vec<Arc<ChatMessage>>> {
        let messages = self.source.load_messages(&self.session_id).await?;
        Ok(messages.into_iter().map(Arc::new).collect())
    }

    async fn source_messages(&self, chapter: &Chapter) -> ChronicleResult<Vec<Arc<ChatMessage>>> {
        let missing = || ArchiveError::new(ArchiveErrorKind::MissingSource(chapter.chapter_number));
        let span = chapter.source.as_ref().ok_or_else(missing)?;
        let log = self.load_log().await?;
        let messages = chunker::messages_in_span(&log, span)
            .filter(|messages| !messages.is_empty())
            .ok_or_else(missing)?;
        Ok(messages)
    }

    fn review_index(&self, state: &SessionState, chapter_number: u32) -> Option<usize> {
        state
            .review
            .find_display_id(chapter_number)
            .map(|chunk| chunk.index)
    }

    fn claim_retry(
        &self,
        chapter_number: u32,
        cancel: oneshot::Sender<()>,
    ) -> ChronicleResult<RetryGuard<'_>> {
        let mut slots = self.retries.lock().unwrap_or_else(PoisonError::into_inner);
        if slots.contains_key(&chapter_number) {
            return Err(ArchiveError::new(ArchiveErrorKind::RetryInFlight(chapter_number)).into());
        }
        let ticket = self.retry_tickets.fetch_add(1, Ordering::SeqCst);
        slots.insert(chapter_number, (ticket, cancel));
        Ok(RetryGuard {
            slots: &self.retries,
            chapter_number,
            ticket,
        })
    }

    fn ensure_reviewing(state: &SessionState, operation: &str) -> ChronicleResult<()> {
        if state.phase != RunPhase::Reviewing {
            return Err(ArchiveError::invalid_phase(operation, state.phase).into());
        }
        Ok(())
    }

    /// Generated chapters are locked while their chunk is being processed or retried.
    fn ensure_unlocked(&self, state: &SessionState, chapter: &Chapter) -> ChronicleResult<()> {
        if chapter.manual {
            return Ok(());
        }
        let chapter_number = chapter.chapter_number;
        let in_run = state.phase == RunPhase::Processing
            && state.review.status_of(chapter_number) == Some(ChunkStatus::Processing);
        if in_run || self.is_retrying(chapter_number) {
            return Err(ArchiveError::new(ArchiveErrorKind::ChapterLocked(chapter_number)).into());
        }
        Ok(())
    }

    async fn commit(
        &self,
        state: &mut SessionState,
        chunk: &Chunk,
        chapter: Chapter,
    ) -> ChronicleResult<()> {
        let status = if chapter.is_error {
            ChunkStatus::Error
        } else {
            ChunkStatus::Success
        };
        let before = state.archive.clone();
        let previous_watermark = state.watermark.clone();

        state.archive.upsert(chapter);
        state.review.set_status(chunk.index, status);
        if let Some(last) = chunk.last_message() {
            state.watermark = Some(Watermark::of(last));
        }
        state.next_index = chunk.index + 1;

        if let Err(err) = self.save_run(state).await {
            warn!(chapter = chunk.display_id, error = %err, "Checkpoint write failed, rolling back");
            state.archive = before;
            state.watermark = previous_watermark;
            state.review.set_status(chunk.index, ChunkStatus::Pending);
            state.next_index = chunk.index;
            state.phase = RunPhase::Paused;
            state.status_text = format!("Paused: chapter {} could not be saved", chunk.display_id);
            // The chapter list may have been written before the progress failed
            if let Err(revert) = self
                .store
                .save_chapters(&self.session_id, state.archive.chapters())
                .await
            {
                warn!(error = %revert, "Could not revert saved chapters");
            }
            self.publish(state);
            return Err(err);
        }

        debug!(chapter = chunk.display_id, %status, "Committed chapter");
        self.publish(state);
        self.publish_chapters(state);
        Ok(())
    }

    async fn save_run(&self, state: &SessionState) -> ChronicleResult<()> {
        self.store
            .save_chapters(&self.session_id, state.archive.chapters())
            .await?;
        self.store
            .save_progress(&self.session_id, &state.progress())
            .await
    }

    async fn reset(&self, state: &mut SessionState) -> ChronicleResult<RunSnapshot> {
        state.reset_run();
        self.publish(state);
        info!("Run reset");
        self.store
            .save_progress(&self.session_id, &state.progress())
            .await?;
        Ok(state.snapshot())
    }

    async fn write_through(&self, state: &mut SessionState, before: Archive) -> ChronicleResult<()> {
        if let Err(err) = self
            .store
            .save_chapters(&self.session_id, state.archive.chapters())
            .await
        {
            warn!(error = %err, "Chapter write failed, reverting edit");
            state.archive = before;
            return Err(err);
        }
        self.publish_chapters(state);
        Ok(())
    }

    fn publish(&self, state: &SessionState) {
        self.snapshots.send_replace(state.snapshot());
    }

    fn publish_chapters(&self, state: &SessionState) {
        self.chapters
            .send_replace(Arc::new(state.archive.chapters().to_vec()));
    }
}
