mod common;

use chronicle_core::{ChapterEditBuilder, ChunkStatus, Direction, RunPhase};
use chronicle_error::ArchiveErrorKind;
use chronicle_narrative::SessionRegistry;
use chronicle_storage::{FileSystemStore, InMemoryStore};
use common::{
    FlakyStore, ScriptedGenerator, messages, numbers, open, processor, session_id, settings,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[tokio::test]
async fn test_pause_waits_for_chunk_in_flight() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..10)).await;
    let generator = ScriptedGenerator::new();
    generator.gate_chapter(2);
    let processor = processor(generator);
    let session = open(store, processor.clone(), settings(2)).await;

    session.prepare_run(false).await.unwrap();
    let run = tokio::spawn({
        let session = session.clone();
        async move { session.execute().await }
    });

    processor.generator().started.notified().await;
    let pausing = session.pause().await.unwrap();
    assert_eq!(pausing.phase, RunPhase::Processing);
    assert_eq!(session.phase().await, RunPhase::Processing);
    assert_eq!(session.snapshot().committed_chunks, 1);

    processor.generator().release.notify_one();
    let paused = run.await.unwrap().unwrap();

    assert_eq!(paused.phase, RunPhase::Paused);
    assert_eq!(paused.next_index, 2);
    assert_eq!(paused.committed_chunks, 2);
    assert_eq!(numbers(&session.chapters().await), vec![1, 2]);
    assert_eq!(processor.generator().calls(), vec![1, 2]);

    let done = session.execute().await.unwrap();
    assert_eq!(done.phase, RunPhase::Completed);
    assert_eq!(numbers(&session.chapters().await), vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_resume_after_restart_matches_uninterrupted_run() {
    // Reference run without interruption
    let reference_dir = tempfile::tempdir().unwrap();
    let reference_store = Arc::new(FileSystemStore::new(reference_dir.path()).unwrap());
    reference_store
        .import_messages(&session_id(), &messages(0..10))
        .await
        .unwrap();
    let reference = open(reference_store, processor(ScriptedGenerator::new()), settings(2)).await;
    reference.prepare_run(false).await.unwrap();
    reference.toggle_selection(3).await.unwrap();
    reference.execute().await.unwrap();
    let expected = reference.chapters().await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileSystemStore::new(dir.path()).unwrap());
    store
        .import_messages(&session_id(), &messages(0..10))
        .await
        .unwrap();

    {
        let generator = ScriptedGenerator::new();
        generator.gate_chapter(2);
        let processor = processor(generator);
        let session = open(store.clone(), processor.clone(), settings(2)).await;
        session.prepare_run(false).await.unwrap();
        session.toggle_selection(3).await.unwrap();

        let run = tokio::spawn({
            let session = session.clone();
            async move { session.execute().await }
        });
        processor.generator().started.notified().await;
        session.pause().await.unwrap();
        processor.generator().release.notify_one();
        assert_eq!(run.await.unwrap().unwrap().next_index, 2);
    }

    // New messages arriving meanwhile must not change the resumed run
    store
        .append_messages(&session_id(), &messages(10..13))
        .await
        .unwrap();

    let processor = processor(ScriptedGenerator::new());
    let reopened = open(
        Arc::new(FileSystemStore::new(dir.path()).unwrap()),
        processor.clone(),
        settings(2),
    )
    .await;
    assert!(reopened.snapshot().status_text.contains("Unfinished run"));

    let restored = reopened.prepare_run(true).await.unwrap();
    assert_eq!(restored.phase, RunPhase::Paused);
    assert_eq!(restored.total_chunks, 5);
    assert_eq!(restored.next_index, 2);
    assert!(!reopened.chunks().await[3].selected);
    assert_eq!(reopened.chunks().await[1].status, ChunkStatus::Success);

    let done = reopened.execute().await.unwrap();
    assert_eq!(done.phase, RunPhase::Completed);
    assert_eq!(processor.generator().calls(), vec![3, 5]);
    assert_eq!(reopened.chapters().await, expected);
}

#[tokio::test]
async fn test_cancel_keeps_committed_chapters() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..8)).await;
    let generator = ScriptedGenerator::new();
    generator.gate_chapter(2);
    let processor = processor(generator);
    let session = open(store.clone(), processor.clone(), settings(2)).await;

    session.prepare_run(false).await.unwrap();
    let run = tokio::spawn({
        let session = session.clone();
        async move { session.execute().await }
    });
    processor.generator().started.notified().await;
    session.cancel().await.unwrap();
    processor.generator().release.notify_one();

    let cancelled = run.await.unwrap().unwrap();
    assert_eq!(cancelled.phase, RunPhase::Idle);
    assert_eq!(cancelled.next_index, 0);
    assert!(session.chunks().await.is_empty());
    assert_eq!(numbers(&session.chapters().await), vec![1, 2]);

    let checkpoint = store.checkpoint(&session_id()).await.unwrap();
    assert_eq!(checkpoint.progress.next_index, 0);
    assert!(checkpoint.progress.run.is_none());
    assert_eq!(numbers(&checkpoint.chapters), vec![1, 2]);
}

#[tokio::test]
async fn test_second_execute_is_rejected_while_running() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..4)).await;
    let generator = ScriptedGenerator::new();
    generator.gate_chapter(1);
    let processor = processor(generator);
    let session = open(store, processor.clone(), settings(2)).await;

    session.prepare_run(false).await.unwrap();
    let run = tokio::spawn({
        let session = session.clone();
        async move { session.execute().await }
    });
    processor.generator().started.notified().await;

    let err = session.execute().await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::RunInProgress));
    let err = session.prepare_run(false).await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::RunInProgress));
    let err = session.retry_chunk(1).await.unwrap_err();
    assert!(matches!(
        err.archive_kind(),
        Some(ArchiveErrorKind::InvalidPhase { .. })
    ));

    processor.generator().release.notify_one();
    assert_eq!(run.await.unwrap().unwrap().phase, RunPhase::Completed);
}

#[tokio::test]
async fn test_failed_checkpoint_rolls_back_and_pauses() {
    let store = Arc::new(FlakyStore::default());
    store.inner.append_messages(&session_id(), messages(0..6)).await;
    let session = open(store.clone(), processor(ScriptedGenerator::new()), settings(2)).await;

    session.prepare_run(false).await.unwrap();
    store.fail_progress.store(true, Ordering::SeqCst);
    assert!(session.execute().await.is_err());
    assert_eq!(session.phase().await, RunPhase::Reviewing);

    store.fail_progress.store(false, Ordering::SeqCst);
    store.fail_chapters.store(true, Ordering::SeqCst);
    assert!(session.execute().await.is_err());
    assert_eq!(session.phase().await, RunPhase::Paused);
    assert!(session.chapters().await.is_empty());
    assert_eq!(session.snapshot().next_index, 0);
    assert!(session.watermark().await.is_none());

    store.fail_chapters.store(false, Ordering::SeqCst);
    let done = session.execute().await.unwrap();
    assert_eq!(done.phase, RunPhase::Completed);
    assert_eq!(numbers(&session.chapters().await), vec![1, 2, 3]);
}

#[tokio::test]
async fn test_archive_edits_write_through_and_roll_back() {
    let store = Arc::new(FlakyStore::default());
    store.inner.append_messages(&session_id(), messages(0..6)).await;
    let session = open(store.clone(), processor(ScriptedGenerator::new()), settings(2)).await;
    session.prepare_run(false).await.unwrap();
    session.execute().await.unwrap();

    assert!(session.move_chapter(0, Direction::Down).await.unwrap());
    assert!(!session.move_chapter(2, Direction::Down).await.unwrap());
    let edit = ChapterEditBuilder::default().title("Renamed").build().unwrap();
    session.edit_chapter(0, edit).await.unwrap();
    let removed = session.delete_chapter(2).await.unwrap();
    assert_eq!(removed.chapter_number, 3);

    let saved = store.inner.checkpoint(&session_id()).await.unwrap();
    assert_eq!(numbers(&saved.chapters), vec![2, 1]);
    assert_eq!(saved.chapters[0].title, "Renamed");

    store.fail_chapters.store(true, Ordering::SeqCst);
    assert!(session.delete_chapter(0).await.is_err());
    assert_eq!(numbers(&session.chapters().await), vec![2, 1]);
}

#[tokio::test]
async fn test_chapter_is_locked_while_retry_in_flight() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..4)).await;
    let processor = processor(ScriptedGenerator::new());
    let session = open(store, processor.clone(), settings(2)).await;
    session.prepare_run(false).await.unwrap();
    session.execute().await.unwrap();
    let before = session.chapters().await;

    processor.generator().gate_chapter(1);
    let retry = tokio::spawn({
        let session = session.clone();
        async move { session.retry_chunk(1).await }
    });
    processor.generator().started.notified().await;

    assert!(session.is_retrying(1));
    let edit = ChapterEditBuilder::default().title("Mine").build().unwrap();
    let err = session.edit_chapter(0, edit).await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::ChapterLocked(1)));
    let err = session.retry_chunk(1).await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::RetryInFlight(1)));

    assert!(session.cancel_retry(1));
    assert!(retry.await.unwrap().unwrap().is_none());
    assert!(!session.is_retrying(1));
    assert_eq!(session.chapters().await, before);
    assert!(!session.cancel_retry(1));
}

#[tokio::test]
async fn test_chapter_is_locked_while_its_chunk_is_processing() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..4)).await;
    let processor = processor(ScriptedGenerator::new());
    let session = open(store, processor.clone(), settings(2)).await;
    session.prepare_run(false).await.unwrap();
    session.execute().await.unwrap();

    // A full pass regenerates chapters that are already in the archive
    processor.generator().gate_chapter(1);
    session.prepare_run(false).await.unwrap();
    let run = tokio::spawn({
        let session = session.clone();
        async move { session.execute().await }
    });
    processor.generator().started.notified().await;

    let edit = ChapterEditBuilder::default().title("Mine").build().unwrap();
    let err = session.edit_chapter(0, edit.clone()).await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::ChapterLocked(1)));
    let err = session.delete_chapter(0).await.unwrap_err();
    assert_eq!(err.archive_kind(), Some(&ArchiveErrorKind::ChapterLocked(1)));
    assert_eq!(session.edit_chapter(1, edit).await.unwrap().title, "Mine");

    processor.generator().release.notify_one();
    assert_eq!(run.await.unwrap().unwrap().phase, RunPhase::Completed);
    assert_eq!(numbers(&session.chapters().await), vec![1, 2]);
}

#[tokio::test]
async fn test_resumed_run_keeps_manual_chapter() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..6)).await;
    let generator = ScriptedGenerator::new();
    generator.gate_chapter(1);
    let processor = processor(generator);
    let session = open(store.clone(), processor.clone(), settings(2)).await;

    session.prepare_run(false).await.unwrap();
    let run = tokio::spawn({
        let session = session.clone();
        async move { session.execute().await }
    });
    processor.generator().started.notified().await;
    session.pause().await.unwrap();
    processor.generator().release.notify_one();
    assert_eq!(run.await.unwrap().unwrap().phase, RunPhase::Paused);

    let manual = chronicle_core::ChapterBuilder::default()
        .chapter_number(0u32)
        .title("Interlude")
        .narrative("Written by hand.")
        .build()
        .unwrap();
    let inserted = session.insert_manual(manual, None).await.unwrap();
    assert_eq!(inserted.chapter_number, 2);

    let done = session.execute().await.unwrap();
    assert_eq!(done.phase, RunPhase::Completed);

    let chapters = session.chapters().await;
    assert_eq!(numbers(&chapters), vec![1, 2, 2, 3]);
    assert_eq!(chapters[1], inserted);
    assert!(!chapters[2].manual);

    // Retrying chapter 2 regenerates the chunk's chapter, not the manual one
    let retried = session.retry_chunk(2).await.unwrap().unwrap();
    assert!(!retried.manual);
    let chapters = session.chapters().await;
    assert_eq!(chapters[1], inserted);
    assert_eq!(chapters[2], retried);

    let saved = store.checkpoint(&session_id()).await.unwrap();
    assert_eq!(saved.chapters.iter().filter(|c| c.manual).count(), 1);
}

#[tokio::test]
async fn test_auto_archive_after_threshold() {
    let store = Arc::new(InMemoryStore::new());
    store.append_messages(&session_id(), messages(0..3)).await;
    let session = open(store.clone(), processor(ScriptedGenerator::new()), settings(2)).await;

    assert!(!session.auto_archive_due().await.unwrap());
    assert!(session.auto_archive().await.unwrap().is_none());

    store.append_messages(&session_id(), messages(3..4)).await;
    assert!(session.auto_archive_due().await.unwrap());
    let done = session.auto_archive().await.unwrap().unwrap();
    assert_eq!(done.phase, RunPhase::Completed);
    assert_eq!(numbers(&session.chapters().await), vec![1, 2]);
    assert!(!session.auto_archive_due().await.unwrap());

    store.append_messages(&session_id(), messages(4..8)).await;
    session.auto_archive().await.unwrap().unwrap();
    assert_eq!(numbers(&session.chapters().await), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn test_registry_sessions_are_independent() {
    let store = Arc::new(InMemoryStore::new());
    let a = chronicle_core::SessionId::new("a");
    let b = chronicle_core::SessionId::new("b");
    store.append_messages(&a, messages(0..4)).await;
    store.append_messages(&b, messages(0..2)).await;

    let registry = SessionRegistry::new(
        processor(ScriptedGenerator::new()),
        store.clone(),
        store.clone(),
        settings(2),
        chronicle_core::ModelConfig::new("mock-model-v1"),
    );

    let first = registry.session(&a).await.unwrap();
    let again = registry.session(&a).await.unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    first.prepare_run(false).await.unwrap();
    let other = registry.session(&b).await.unwrap();
    assert_eq!(other.phase().await, RunPhase::Idle);

    first.execute().await.unwrap();
    assert_eq!(first.chapters().await.len(), 2);
    assert!(other.chapters().await.is_empty());
    assert_eq!(registry.session_ids().await, vec![a.clone(), b.clone()]);

    assert!(registry.close(&a).await.is_some());
    let reopened = registry.session(&a).await.unwrap();
    assert_eq!(reopened.chapters().await.len(), 2);
}
