//! Session management command handlers.

use super::AppContext;
use chronicle::{
    ChatMessage, ChronicleResult, JsonError, MessageSource, SessionId, StorageError,
    StorageErrorKind,
};
use std::path::Path;

/// Store the messages of a JSON file as a session's log.
pub async fn import_messages(
    ctx: &AppContext,
    session_id: &str,
    file: &Path,
    append: bool,
) -> ChronicleResult<()> {
    let raw = tokio::fs::read_to_string(file).await.map_err(|e| {
        StorageError::new(StorageErrorKind::FileRead(format!(
            "{}: {}",
            file.display(),
            e
        )))
    })?;
    let messages: Vec<ChatMessage> =
        serde_json::from_str(&raw).map_err(|e| JsonError::new(e.to_string()))?;

    let session = SessionId::new(session_id);
    if append {
        ctx.store.append_messages(&session, &messages).await?;
    } else {
        ctx.store.import_messages(&session, &messages).await?;
    }

    let total = ctx.store.load_messages(&session).await?.len();
    println!(
        "Imported {} messages into '{}' ({} total)",
        messages.len(),
        session_id,
        total
    );
    Ok(())
}

/// Print a session's chapters.
pub async fn show_chapters(ctx: &AppContext, session_id: &str, json: bool) -> ChronicleResult<()> {
    let session = ctx.session(session_id).await?;
    let chapters = session.chapters().await;

    if json {
        let out =
            serde_json::to_string_pretty(&chapters).map_err(|e| JsonError::new(e.to_string()))?;
        println!("{}", out);
        return Ok(());
    }

    if chapters.is_empty() {
        println!("No chapters in session '{}'", session_id);
        return Ok(());
    }

    for chapter in &chapters {
        let marker = match (chapter.is_error, chapter.manual) {
            (true, _) => " [failed]",
            (_, true) => " [manual]",
            _ => "",
        };
        println!("Chapter {}: {}{}", chapter.chapter_number, chapter.title, marker);
        if !chapter.time_range.is_empty() {
            println!("{}", chapter.time_range);
        }
        println!();
        println!("{}", chapter.narrative);
        for quote in &chapter.key_quotes {
            println!("  > {}", quote);
        }
        println!("{:-<80}", "");
    }
    println!("Total: {} chapters", chapters.len());
    Ok(())
}

/// Regenerate one chapter.
pub async fn retry_chapter(ctx: &AppContext, session_id: &str, chapter: u32) -> ChronicleResult<()> {
    let session = ctx.session(session_id).await?;
    match session.retry_chunk(chapter).await? {
        Some(regenerated) if regenerated.is_error => {
            println!("Chapter {} failed again: {}", chapter, regenerated.narrative);
        }
        Some(regenerated) => {
            println!("Chapter {} regenerated: {}", chapter, regenerated.title);
        }
        None => println!("Retry of chapter {} was cancelled", chapter),
    }
    Ok(())
}

/// Print the run state of a session.
pub async fn show_status(ctx: &AppContext, session_id: &str) -> ChronicleResult<()> {
    let session = ctx.session(session_id).await?;
    let snapshot = session.snapshot();
    let chapters = session.chapters().await;

    println!("Session:  {}", session_id);
    println!("Phase:    {}", snapshot.phase);
    println!("Status:   {}", snapshot.status_text);
    println!(
        "Chapters: {} ({} failed)",
        chapters.len(),
        chapters.iter().filter(|c| c.is_error).count()
    );
    if let Some(watermark) = session.watermark().await {
        println!("Archived through message {}", watermark.message_id);
    }
    if session.auto_archive_due().await? {
        println!("Enough new messages have arrived to archive them");
    }
    Ok(())
}

/// Discard the current run while keeping every chapter.
pub async fn reset_run(ctx: &AppContext, session_id: &str) -> ChronicleResult<()> {
    let session = ctx.session(session_id).await?;
    let snapshot = session.cancel().await?;
    println!("{}", snapshot.status_text);
    Ok(())
}
