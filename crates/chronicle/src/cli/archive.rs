//! Archive command handler.

use super::AppContext;
use chronicle::{ChronicleResult, RunPhase, RunSnapshot};
use tracing::{info, warn};

/// Archive a session, pausing cleanly on Ctrl-C.
///
/// Without `full` this continues an unfinished run if one is on disk, and
/// otherwise archives only the messages after the watermark.
pub async fn run_archive(
    ctx: &AppContext,
    session_id: &str,
    full: bool,
    skip: &[u32],
) -> ChronicleResult<()> {
    let session = ctx.session(session_id).await?;

    let prepared = match session.prepare_run(!full).await {
        Ok(snapshot) => snapshot,
        Err(e) if e.is_empty_input() => {
            println!("Nothing to archive in session '{}'", session_id);
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    if prepared.phase == RunPhase::Reviewing {
        for chunk in session.chunks().await {
            if chunk.selected && skip.contains(&chunk.display_id) {
                session.toggle_selection(chunk.index).await?;
            }
        }
        print_chunks(&session.chunks().await);
    } else {
        if !skip.is_empty() {
            warn!("Ignoring --skip while resuming an unfinished run");
        }
        println!("{}", prepared.status_text);
    }

    let mut snapshots = session.subscribe();
    let progress = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if snapshot.phase == RunPhase::Processing {
                info!(
                    percent = snapshot.progress_percent,
                    "{}", snapshot.status_text
                );
            }
        }
    });

    let run = session.execute();
    tokio::pin!(run);
    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            println!("Pausing after the current chunk...");
            session.pause().await?;
            run.await
        }
    };
    progress.abort();

    let snapshot = result?;
    print_summary(&snapshot);
    Ok(())
}

fn print_chunks(chunks: &[chronicle::Chunk]) {
    println!("{:<8} {:<9} {:>8}  Preview", "Chapter", "Selected", "Messages");
    println!("{:-<80}", "");
    for chunk in chunks {
        println!(
            "{:<8} {:<9} {:>8}  {}",
            chunk.display_id,
            if chunk.selected { "yes" } else { "no" },
            chunk.messages.len(),
            chunk.preview_text
        );
    }
    println!("{:-<80}", "");
}

fn print_summary(snapshot: &RunSnapshot) {
    match snapshot.phase {
        RunPhase::Completed => println!(
            "Archived {} of {} chunks",
            snapshot.committed_chunks, snapshot.total_chunks
        ),
        RunPhase::Paused => println!(
            "{} ({}% done). Run `chronicle archive` again to continue.",
            snapshot.status_text, snapshot.progress_percent
        ),
        _ => println!("{}", snapshot.status_text),
    }
}
