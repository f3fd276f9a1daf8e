//! Chronicle CLI binary.
//!
//! This binary provides command-line access to the archiver:
//! - Import chat logs
//! - Archive them into chapters, pausing and resuming across restarts
//! - Inspect and regenerate chapters

use clap::Parser;

mod cli;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    use cli::{
        AppContext, Cli, Commands, import_messages, reset_run, retry_chapter, run_archive,
        show_chapters, show_status,
    };

    // Load .env before clap reads env-backed flags
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    chronicle::init_console_telemetry(cli.verbose)?;

    let ctx = AppContext::load(cli.config, cli.data_dir)?;

    match cli.command {
        Commands::Import {
            session,
            file,
            append,
        } => {
            import_messages(&ctx, &session, &file, append).await?;
        }

        Commands::Archive {
            session,
            full,
            skip,
        } => {
            run_archive(&ctx, &session, full, &skip).await?;
        }

        Commands::Chapters { session, json } => {
            show_chapters(&ctx, &session, json).await?;
        }

        Commands::Retry { session, chapter } => {
            retry_chapter(&ctx, &session, chapter).await?;
        }

        Commands::Status { session } => {
            show_status(&ctx, &session).await?;
        }

        Commands::Reset { session } => {
            reset_run(&ctx, &session).await?;
        }
    }

    Ok(())
}
