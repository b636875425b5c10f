//! Precis CLI - five-bullet text summarisation
//!
//! The application logic is contained in lib.rs, and this file is responsible
//! for parsing arguments and handling top-level errors.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use colored::Colorize;
use precis::gateway::GeminiGateway;
use precis::prompt::MAX_INPUT_CHARS;
use precis::{Config, Storage, SummarySession};
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "precis")]
#[command(author, version, about = "Five-bullet text summarisation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarise text into five bullet points
    Summarise {
        /// Text to summarise (reads --file, piped stdin or $EDITOR when omitted)
        text: Option<String>,
        /// Read the text from a file
        #[arg(long, short)]
        file: Option<PathBuf>,
        /// User the summary is stored under
        #[arg(long, short)]
        user: Option<String>,
    },
    /// List past summaries, newest first
    History {
        /// User whose history to show
        #[arg(long, short)]
        user: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    precis::setup_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Summarise { text, file, user } => {
            let text = read_input(text, file)?;
            let user = user.unwrap_or_else(|| config.user.id.clone());

            let gateway = Arc::new(GeminiGateway::new(&config)?);
            let store = Arc::new(Storage::open(&config.storage.path)?);
            let session = SummarySession::new(user, gateway, store);

            session.set_text(text);
            println!("Generating summary...\n");
            if !session.submit().await {
                bail!("nothing to summarise");
            }

            let view = session.view();
            if let Some(error) = view.error {
                eprintln!("{} {}", "Error:".red().bold(), error);
                std::process::exit(1);
            }

            println!("{}", "Summary".bold());
            for point in &view.current_summary {
                println!("  • {}", point);
            }
        }
        Commands::History { user } => {
            let user = user.unwrap_or_else(|| config.user.id.clone());
            let store = Arc::new(Storage::open(&config.storage.path)?);
            let records = precis::history::HistoryReader::new(store)
                .fetch_or_empty(&user)
                .await;

            if records.is_empty() {
                println!("No summaries yet. Generate your first summary!");
            } else {
                println!("Stored summaries ({}):\n", records.len());
                for record in records {
                    println!("📄 {}", format_timestamp(record.timestamp()).dimmed());
                    println!("   {}", preview(record.original_text(), 120));
                    for point in record.summary() {
                        println!("   • {}", point);
                    }
                    println!();
                }
            }
        }
    }

    Ok(())
}

/// Resolve the text to summarise from the argument, a file, stdin or an editor
fn read_input(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    let text = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        (None, None) if !atty::is(atty::Stream::Stdin) => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
        (None, None) => edit::edit("").context("failed to open editor")?,
    };

    let chars = text.chars().count();
    if chars > MAX_INPUT_CHARS {
        bail!("text is {chars} characters, the limit is {MAX_INPUT_CHARS}");
    }
    Ok(text)
}

fn format_timestamp(raw: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        format!("{}…", flat.chars().take(max).collect::<String>())
    }
}
