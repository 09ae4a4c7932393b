use anyhow::Context as _;
use atrium_engine::EngineConfig;
use atrium_engine::engine::Engine;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "atrium")]
#[command(about = "Replay thread events and inspect local usage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Apply a JSON-lines event log and print the resulting snapshot
    Replay {
        /// Event log, or `-` for stdin
        path: PathBuf,
        /// Print one thread's conversation instead of the sidebar
        #[arg(long)]
        thread: Option<String>,
        /// Show every unpinned root instead of the collapsed list
        #[arg(long)]
        expanded: bool,
    },
    /// Summarize token usage from local Codex session logs
    Usage {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = EngineConfig::from_env()?;

    let output = match cli.command {
        Commands::Replay {
            path,
            thread,
            expanded,
        } => {
            let input = if path.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("failed to read stdin")?
            } else {
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read {}", path.display()))?
            };

            let (handle, _events) = Engine::start(&config);
            let report = atrium_engine::replay_lines(&handle, &input).await?;
            tracing::info!(
                applied = report.applied,
                skipped = report.skipped,
                rev = report.rev,
                "replay finished"
            );

            match thread {
                Some(thread) => serde_json::to_string_pretty(
                    &handle
                        .conversation_snapshot(atrium_api::ThreadId(thread))
                        .await?,
                ),
                None => serde_json::to_string_pretty(&handle.app_snapshot(expanded).await?),
            }
        }
        Commands::Usage { days } => {
            let summary = atrium_engine::local_usage::local_usage_snapshot(&config, days).await?;
            serde_json::to_string_pretty(&summary)
        }
    }
    .context("failed to serialize output")?;

    println!("{output}");
    Ok(())
}
