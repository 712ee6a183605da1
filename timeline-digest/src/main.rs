use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use timeline_digest::{build_pipeline, run_schedule, AppConfig};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "timeline-digest", about = "Periodic digest of a social timeline")]
struct Cli {
    /// TOML file layered between the defaults and DIGEST_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the pipeline once and exit
    Run,
    /// Run on the configured interval until Ctrl-C
    Schedule,
    /// Print the resolved configuration
    Config,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("timeline-digest error: {error:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level)?;

    let config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Config => {
            let rendered = serde_json::to_string_pretty(&config.redacted())?;
            println!("{}", rendered);
        }
        Command::Run => {
            let pipeline = build_pipeline(&config).await?;
            let report = pipeline.run_once(Utc::now()).await?;
            info!(
                "Run {} done: fetched {}, accepted {}, ranked {}, clusters {}, delivered {}",
                report.run_id,
                report.fetched,
                report.accepted,
                report.ranked,
                report.clusters,
                report.delivered
            );
        }
        Command::Schedule => {
            let pipeline = build_pipeline(&config).await?;
            let every = config.schedule_interval()?;
            info!("Scheduling digest every {} minutes", config.pipeline.schedule_interval_minutes);

            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            };
            let runs = run_schedule(&pipeline, every, shutdown).await;
            info!("Scheduler stopped after {} runs", runs);
        }
    }

    Ok(())
}

fn init_tracing(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;

    Ok(())
}
