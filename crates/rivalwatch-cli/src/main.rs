mod alerts;
mod crawl;
mod scan;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rivalwatch_core::{IsolationStrategy, Platform};
use tracing_subscriber::EnvFilter;

use crate::alerts::AlertsCommands;

#[derive(Debug, Parser)]
#[command(name = "rivalwatch-cli")]
#[command(about = "Competitor monitoring command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scan one competitor now
    Scan {
        /// Competitor id
        #[arg(long)]
        competitor: i64,
        /// Restrict the scan to these platforms (repeatable)
        #[arg(long = "platform")]
        platforms: Vec<Platform>,
    },
    /// Scan every competitor whose next scheduled scan has passed
    ScanDue,
    /// Crawl URLs and print the results as JSON, without touching the database
    Crawl {
        #[arg(required = true)]
        urls: Vec<String>,
        /// Isolation strategy (defaults to `RIVALWATCH_CRAWL_STRATEGY`)
        #[arg(long)]
        strategy: Option<IsolationStrategy>,
        /// Natural-language extraction instruction; enables LLM extraction
        #[arg(long)]
        instruction: Option<String>,
        /// JSON schema for extraction output; enables LLM extraction
        #[arg(long)]
        schema: Option<String>,
        /// Extraction provider, e.g. openai/gpt-4o-mini
        #[arg(long)]
        provider: Option<String>,
    },
    /// Show the monitoring status of a competitor
    Status {
        #[arg(long)]
        competitor: i64,
    },
    Alerts {
        #[command(subcommand)]
        command: AlertsCommands,
    },
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Crawl worker mode: one request on stdin, one response on stdout
    #[command(hide = true)]
    CrawlWorker,
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Upsert competitors from the competitors file
    Seed,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("rivalwatch-cli ready; run with --help for commands");
        return Ok(());
    };

    // Worker mode needs no configuration; the request carries its settings.
    if matches!(command, Commands::CrawlWorker) {
        init_tracing("warn")?;
        rivalwatch_crawler::run_worker_stdio().await?;
        return Ok(());
    }

    let config = rivalwatch_core::load_app_config()?;
    init_tracing(&config.log_level)?;

    match command {
        Commands::Crawl {
            urls,
            strategy,
            instruction,
            schema,
            provider,
        } => {
            crawl::run_crawl(
                &config,
                &urls,
                strategy,
                instruction,
                schema.as_deref(),
                provider,
            )
            .await
        }
        Commands::Db {
            command: DbCommands::Seed,
        } => {
            let file = rivalwatch_core::load_competitors(&config.competitors_path)
                .with_context(|| {
                    format!(
                        "loading competitors from {}",
                        config.competitors_path.display()
                    )
                })?;
            tracing::info!(
                path = %config.competitors_path.display(),
                competitors = file.competitors.len(),
                "seeding competitors"
            );
            let pool = rivalwatch_db::connect_pool_from_config(&config).await?;
            let count = rivalwatch_db::seed_competitors(&pool, &file.competitors).await?;
            println!("seeded {count} competitors");
            Ok(())
        }
        Commands::Db {
            command: DbCommands::Migrate,
        } => {
            let pool = rivalwatch_db::connect_pool_from_config(&config).await?;
            let applied = rivalwatch_db::run_migrations(&pool).await?;
            tracing::info!(applied, "migrations up to date");
            println!("migrations applied: {applied}");
            Ok(())
        }
        Commands::Db {
            command: DbCommands::Ping,
        } => {
            let pool = rivalwatch_db::connect_pool_from_config(&config).await?;
            rivalwatch_db::ping(&pool).await?;
            println!("database ok");
            Ok(())
        }
        Commands::Scan {
            competitor,
            platforms,
        } => {
            let monitor = scan::build_monitor(&config).await?;
            scan::run_scan(&monitor, competitor, &platforms).await
        }
        Commands::ScanDue => {
            let monitor = scan::build_monitor(&config).await?;
            scan::run_scan_due(&monitor).await
        }
        Commands::Status { competitor } => scan::run_status(&config, competitor).await,
        Commands::Alerts { command } => alerts::run_alerts(&config, command).await,
        Commands::CrawlWorker => Ok(()),
    }
}

/// Logs go to stderr so command output on stdout stays machine-readable.
fn init_tracing(default_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}
