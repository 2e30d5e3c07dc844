use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use futures::StreamExt;
use sp_core::UserWatchlist;
use sp_scrapers::quotes::YAHOO_FINANCE_URL;
use sp_scrapers::search::EVENT_REGISTRY_URL;
use sp_scrapers::{
    build_client, EventRegistryClient, HtmlTextExtractor, NewsPipeline, PipelineConfig,
    YahooFinanceClient,
};
use sp_storage::{open_storage, BackendConfig, Storage, StorageKind};
use sp_web::AppState;
use tracing::{error, info, warn};

mod logging;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HumanDuration(Duration);

fn unit_seconds(unit: char) -> Option<u64> {
    match unit {
        's' => Some(1),
        'm' => Some(60),
        'h' => Some(3600),
        'd' => Some(86400),
        _ => None,
    }
}

/// `1h15m30s`, `1d 2h`, or a bare number of seconds.
impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let overflow = || format!("Duration is too large: {}", s);
        let mut total: u64 = 0;
        let mut pending: Option<u64> = None;

        for c in s.chars().filter(|c| !c.is_whitespace()) {
            if let Some(digit) = c.to_digit(10) {
                let value = pending
                    .unwrap_or(0)
                    .checked_mul(10)
                    .and_then(|v| v.checked_add(u64::from(digit)))
                    .ok_or_else(overflow)?;
                pending = Some(value);
                continue;
            }
            let scale = unit_seconds(c).ok_or_else(|| format!("Invalid duration unit: {}", c))?;
            let amount = pending
                .take()
                .ok_or_else(|| format!("Missing number before unit: {}", c))?;
            total = amount
                .checked_mul(scale)
                .and_then(|secs| total.checked_add(secs))
                .ok_or_else(overflow)?;
        }

        match pending {
            Some(secs) => total = total.checked_add(secs).ok_or_else(overflow)?,
            None if s.trim().is_empty() => return Err("Duration must include a number".to_string()),
            None => {}
        }

        Ok(HumanDuration(Duration::from_secs(total)))
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Scheduled news ingestion for watched companies", long_about = None)]
struct Cli {
    /// Storage backend for watchlists and the article queue: memory or sqlite
    #[arg(long, env = "SP_STORAGE", default_value = "memory")]
    storage: String,
    #[arg(long, env = "SP_DATABASE_URL", default_value = "sqlite:stockpulse.db")]
    database_url: String,
    /// JSON array of registry documents loaded at startup
    #[arg(long, env = "SP_WATCHLISTS")]
    watchlists: Option<PathBuf>,
    #[arg(long, env = "EVENT_REGISTRY_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "SP_SEARCH_URL", default_value = EVENT_REGISTRY_URL)]
    search_url: String,
    #[arg(long, env = "SP_QUOTE_URL", default_value = YAHOO_FINANCE_URL)]
    quote_url: String,
    /// Per-request timeout for every outbound call (e.g. 30s, 1m)
    #[arg(long, default_value = "30s")]
    timeout: HumanDuration,
    /// How far back each company search reaches
    #[arg(long, default_value = "24h")]
    lookback: HumanDuration,
    /// Companies and articles processed at once
    #[arg(long, default_value_t = 4)]
    concurrency: usize,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Serve the ingestion trigger (GET /) and ticker search (GET /api/search)
    Serve {
        #[arg(long, env = "SP_ADDR", default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
    },
    /// Run the ingestion pipeline once
    Run {
        /// Repeat with the given interval (e.g. 1h, 30m, 1h15m30s)
        #[arg(long)]
        interval: Option<HumanDuration>,
    },
    Users {
        #[command(subcommand)]
        command: UserCommands,
    },
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
}

#[derive(clap::Subcommand, Debug)]
enum UserCommands {
    /// Insert or replace watchlists from a JSON array of registry documents
    Import { file: PathBuf },
    List,
}

#[derive(clap::Subcommand, Debug)]
enum QueueCommands {
    /// Newest queued articles first
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    fn backend_config(&self) -> anyhow::Result<BackendConfig> {
        Ok(BackendConfig {
            kind: self.storage.parse::<StorageKind>()?,
            url: self.database_url.clone(),
            seed: self.watchlists.clone(),
        })
    }

    fn pipeline(&self, storage: &Storage) -> anyhow::Result<NewsPipeline> {
        let api_key = self
            .api_key
            .clone()
            .ok_or_else(|| anyhow!("--api-key or EVENT_REGISTRY_API_KEY is required"))?;
        let client = build_client(self.timeout.0)?;
        let search = EventRegistryClient::new(client.clone(), api_key, &self.search_url)?;
        let lookback = chrono::Duration::from_std(self.lookback.0)
            .context("lookback is out of range")?;

        Ok(NewsPipeline::new(
            storage.registry.clone(),
            Arc::new(search),
            Arc::new(HtmlTextExtractor::new(client)),
            storage.queue.clone(),
        )
        .with_config(PipelineConfig {
            lookback,
            concurrency: self.concurrency.max(1),
        }))
    }
}

async fn run_once(pipeline: &NewsPipeline) -> anyhow::Result<()> {
    let summary = pipeline.run().await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let config = cli.backend_config()?;
    let storage = open_storage(&config).await?;
    info!(backend = %config.kind, "Storage initialized");

    match &cli.command {
        Commands::Serve { addr } => {
            let pipeline = cli.pipeline(&storage)?;
            let tickers = YahooFinanceClient::new(build_client(cli.timeout.0)?, &cli.quote_url)?;
            sp_web::serve(
                *addr,
                AppState {
                    pipeline: Arc::new(pipeline),
                    tickers: Arc::new(tickers),
                },
            )
            .await?;
        }
        Commands::Run { interval } => {
            let pipeline = cli.pipeline(&storage)?;
            if let Some(interval) = interval {
                info!("Running in periodic mode with {}s interval", interval.0.as_secs());
                loop {
                    if let Err(e) = run_once(&pipeline).await {
                        error!(error = %e, "Ingestion run failed");
                    }
                    info!("Waiting {}s before next run", interval.0.as_secs());
                    tokio::time::sleep(interval.0).await;
                }
            } else {
                run_once(&pipeline).await?;
            }
        }
        Commands::Users { command } => match command {
            UserCommands::Import { file } => {
                if config.kind == StorageKind::Memory {
                    warn!("Importing into memory storage, watchlists are lost on exit");
                }
                let raw = tokio::fs::read_to_string(file)
                    .await
                    .with_context(|| format!("Failed to read {}", file.display()))?;
                let watchlists: Vec<UserWatchlist> = serde_json::from_str(&raw)?;
                for watchlist in &watchlists {
                    storage.registry.save_watchlist(watchlist).await?;
                }
                info!(users = watchlists.len(), "Imported watchlists");
            }
            UserCommands::List => {
                let mut watchlists = storage.registry.watchlists();
                while let Some(watchlist) = watchlists.next().await {
                    println!("{}", serde_json::to_string(&watchlist?)?);
                }
            }
        },
        Commands::Queue { command } => match command {
            QueueCommands::List { limit } => {
                for article in storage.queue.recent(*limit).await? {
                    println!("{}", serde_json::to_string(&article)?);
                }
            }
        },
    }

    Ok(())
}
