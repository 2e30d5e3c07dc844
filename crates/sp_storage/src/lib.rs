use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use sp_core::{ArticleQueue, Error, Result, WatchRegistry};

pub mod backends;

pub use backends::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!(
                "Unknown storage backend: {} (expected memory or sqlite)",
                other
            ))),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => write!(f, "memory"),
            Self::Sqlite => write!(f, "sqlite"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: StorageKind,
    /// Connection URL, only read by the sqlite backend
    pub url: String,
    /// Registry documents to load at startup
    pub seed: Option<PathBuf>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: StorageKind::Memory,
            url: "sqlite:stockpulse.db".to_string(),
            seed: None,
        }
    }
}

/// The two persistent collaborators of an ingestion run.
#[derive(Clone)]
pub struct Storage {
    pub registry: Arc<dyn WatchRegistry>,
    pub queue: Arc<dyn ArticleQueue>,
}

pub async fn open_storage(config: &BackendConfig) -> Result<Storage> {
    let storage = match config.kind {
        StorageKind::Memory => {
            let memory = match &config.seed {
                Some(path) => MemoryStorage::from_json_file(path).await?,
                None => MemoryStorage::new(),
            };
            let memory = Arc::new(memory);
            return Ok(Storage {
                registry: memory.clone(),
                queue: memory,
            });
        }
        StorageKind::Sqlite => open_sqlite(&config.url).await?,
    };

    if let Some(path) = &config.seed {
        let raw = tokio::fs::read_to_string(path).await?;
        let watchlists: Vec<sp_core::UserWatchlist> = serde_json::from_str(&raw)?;
        for watchlist in &watchlists {
            storage.registry.save_watchlist(watchlist).await?;
        }
        tracing::info!(users = watchlists.len(), path = %path.display(), "Seeded watchlists");
    }

    Ok(storage)
}

#[cfg(feature = "sqlite")]
async fn open_sqlite(url: &str) -> Result<Storage> {
    let sqlite = Arc::new(SQLiteStorage::connect(url).await?);
    Ok(Storage {
        registry: sqlite.clone(),
        queue: sqlite,
    })
}

#[cfg(not(feature = "sqlite"))]
async fn open_sqlite(_url: &str) -> Result<Storage> {
    Err(Error::Config(
        "sp_storage was built without the sqlite feature".to_string(),
    ))
}
