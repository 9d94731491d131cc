use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod loader;
pub mod validator;

pub use loader::{load_config, resolve, CONFIG_ENV_VAR, DEFAULT_CONFIG_FILE};

/// Order in which the refresh phases walk the known tickers and usernames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisitOrder {
    #[default]
    Sorted,
    Shuffled,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause inserted before every per-ticker and per-user request.
    pub sleep_interval: Duration,
    /// The run stops once the remote reports fewer remaining requests than this.
    pub rate_limit_floor: u32,
    pub ticker_refresh: bool,
    pub user_refresh: bool,
    pub visit_order: VisitOrder,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub store: StoreConfig,
    pub sync: SyncConfig,
}

impl Config {
    pub fn builtin() -> Self {
        Config {
            api: ApiConfig {
                base_url: "https://api.thetagang.com".to_string(),
                user_agent: "thot-sync".to_string(),
                timeout: Duration::from_secs(5),
            },
            store: StoreConfig {
                path: PathBuf::from("database/db.json"),
            },
            sync: SyncConfig {
                sleep_interval: Duration::from_secs(1),
                rate_limit_floor: 5,
                ticker_refresh: true,
                user_refresh: false,
                visit_order: VisitOrder::Sorted,
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::builtin()
    }
}
