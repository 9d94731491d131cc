use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;

use crate::error::{Context, Result};

use super::{validator, Config, VisitOrder};

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV_VAR: &str = "THOT_SYNC_CONFIG";
/// Config file picked up from the working directory when present.
pub const DEFAULT_CONFIG_FILE: &str = "thot-sync.json";

/// Pick the config source for this run: `$THOT_SYNC_CONFIG`, then
/// `thot-sync.json` in the working directory, then the builtin defaults.
pub fn resolve() -> Result<Config> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        log::info!("Loading configuration from {}", path.display());
        return load_config(&path);
    }

    let local = Path::new(DEFAULT_CONFIG_FILE);
    if local.exists() {
        log::info!("Loading configuration from {}", local.display());
        return load_config(local);
    }

    log::debug!("No config file found, using builtin defaults");
    Ok(Config::builtin())
}

/// Read a JSON file of overrides and lay it over the builtin defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read config JSON at {}", path.display()))?;

    let raw: RawConfig = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse config JSON at {}", path.display()))?;

    let config = raw.apply(Config::builtin());
    validator::validate_config(&config)?;
    Ok(config)
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    api: RawApiConfig,
    #[serde(default)]
    store: RawStoreConfig,
    #[serde(default)]
    sync: RawSyncConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawApiConfig {
    base_url: Option<String>,
    user_agent: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStoreConfig {
    path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSyncConfig {
    sleep_interval_ms: Option<u64>,
    rate_limit_floor: Option<u32>,
    ticker_refresh: Option<bool>,
    user_refresh: Option<bool>,
    visit_order: Option<VisitOrder>,
}

impl RawConfig {
    fn apply(self, mut config: Config) -> Config {
        let api = &mut config.api;
        if let Some(base_url) = self.api.base_url {
            api.base_url = base_url;
        }
        if let Some(user_agent) = self.api.user_agent {
            api.user_agent = user_agent;
        }
        if let Some(ms) = self.api.timeout_ms {
            api.timeout = Duration::from_millis(ms);
        }

        if let Some(path) = self.store.path {
            config.store.path = path;
        }

        let sync = &mut config.sync;
        if let Some(ms) = self.sync.sleep_interval_ms {
            sync.sleep_interval = Duration::from_millis(ms);
        }
        if let Some(floor) = self.sync.rate_limit_floor {
            sync.rate_limit_floor = floor;
        }
        if let Some(enabled) = self.sync.ticker_refresh {
            sync.ticker_refresh = enabled;
        }
        if let Some(enabled) = self.sync.user_refresh {
            sync.user_refresh = enabled;
        }
        if let Some(order) = self.sync.visit_order {
            sync.visit_order = order;
        }

        config
    }
}
