use reqwest::header::HeaderValue;
use reqwest::Url;

use crate::error::{AppError, Result};

use super::{ApiConfig, Config, StoreConfig, SyncConfig};

/// Validate a merged configuration and surface every problem at once.
pub fn validate_config(config: &Config) -> Result<()> {
    let mut issues = Vec::new();

    validate_api(&config.api, &mut issues);
    validate_store(&config.store, &mut issues);
    validate_sync(&config.sync, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_api(api: &ApiConfig, issues: &mut Vec<String>) {
    match Url::parse(&api.base_url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => issues.push(format!(
            "api.base_url must use http or https, found `{}`",
            url.scheme()
        )),
        Err(err) => issues.push(format!("api.base_url `{}` is not a URL: {err}", api.base_url)),
    }

    if api.user_agent.trim().is_empty() {
        issues.push("api.user_agent must not be empty".to_string());
    } else if HeaderValue::from_str(&api.user_agent).is_err() {
        issues.push("api.user_agent is not a valid header value".to_string());
    }

    if api.timeout.is_zero() {
        issues.push("api.timeout_ms must be greater than zero".to_string());
    }
}

fn validate_store(store: &StoreConfig, issues: &mut Vec<String>) {
    if store.path.as_os_str().is_empty() {
        issues.push("store.path must not be empty".to_string());
    } else if store.path.file_name().is_none() {
        issues.push(format!(
            "store.path `{}` must name a file",
            store.path.display()
        ));
    }
}

fn validate_sync(sync: &SyncConfig, issues: &mut Vec<String>) {
    if sync.rate_limit_floor == 0 {
        issues.push("sync.rate_limit_floor must be at least 1".to_string());
    }
}
