use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use reqwest::header::HeaderMap;

use crate::error::AppError;
use crate::utils::format_utc;

use super::FetchResult;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Rate-limit window reported by the API on every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub remaining: u32,
    pub reset_at: DateTime<Utc>,
}

impl RateLimit {
    pub fn from_headers(headers: &HeaderMap) -> FetchResult<Self> {
        let remaining = integer_header(headers, REMAINING_HEADER)?;
        let remaining = u32::try_from(remaining).map_err(|_| {
            AppError::protocol(format!(
                "header {REMAINING_HEADER} is out of range: {remaining}"
            ))
        })?;

        let reset = integer_header(headers, RESET_HEADER)?;
        let reset_at = Utc.timestamp_opt(reset, 0).single().ok_or_else(|| {
            AppError::protocol(format!("header {RESET_HEADER} is not a valid epoch: {reset}"))
        })?;

        Ok(Self {
            remaining,
            reset_at,
        })
    }

    /// True once fewer than `floor` requests remain in the window.
    pub fn is_exhausted(&self, floor: u32) -> bool {
        self.remaining < floor
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Remaining requests: {} until {}",
            self.remaining,
            format_utc(&self.reset_at)
        )
    }
}

fn integer_header(headers: &HeaderMap, name: &str) -> FetchResult<i64> {
    let value = headers
        .get(name)
        .ok_or_else(|| AppError::protocol(format!("response is missing header {name}")))?;
    let text = value
        .to_str()
        .map_err(|_| AppError::protocol(format!("header {name} is not valid text")))?;
    text.trim()
        .parse::<i64>()
        .map_err(|_| AppError::protocol(format!("header {name} is not an integer: `{text}`")))
}
