use std::fmt;

use serde_json::Value;

use crate::error::Result;

pub mod decode;
pub mod rate_limit;
pub mod request;
pub mod thots;

pub use rate_limit::RateLimit;
pub use request::{HttpClient, RawResponse};
pub use thots::ThotFetcher;

pub type FetchResult<T> = Result<T>;

/// Which slice of thots a request asks for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThotFilter {
    All,
    Ticker(String),
    Username(String),
}

impl ThotFilter {
    /// Username lookups go to `trades`; everything else goes to `thots`.
    pub fn resource(&self) -> &'static str {
        match self {
            ThotFilter::All | ThotFilter::Ticker(_) => "thots",
            ThotFilter::Username(_) => "trades",
        }
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        match self {
            ThotFilter::All => Vec::new(),
            ThotFilter::Ticker(symbol) => vec![("ticker", symbol.as_str())],
            ThotFilter::Username(name) => vec![("username", name.as_str())],
        }
    }
}

impl fmt::Display for ThotFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThotFilter::All => f.write_str("latest thots"),
            ThotFilter::Ticker(symbol) => write!(f, "ticker {symbol}"),
            ThotFilter::Username(name) => write!(f, "user {name}"),
        }
    }
}

/// One item of the `thots` array with its halves split apart. Null halves are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThotPair {
    pub user: Option<Value>,
    pub trade: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ThotPayload {
    /// Paired user/trade objects from `GET /thots`; `discarded` counts null items.
    Thots { pairs: Vec<ThotPair>, discarded: usize },
    /// Bare trade objects from `GET /trades`; `discarded` counts null items.
    Trades { trades: Vec<Value>, discarded: usize },
}

/// Decoded body plus the rate-limit state the server reported alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub payload: ThotPayload,
    pub rate_limit: RateLimit,
}

/// Anything that can answer a thot query. The sync driver only talks to this seam.
#[allow(async_fn_in_trait)]
pub trait ThotSource {
    async fn fetch(&self, filter: &ThotFilter) -> FetchResult<FetchOutcome>;
}
