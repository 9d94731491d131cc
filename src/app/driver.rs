use std::collections::BTreeSet;

use rand::seq::SliceRandom;
use serde_json::Value;
use tokio::time::sleep;

use crate::config::{SyncConfig, VisitOrder};
use crate::error::{AppError, Result};
use crate::fetch::{ThotFilter, ThotPayload, ThotSource};
use crate::records::{
    JsonStore, Record, Table, TradeRecord, UserRecord, SYMBOL_FIELD, USERNAME_FIELD,
};
use crate::utils::format_duration;

use super::state::RunState;

/// Runs one pass: bootstrap fetch, then the per-ticker and per-user refresh phases.
pub struct SyncDriver<S> {
    source: S,
    config: SyncConfig,
}

impl<S: ThotSource> SyncDriver<S> {
    pub fn new(source: S, config: SyncConfig) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Drive every enabled phase against `store`.
    ///
    /// Hitting the rate limit ends the run early with `Ok`; any fetch error
    /// aborts it. Everything fetched before either point is already on disk.
    pub async fn run(&self, store: &mut JsonStore) -> Result<RunState> {
        let mut state = RunState::default();

        log::info!("Getting the most recent thots");
        self.fetch_and_store(&ThotFilter::All, store, &mut state).await?;

        if self.config.ticker_refresh && !state.rate_limited {
            let tickers = self.visit_order(store.distinct(Table::Trades, SYMBOL_FIELD));
            log::info!("Refreshing {} known tickers", tickers.len());
            self.refresh(tickers, ThotFilter::Ticker, store, &mut state)
                .await?;
        }

        if self.config.user_refresh && !state.rate_limited {
            let users = self.visit_order(store.distinct(Table::Users, USERNAME_FIELD));
            log::info!("Refreshing {} known users", users.len());
            self.refresh(users, ThotFilter::Username, store, &mut state)
                .await?;
        }

        if state.rate_limited {
            match state.last_rate_limit {
                Some(limit) => log::warn!("Reached the rate limit, exiting now. {limit}"),
                None => log::warn!("Reached the rate limit, exiting now."),
            }
        }

        Ok(state)
    }

    async fn refresh(
        &self,
        keys: Vec<String>,
        to_filter: fn(String) -> ThotFilter,
        store: &mut JsonStore,
        state: &mut RunState,
    ) -> Result<()> {
        for key in keys {
            if state.rate_limited {
                break;
            }

            if !self.config.sleep_interval.is_zero() {
                log::info!(
                    "Sleeping for {}",
                    format_duration(self.config.sleep_interval)
                );
                sleep(self.config.sleep_interval).await;
            }

            let filter = to_filter(key);
            log::info!("{filter}: getting latest thots");
            self.fetch_and_store(&filter, store, state).await?;
        }
        Ok(())
    }

    async fn fetch_and_store(
        &self,
        filter: &ThotFilter,
        store: &mut JsonStore,
        state: &mut RunState,
    ) -> Result<()> {
        let outcome = self.source.fetch(filter).await?;
        state.observe(outcome.rate_limit, self.config.rate_limit_floor);

        match outcome.payload {
            ThotPayload::Thots { pairs, discarded } => {
                state.tally.discarded += discarded;
                for pair in pairs {
                    if let Some(user) = pair.user {
                        store_user(store, state, user);
                    }
                    if let Some(trade) = pair.trade {
                        store_trade(store, state, trade);
                    }
                }
            }
            // Username lookups carry no user half, so only trades are refreshed.
            ThotPayload::Trades { trades, discarded } => {
                state.tally.discarded += discarded;
                for trade in trades {
                    store_trade(store, state, trade);
                }
            }
        }

        store.flush()
    }

    fn visit_order(&self, keys: BTreeSet<String>) -> Vec<String> {
        let mut keys: Vec<String> = keys.into_iter().collect();
        if self.config.visit_order == VisitOrder::Shuffled {
            keys.shuffle(&mut rand::thread_rng());
        }
        keys
    }
}

fn store_user(store: &mut JsonStore, state: &mut RunState, value: Value) {
    match UserRecord::from_value(value) {
        Ok(user) => {
            log::debug!("user {} ({})", user.guid(), user.username().unwrap_or("?"));
            upsert(store, state, Table::Users, user.into());
        }
        Err(err) => skip(state, Table::Users, &err),
    }
}

fn store_trade(store: &mut JsonStore, state: &mut RunState, value: Value) {
    match TradeRecord::from_value(value) {
        Ok(trade) => {
            log::debug!("trade {} ({})", trade.guid(), trade.symbol().unwrap_or("?"));
            upsert(store, state, Table::Trades, trade.into());
        }
        Err(err) => skip(state, Table::Trades, &err),
    }
}

fn upsert(store: &mut JsonStore, state: &mut RunState, table: Table, record: Record) {
    let outcome = store.upsert(table, record);
    state.tally.record(outcome);
}

fn skip(state: &mut RunState, table: Table, err: &AppError) {
    log::warn!("Skipping {table} record: {err}");
    state.tally.skipped += 1;
}
