use crate::app::{driver::SyncDriver, state::RunState};
use crate::config::{self, Config};
use crate::error::Result;
use crate::fetch::ThotFetcher;
use crate::records::{JsonStore, RunLock, Table};

/// Entry point used by `main`: resolve configuration, then run one sync pass.
pub async fn run() -> Result<RunState> {
    let config = config::resolve()?;
    run_with(config).await
}

/// Run one sync pass with an explicit configuration, holding the store lock throughout.
pub async fn run_with(config: Config) -> Result<RunState> {
    let _lock = RunLock::acquire(&config.store.path)?;
    let mut store = JsonStore::open(&config.store.path)?;
    log::info!(
        "Opened {} ({} users, {} trades)",
        store.path().display(),
        store.len(Table::Users),
        store.len(Table::Trades)
    );

    let fetcher = ThotFetcher::new(&config.api)?;
    let driver = SyncDriver::new(fetcher, config.sync);
    let state = driver.run(&mut store).await?;

    log::info!(
        "Finished: {state}; store now holds {} users and {} trades",
        store.len(Table::Users),
        store.len(Table::Trades)
    );
    Ok(state)
}
