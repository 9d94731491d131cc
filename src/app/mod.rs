pub mod bootstrap;
pub mod driver;
pub mod state;

pub use bootstrap::{run, run_with};
pub use driver::SyncDriver;
pub use state::{RunState, Tally};
