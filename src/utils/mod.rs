pub mod time;

pub use time::{format_duration, format_utc};
