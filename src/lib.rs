pub mod app;
pub mod config;
pub mod error;
pub mod fetch;
pub mod records;
pub mod utils;

pub use error::{AppError, Result};
