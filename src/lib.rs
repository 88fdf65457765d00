pub mod azure_auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod reports;
pub mod sql;
pub mod storage;

pub use config::Config;
pub use error::{BillingError, SqlFailure};
