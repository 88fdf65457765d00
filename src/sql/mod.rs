//! Everything sent to the serverless SQL endpoint.
//!
//! Layout:
//! - `connection.rs`: connection settings, the TDS client and `SqlExecutor`
//! - `retry.rs`: waiting for a workspace or database that is not ready yet
//! - `runner.rs`: ordered DDL batches that keep going past failures
//! - `views.rs`, `columns.rs`: OPENROWSET view templates and type mappings
//! - `security.rs`: database, credential, data source and user DDL
//! - `catalog.rs`: inspection queries

pub mod catalog;
pub mod columns;
pub mod connection;
pub mod quote;
pub mod result;
pub mod retry;
pub mod runner;
pub mod security;
pub mod views;

pub use connection::{ConnectionSpec, SqlExecutor, SynapseClient};
pub use result::{Cell, QueryResult};
pub use retry::RetrySchedule;
pub use runner::{BatchReport, SqlStep, StepOutcome, execute_batch};
