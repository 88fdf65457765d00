//! One function per subcommand.
//!
//! Every command gets its own [`Context`]: a config, one HTTP client and a
//! token cache. Connections are opened per command and closed before it
//! returns.

mod diagnose;
mod inspect;
mod provision;
mod query;
mod report;
mod storage;
mod views;

use crate::azure_auth::{TokenProvider, build_http_client};
use crate::cli::{Command, ReportCommand};
use crate::config::{Config, SQL_SCOPE};
use crate::error::BillingError;
use crate::sql::retry::connect_with_retry;
use crate::sql::{ConnectionSpec, SynapseClient};
use crate::storage::DfsClient;
use std::time::Duration;

/// Sleep between DDL statements of one batch.
pub const STEP_PAUSE: Duration = Duration::from_secs(2);

pub struct Context {
    pub config: Config,
    pub http: reqwest::Client,
    pub tokens: TokenProvider,
}

impl Context {
    pub fn new(config: Config) -> Result<Self, BillingError> {
        let http = build_http_client(&config)?;
        let tokens = TokenProvider::from_config(&config, http.clone())?;
        Ok(Self {
            config,
            http,
            tokens,
        })
    }

    pub fn billing_spec(&self) -> ConnectionSpec {
        ConnectionSpec::billing(&self.config)
    }

    /// One connection attempt, no retry.
    pub async fn connect_once(&self, spec: &ConnectionSpec) -> Result<SynapseClient, BillingError> {
        let token = self.tokens.token(SQL_SCOPE).await?;
        SynapseClient::connect(spec, &token).await
    }

    /// Connect to the billing database, retrying along the configured schedule.
    pub async fn connect_billing(&self) -> Result<SynapseClient, BillingError> {
        connect_with_retry(&self.billing_spec(), &self.tokens, &self.config.retry).await
    }

    pub fn dfs(&self) -> Result<DfsClient<'_>, BillingError> {
        DfsClient::from_config(&self.config, self.http.clone(), &self.tokens)
    }
}

/// Run one parsed subcommand.
pub async fn run(command: Command, config: Config) -> Result<(), BillingError> {
    // These only render text and need no token.
    match &command {
        Command::UserSql { output } => return query::user_sql(&config, output.as_deref()).await,
        Command::ConnectionString {
            show_secret,
            database,
        } => return query::connection_string(&config, *show_secret, database.as_deref()),
        _ => {}
    }

    let ctx = Context::new(config)?;
    match command {
        Command::Provision(args) => provision::run(&ctx, &args).await,
        Command::CreateViews(args) => views::create_views(&ctx, &args).await,
        Command::ScanStorage(args) => storage::scan_storage(&ctx, &args).await,
        Command::DetectFormat(args) => storage::detect_format(&ctx, &args).await,
        Command::Inspect => inspect::run(&ctx).await,
        Command::Diagnose => diagnose::run(&ctx).await,
        Command::Query(args) => query::run(&ctx, &args).await,
        Command::Report(report) => match report {
            ReportCommand::Customers { view } => report::customers(&ctx, &view).await,
            ReportCommand::Increases {
                view,
                before,
                after,
                threshold,
                min_cost,
            } => report::increases(&ctx, &view, before, after, threshold, min_cost).await,
            ReportCommand::Summary { view, start, end } => {
                report::summary(&ctx, &view, start, end).await
            }
            ReportCommand::Daily { view, days } => report::daily(&ctx, &view, days).await,
            ReportCommand::Resources { view, limit } => {
                report::resources(&ctx, &view, limit).await
            }
            ReportCommand::Locations { view } => report::locations(&ctx, &view).await,
            ReportCommand::Services { view, limit } => report::services(&ctx, &view, limit).await,
            ReportCommand::Trend { view } => report::trend(&ctx, &view).await,
            ReportCommand::Smoke { view, rows } => report::smoke(&ctx, &view, rows).await,
        },
        Command::UserSql { .. } | Command::ConnectionString { .. } => Ok(()),
    }
}
