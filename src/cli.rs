use crate::reports::YearMonth;
use crate::storage::{BillingFormat, DEFAULT_EXTENSION};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Provision and query a Synapse serverless SQL pool over billing exports.
#[derive(Debug, Parser)]
#[command(name = "synapse-billing")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the config file (default: synapse.toml)
    #[arg(short, long, global = true, env = "SYNAPSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log at debug level regardless of the configured level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wait for the workspace, then create the database, storage access
    /// objects, views and principal user
    Provision(ProvisionArgs),

    /// Drop and recreate the billing views
    CreateViews(ViewArgs),

    /// List export files and derive the OPENROWSET path pattern
    ScanStorage(ScanArgs),

    /// Read the newest export file's header and report its layout
    DetectFormat(ScanArgs),

    /// List databases, views, tables and storage access objects
    Inspect,

    /// Check each hop from token to database and suggest fixes
    Diagnose,

    /// Print the script an admin runs to create the principal's database user
    UserSql {
        /// Write the script to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print an ODBC connection string for the billing database
    ConnectionString {
        /// Include the client secret instead of a placeholder
        #[arg(long)]
        show_secret: bool,

        /// Database to connect to (default: the billing database)
        #[arg(long)]
        database: Option<String>,
    },

    /// Run an ad-hoc query and print the result
    Query(QueryArgs),

    /// Cost analysis reports
    #[command(subcommand)]
    Report(ReportCommand),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatChoice {
    /// Detect from the newest file (requires --scan)
    Auto,
    Focus,
    Standard,
    Csp,
}

impl FormatChoice {
    pub fn fixed(self) -> Option<BillingFormat> {
        match self {
            FormatChoice::Auto => None,
            FormatChoice::Focus => Some(BillingFormat::Focus),
            FormatChoice::Standard => Some(BillingFormat::Standard),
            FormatChoice::Csp => Some(BillingFormat::Csp),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct ViewArgs {
    /// Derive the BULK path from a storage listing instead of `export_path`
    #[arg(long)]
    pub scan: bool,

    /// Export layout the views are built for
    #[arg(long, value_enum, default_value_t = FormatChoice::Auto)]
    pub format: FormatChoice,

    /// Print the generated SQL without executing it
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ProvisionArgs {
    #[command(flatten)]
    pub views: ViewArgs,

    /// Skip the initial wait for the workspace endpoint
    #[arg(long)]
    pub no_wait: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ScanArgs {
    /// File extension to look for
    #[arg(short, long, default_value = DEFAULT_EXTENSION)]
    pub extension: String,

    /// Directory inside the container (default: `export_path`)
    #[arg(short, long)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// SQL text to run
    #[arg(conflicts_with = "file", required_unless_present = "file")]
    pub sql: Option<String>,

    /// Read the SQL from a file
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Database to run against (default: the billing database)
    #[arg(long)]
    pub database: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ReportCommand {
    /// Total cost per customer subscription or billing account
    Customers {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,
    },

    /// Subscriptions whose cost grew between two months
    Increases {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,

        /// Earlier month, YYYY-MM (default: the month before --after)
        #[arg(long, value_parser = parse_year_month)]
        before: Option<YearMonth>,

        /// Later month, YYYY-MM (default: last month)
        #[arg(long, value_parser = parse_year_month)]
        after: Option<YearMonth>,

        /// Minimum growth in percent
        #[arg(long, default_value_t = 10.0)]
        threshold: f64,

        /// Ignore subscriptions below this cost in the later month
        #[arg(long, default_value_t = 100.0)]
        min_cost: f64,
    },

    /// Cost per subscription and service category over a date range
    Summary {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,

        /// First day, YYYY-MM-DD (default: 30 days before --end)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long)]
        end: Option<NaiveDate>,
    },

    /// Daily totals from the daily cost view
    Daily {
        #[arg(long, default_value = crate::sql::views::DAILY_VIEW)]
        view: String,

        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },

    /// Resources with the highest total cost
    Resources {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,

        #[arg(short, long, default_value_t = 20)]
        limit: u32,
    },

    /// Total cost per Azure region
    Locations {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,
    },

    /// Services with the highest total cost
    Services {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,

        #[arg(short, long, default_value_t = 10)]
        limit: u32,
    },

    /// Total cost per month
    Trend {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,
    },

    /// Row count and sample rows of a view
    Smoke {
        #[arg(long, default_value = crate::sql::views::RAW_VIEW)]
        view: String,

        #[arg(short, long, default_value_t = 5)]
        rows: u32,
    },
}

fn parse_year_month(s: &str) -> Result<YearMonth, String> {
    s.parse().map_err(|e: crate::error::BillingError| e.to_string())
}
