//! OPENROWSET view templates over exported CSV files.

use crate::sql::columns::{self, ColumnDef};
use crate::sql::quote::{quote_ident, quote_literal, quote_nliteral};
use crate::sql::runner::SqlStep;
use crate::storage::format::BillingFormat;

pub const RAW_VIEW: &str = "BillingData";
pub const FOCUS_VIEW: &str = "BillingDataFOCUS";
pub const DAILY_VIEW: &str = "DailyCosts";
pub const CSP_VIEW: &str = "BillingDataCSP";

/// Where OPENROWSET reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkSource {
    /// Absolute `https://` or `abfss://` path pattern.
    Url(String),
    /// Path pattern relative to an external data source.
    DataSource { name: String, path: String },
}

impl BulkSource {
    fn render(&self) -> Vec<String> {
        match self {
            BulkSource::Url(url) => vec![format!("BULK {}", quote_literal(url))],
            BulkSource::DataSource { name, path } => vec![
                format!("BULK {}", quote_literal(path)),
                format!("DATA_SOURCE = {}", quote_literal(name)),
            ],
        }
    }
}

/// How the first CSV line is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvHeader {
    /// Column names come from the header line.
    HeaderRow,
    /// Start reading at this 1-based row; names come from `WITH`.
    FirstRow(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDefinition {
    pub name: String,
    /// Projection expressions; empty means `*`.
    pub select: Vec<String>,
    pub bulk: BulkSource,
    pub header: CsvHeader,
    /// Explicit `WITH` mapping; empty means let the parser infer.
    pub columns: Vec<ColumnDef>,
    pub alias: String,
    pub group_by: Vec<String>,
}

impl ViewDefinition {
    pub fn new(name: impl Into<String>, bulk: BulkSource) -> Self {
        let name = name.into();
        Self {
            alias: format!("{name}Rows"),
            name,
            select: Vec::new(),
            bulk,
            header: CsvHeader::HeaderRow,
            columns: Vec::new(),
            group_by: Vec::new(),
        }
    }

    pub fn select<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        self
    }

    pub fn header(mut self, header: CsvHeader) -> Self {
        self.header = header;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn group_by<I, S>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_by = exprs.into_iter().map(Into::into).collect();
        self
    }

    pub fn drop_if_exists_sql(&self) -> String {
        format!(
            "IF EXISTS (SELECT * FROM sys.views WHERE name = {}) DROP VIEW {}",
            quote_nliteral(&self.name),
            quote_ident(&self.name)
        )
    }

    pub fn create_sql(&self) -> String {
        format!(
            "CREATE VIEW {} AS\n{}",
            quote_ident(&self.name),
            self.select_sql()
        )
    }

    /// The view body on its own, usable as an ad-hoc query.
    pub fn select_sql(&self) -> String {
        let projection = if self.select.is_empty() {
            "*".to_string()
        } else {
            self.select.join(",\n    ")
        };

        let mut sql = format!(
            "SELECT {projection}\nFROM {}",
            openrowset(&self.bulk, self.header)
        );
        if !self.columns.is_empty() {
            let with = self
                .columns
                .iter()
                .map(|c| format!("    {} {}", quote_ident(&c.name), c.sql_type))
                .collect::<Vec<_>>()
                .join(",\n");
            sql.push_str(&format!("\nWITH (\n{with}\n)"));
        }
        sql.push_str(&format!(" AS {}", quote_ident(&self.alias)));
        if !self.group_by.is_empty() {
            sql.push_str(&format!("\nGROUP BY {}", self.group_by.join(", ")));
        }
        sql
    }

    /// Drop then create, as two separate batches.
    pub fn recreate_steps(&self) -> [SqlStep; 2] {
        [
            SqlStep::new(format!("drop view {}", self.name), self.drop_if_exists_sql()),
            SqlStep::new(format!("create view {}", self.name), self.create_sql()),
        ]
    }
}

fn openrowset(bulk: &BulkSource, header: CsvHeader) -> String {
    let mut args = bulk.render();
    args.push("FORMAT = 'CSV'".to_string());
    args.push("PARSER_VERSION = '2.0'".to_string());
    args.push(match header {
        CsvHeader::HeaderRow => "HEADER_ROW = TRUE".to_string(),
        CsvHeader::FirstRow(n) => format!("FIRSTROW = {n}"),
    });
    format!("OPENROWSET(\n    {}\n)", args.join(",\n    "))
}

/// `SELECT TOP 1 *` over a path pattern; used to discover CSV columns and to
/// check that a pattern matches any file at all.
pub fn first_row_sql(bulk: &BulkSource) -> String {
    format!(
        "SELECT TOP 1 *\nFROM {} AS [FirstRow]",
        openrowset(bulk, CsvHeader::HeaderRow)
    )
}

pub fn row_count_sql(view: &str) -> String {
    format!("SELECT COUNT(*) AS RecordCount FROM {}", quote_ident(view))
}

/// All columns, names taken from the header line.
pub fn raw_view(bulk: BulkSource) -> ViewDefinition {
    ViewDefinition::new(RAW_VIEW, bulk).alias("BillingExport")
}

pub fn focus_view(bulk: BulkSource) -> ViewDefinition {
    let columns = columns::focus_columns();
    ViewDefinition::new(FOCUS_VIEW, bulk)
        .select(columns.iter().map(|c| quote_ident(&c.name)))
        .columns(columns)
        .alias("FOCUSData")
}

pub fn daily_costs_view(bulk: BulkSource) -> ViewDefinition {
    ViewDefinition::new(DAILY_VIEW, bulk)
        .select([
            "CAST(ChargePeriodStart AS DATE) AS [Date]",
            "ServiceCategory",
            "ServiceName",
            "SUM(EffectiveCost) AS TotalCost",
            "BillingCurrency",
            "COUNT(*) AS TransactionCount",
        ])
        .columns(columns::daily_cost_columns())
        .alias("DailyData")
        .group_by([
            "CAST(ChargePeriodStart AS DATE)",
            "ServiceCategory",
            "ServiceName",
            "BillingCurrency",
        ])
}

/// Legacy daily export; header skipped and names supplied explicitly.
pub fn legacy_view(bulk: BulkSource) -> ViewDefinition {
    ViewDefinition::new(RAW_VIEW, bulk)
        .header(CsvHeader::FirstRow(2))
        .columns(columns::legacy_columns())
        .alias("BillingData")
}

pub fn csp_view(bulk: BulkSource) -> ViewDefinition {
    ViewDefinition::new(CSP_VIEW, bulk)
        .select([
            "*",
            "COALESCE(SubscriptionId, CustomerTenantId) AS EntityId",
            "COALESCE(SubscriptionName, CustomerName) AS EntityName",
        ])
        .header(CsvHeader::FirstRow(2))
        .columns(columns::csp_columns())
        .alias("CSPBillingData")
}

/// The standard set over FOCUS exports: raw, typed and daily aggregate.
pub fn billing_views(bulk: BulkSource) -> Vec<ViewDefinition> {
    vec![
        raw_view(bulk.clone()),
        focus_view(bulk.clone()),
        daily_costs_view(bulk),
    ]
}

/// The view set for one export layout, all reading the same files.
pub fn views_for_format(format: BillingFormat, bulk: BulkSource) -> Vec<ViewDefinition> {
    match format {
        BillingFormat::Focus => billing_views(bulk),
        BillingFormat::Standard => vec![legacy_view(bulk)],
        BillingFormat::Csp => vec![csp_view(bulk)],
    }
}

/// Every drop first, then every create.
pub fn recreate_all(views: &[ViewDefinition]) -> Vec<SqlStep> {
    let (drops, creates): (Vec<_>, Vec<_>) = views
        .iter()
        .map(|v| {
            let [drop, create] = v.recreate_steps();
            (drop, create)
        })
        .unzip();
    drops.into_iter().chain(creates).collect()
}
