use crate::error::BillingError;
use crate::sql::quote::quote_ident;
use crate::sql::views::row_count_sql;
use crate::sql::{QueryResult, SqlExecutor};
use chrono::{Days, NaiveDate};
use tracing::info;

/// Window used by `report summary` when no start date is given.
pub const DEFAULT_SUMMARY_DAYS: u64 = 30;

pub fn top_services_sql(view: &str, limit: u32) -> String {
    format!(
        "SELECT TOP {limit} ServiceName,\n    \
         ServiceCategory,\n    \
         SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost,\n    \
         COUNT(*) AS Transactions\n\
         FROM {}\n\
         WHERE ServiceName IS NOT NULL AND ServiceName != ''\n\
         GROUP BY ServiceName, ServiceCategory\n\
         ORDER BY TotalCost DESC",
        quote_ident(view)
    )
}

/// Inclusive `start..=end` window for the billing summary.
///
/// `end` defaults to `today`, `start` to [`DEFAULT_SUMMARY_DAYS`] before `end`.
pub fn summary_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate), BillingError> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => end
            .checked_sub_days(Days::new(DEFAULT_SUMMARY_DAYS))
            .ok_or_else(|| BillingError::InvalidInput(format!("--end {end} is out of range")))?,
    };
    if start > end {
        return Err(BillingError::InvalidInput(format!(
            "--start ({start}) must not be after --end ({end})"
        )));
    }
    Ok((start, end))
}

/// Cost per subscription and service category between two dates, both inclusive.
pub fn billing_summary_sql(view: &str, start: NaiveDate, end: NaiveDate) -> String {
    format!(
        "SELECT SubAccountName,\n    \
         ServiceCategory,\n    \
         SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost,\n    \
         COUNT(*) AS Transactions,\n    \
         COUNT(DISTINCT TRY_CAST(ChargePeriodStart AS DATE)) AS DaysActive\n\
         FROM {}\n\
         WHERE TRY_CAST(ChargePeriodStart AS DATE) BETWEEN '{}' AND '{}'\n\
         GROUP BY SubAccountName, ServiceCategory\n\
         ORDER BY TotalCost DESC",
        quote_ident(view),
        start.format("%Y-%m-%d"),
        end.format("%Y-%m-%d")
    )
}

/// Daily totals over the last `days` days of a daily cost view.
pub fn daily_costs_sql(view: &str, days: u32) -> String {
    format!(
        "SELECT [Date],\n    \
         SUM(TotalCost) AS DailyCost,\n    \
         COUNT(DISTINCT ServiceName) AS Services\n\
         FROM {}\n\
         WHERE [Date] >= DATEADD(day, -{days}, CAST(GETDATE() AS DATE))\n\
         GROUP BY [Date]\n\
         ORDER BY [Date] DESC",
        quote_ident(view)
    )
}

pub fn top_resources_sql(view: &str, limit: u32) -> String {
    format!(
        "SELECT TOP {limit} ResourceName,\n    \
         ResourceType,\n    \
         SubAccountName,\n    \
         SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost\n\
         FROM {}\n\
         WHERE ResourceId IS NOT NULL AND ResourceId != ''\n\
         GROUP BY ResourceName, ResourceType, SubAccountName\n\
         ORDER BY TotalCost DESC",
        quote_ident(view)
    )
}

pub fn cost_by_location_sql(view: &str) -> String {
    format!(
        "SELECT COALESCE(NULLIF(Region, ''), 'Unassigned') AS Location,\n    \
         SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost,\n    \
         COUNT(DISTINCT ResourceId) AS Resources\n\
         FROM {}\n\
         GROUP BY COALESCE(NULLIF(Region, ''), 'Unassigned')\n\
         ORDER BY TotalCost DESC",
        quote_ident(view)
    )
}

pub fn monthly_trend_sql(view: &str) -> String {
    format!(
        "SELECT YEAR(TRY_CAST(ChargePeriodStart AS DATE)) AS [Year],\n    \
         MONTH(TRY_CAST(ChargePeriodStart AS DATE)) AS [Month],\n    \
         SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost,\n    \
         COUNT(*) AS Transactions\n\
         FROM {}\n\
         WHERE TRY_CAST(ChargePeriodStart AS DATE) IS NOT NULL\n\
         GROUP BY YEAR(TRY_CAST(ChargePeriodStart AS DATE)), MONTH(TRY_CAST(ChargePeriodStart AS DATE))\n\
         ORDER BY [Year] DESC, [Month] DESC",
        quote_ident(view)
    )
}

pub fn sample_rows_sql(view: &str, rows: u32) -> String {
    format!("SELECT TOP {rows} * FROM {}", quote_ident(view))
}

/// Row count and a few sample rows from one view.
#[derive(Debug, Clone, PartialEq)]
pub struct SmokeTest {
    pub view: String,
    pub rows: i64,
    pub sample: QueryResult,
}

/// Prove a view can actually read its files.
pub async fn smoke_test<E: SqlExecutor>(
    executor: &mut E,
    view: &str,
    sample_rows: u32,
) -> Result<SmokeTest, BillingError> {
    let count = executor.query(&row_count_sql(view)).await?;
    let rows = count.scalar().and_then(|c| c.as_i64()).unwrap_or(0);
    info!(view, rows, "view is readable");

    let sample = if rows > 0 && sample_rows > 0 {
        executor.query(&sample_rows_sql(view, sample_rows)).await?
    } else {
        QueryResult::default()
    };
    Ok(SmokeTest {
        view: view.to_string(),
        rows,
        sample,
    })
}
