//! Month-over-month cost increases per subscription.

use crate::error::BillingError;
use crate::sql::QueryResult;
use crate::sql::quote::{quote_ident, quote_nliteral};
use chrono::{Datelike, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

const CHARGE_DATE: &str = "TRY_CAST(ChargePeriodStart AS DATE)";
const EFFECTIVE_COST: &str = "TRY_CAST(EffectiveCost AS FLOAT)";

/// A calendar month, written `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Result<Self, BillingError> {
        if !(1..=12).contains(&month) {
            return Err(BillingError::InvalidInput(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        Ok(Self { year, month })
    }

    pub fn current() -> Self {
        let today = Utc::now().date_naive();
        Self {
            year: today.year(),
            month: today.month(),
        }
    }

    pub fn year(self) -> i32 {
        self.year
    }

    pub fn month(self) -> u32 {
        self.month
    }

    pub fn previous(self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    fn filter(self) -> String {
        format!("(YEAR({CHARGE_DATE}) = {} AND MONTH({CHARGE_DATE}) = {})", self.year, self.month)
    }

    fn case_cost(self) -> String {
        format!(
            "SUM(CASE WHEN YEAR({CHARGE_DATE}) = {} AND MONTH({CHARGE_DATE}) = {} THEN {EFFECTIVE_COST} ELSE 0 END)",
            self.year, self.month
        )
    }
}

impl FromStr for YearMonth {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BillingError::InvalidInput(format!("expected YYYY-MM, got '{s}'"));
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year = year.parse().map_err(|_| invalid())?;
        let month = month.parse().map_err(|_| invalid())?;
        YearMonth::new(year, month)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Which changes count as an increase worth reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IncreaseThresholds {
    /// Minimum growth, in percent of the earlier month.
    pub min_percent: f64,
    /// Ignore subscriptions cheaper than this in the later month.
    pub min_cost: f64,
}

impl Default for IncreaseThresholds {
    fn default() -> Self {
        Self {
            min_percent: 10.0,
            min_cost: 100.0,
        }
    }
}

/// Per-subscription totals for the two months being compared.
pub fn monthly_costs_sql(view: &str, before: YearMonth, after: YearMonth) -> String {
    format!(
        "SELECT SubAccountName AS Subscription,\n    \
         YEAR({CHARGE_DATE}) AS [Year],\n    \
         MONTH({CHARGE_DATE}) AS [Month],\n    \
         SUM({EFFECTIVE_COST}) AS TotalCost\n\
         FROM {}\n\
         WHERE SubAccountName IS NOT NULL AND SubAccountName != ''\n    \
         AND ({} OR {})\n\
         GROUP BY SubAccountName, YEAR({CHARGE_DATE}), MONTH({CHARGE_DATE})",
        quote_ident(view),
        before.filter(),
        after.filter()
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCost {
    pub subscription: String,
    pub month: YearMonth,
    pub cost: f64,
}

/// Read rows produced by [`monthly_costs_sql`]; rows with unusable values
/// are dropped.
pub fn parse_monthly_costs(result: &QueryResult) -> Vec<MonthlyCost> {
    (0..result.rows.len())
        .filter_map(|row| {
            let subscription = result.get(row, "Subscription")?.as_text()?;
            let year = result.get(row, "Year")?.as_i64()?;
            let month = result.get(row, "Month")?.as_i64()?;
            let cost = result.get(row, "TotalCost")?.as_f64().unwrap_or(0.0);
            let month = YearMonth::new(i32::try_from(year).ok()?, u32::try_from(month).ok()?).ok()?;
            Some(MonthlyCost {
                subscription,
                month,
                cost,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostChange {
    pub subscription: String,
    pub before: f64,
    pub after: f64,
}

impl CostChange {
    pub fn absolute(&self) -> f64 {
        self.after - self.before
    }

    /// Growth in percent; `None` when there was no earlier cost to compare to.
    pub fn percent(&self) -> Option<f64> {
        (self.before > 0.0).then(|| (self.after - self.before) / self.before * 100.0)
    }

    /// No cost in the earlier month but some in the later one.
    pub fn is_new(&self) -> bool {
        self.before <= 0.0 && self.after > 0.0
    }
}

/// Subscriptions whose cost grew past `thresholds`, new subscriptions first
/// (largest first), then by growth percent.
pub fn compare_months(
    costs: &[MonthlyCost],
    before: YearMonth,
    after: YearMonth,
    thresholds: IncreaseThresholds,
) -> Vec<CostChange> {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for cost in costs {
        let entry = totals.entry(cost.subscription.as_str()).or_default();
        if cost.month == before {
            entry.0 += cost.cost;
        } else if cost.month == after {
            entry.1 += cost.cost;
        }
    }

    let mut changes: Vec<CostChange> = totals
        .into_iter()
        .map(|(subscription, (before, after))| CostChange {
            subscription: subscription.to_string(),
            before,
            after,
        })
        .filter(|c| c.after > thresholds.min_cost)
        .filter(|c| c.is_new() || c.percent().is_some_and(|p| p > thresholds.min_percent))
        .collect();

    changes.sort_by(|a, b| match (a.percent(), b.percent()) {
        (None, None) => b.after.total_cmp(&a.after),
        (None, Some(_)) => std::cmp::Ordering::Less,
        (Some(_), None) => std::cmp::Ordering::Greater,
        (Some(pa), Some(pb)) => pb.total_cmp(&pa),
    });
    changes
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IncreaseSummary {
    pub new_count: usize,
    pub new_cost: f64,
    pub increased_count: usize,
    pub increased_change: f64,
    pub average_percent: Option<f64>,
}

pub fn summarize(changes: &[CostChange]) -> IncreaseSummary {
    let mut summary = IncreaseSummary::default();
    let mut percents = Vec::new();
    for change in changes {
        match change.percent() {
            None => {
                summary.new_count += 1;
                summary.new_cost += change.after;
            }
            Some(p) => {
                summary.increased_count += 1;
                summary.increased_change += change.absolute();
                percents.push(p);
            }
        }
    }
    if !percents.is_empty() {
        summary.average_percent = Some(percents.iter().sum::<f64>() / percents.len() as f64);
    }
    summary
}

/// The `n` largest increases in absolute terms.
pub fn top_by_absolute(changes: &[CostChange], n: usize) -> Vec<&CostChange> {
    let mut sorted: Vec<&CostChange> = changes.iter().collect();
    sorted.sort_by(|a, b| b.absolute().total_cmp(&a.absolute()));
    sorted.truncate(n);
    sorted
}

/// Services that grew inside the given subscriptions. `None` when there is
/// nothing to break down.
pub fn service_changes_sql(
    view: &str,
    subscriptions: &[&str],
    before: YearMonth,
    after: YearMonth,
    thresholds: IncreaseThresholds,
) -> Option<String> {
    if subscriptions.is_empty() {
        return None;
    }
    let names = subscriptions
        .iter()
        .map(|s| quote_nliteral(s))
        .collect::<Vec<_>>()
        .join(", ");
    let factor = 1.0 + thresholds.min_percent / 100.0;
    let (before_cost, after_cost) = (before.case_cost(), after.case_cost());

    Some(format!(
        "SELECT SubAccountName AS Subscription,\n    \
         ServiceName,\n    \
         {before_cost} AS BeforeCost,\n    \
         {after_cost} AS AfterCost,\n    \
         {after_cost} - {before_cost} AS Change\n\
         FROM {}\n\
         WHERE SubAccountName IN ({names})\n    \
         AND ServiceName IS NOT NULL\n    \
         AND ({} OR {})\n\
         GROUP BY SubAccountName, ServiceName\n\
         HAVING {after_cost} > {before_cost} * {factor}\n\
         ORDER BY Subscription, Change DESC",
        quote_ident(view),
        before.filter(),
        after.filter()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_steps_back_across_years() {
        let jan: YearMonth = "2025-01".parse().unwrap();
        assert_eq!(jan.previous().to_string(), "2024-12");
        assert!("2025-13".parse::<YearMonth>().is_err());
        assert!("July".parse::<YearMonth>().is_err());
    }

    #[test]
    fn percent_is_undefined_without_earlier_cost() {
        let change = CostChange {
            subscription: "new".into(),
            before: 0.0,
            after: 250.0,
        };
        assert!(change.is_new());
        assert_eq!(change.percent(), None);
    }
}
