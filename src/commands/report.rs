use super::Context;
use crate::error::BillingError;
use crate::output::{self, format_money, format_percent};
use crate::reports::increases::{
    compare_months, monthly_costs_sql, parse_monthly_costs, service_changes_sql, summarize,
    top_by_absolute,
};
use crate::reports::summary::{
    billing_summary_sql, cost_by_location_sql, daily_costs_sql, monthly_trend_sql, summary_range,
    top_resources_sql, top_services_sql,
};
use crate::reports::{CustomerGrouping, IncreaseThresholds, YearMonth, smoke_test};
use crate::sql::{Cell, SqlExecutor};
use chrono::{NaiveDate, Utc};
use tracing::warn;

/// Subscriptions whose services are broken down after an increase report.
const SERVICE_BREAKDOWN: usize = 5;

pub(super) async fn customers(ctx: &Context, view: &str) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;

    let mut found = false;
    for grouping in CustomerGrouping::FALLBACK {
        match client.query(&grouping.sql(view)).await {
            Ok(result) if !result.is_empty() => {
                output::heading(grouping.title());
                output::print_result(&result);
                found = true;
                break;
            }
            Ok(_) => warn!(?grouping, "no rows, trying the next grouping"),
            Err(e) => warn!(?grouping, error = %e, "grouping not available"),
        }
    }
    if !found {
        output::warning("no customer columns with data in this view");
    }

    // Extension columns only exist in some exports.
    let owners = CustomerGrouping::AccountOwner;
    match client.query(&owners.sql(view)).await {
        Ok(result) if !result.is_empty() => {
            output::heading(owners.title());
            output::print_result(&result);
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "account owner columns not available"),
    }
    client.close().await
}

pub(super) async fn increases(
    ctx: &Context,
    view: &str,
    before: Option<YearMonth>,
    after: Option<YearMonth>,
    threshold: f64,
    min_cost: f64,
) -> Result<(), BillingError> {
    let after = after.unwrap_or_else(|| YearMonth::current().previous());
    let before = before.unwrap_or_else(|| after.previous());
    if before >= after {
        return Err(BillingError::InvalidInput(format!(
            "--before ({before}) must be earlier than --after ({after})"
        )));
    }
    let thresholds = IncreaseThresholds {
        min_percent: threshold,
        min_cost,
    };

    let mut client = ctx.connect_billing().await?;
    let result = client.query(&monthly_costs_sql(view, before, after)).await?;
    let changes = compare_months(&parse_monthly_costs(&result), before, after, thresholds);

    output::heading(&format!(
        "Cost increases over {}% from {before} to {after} (cost above {})",
        threshold,
        format_money(min_cost)
    ));
    if changes.is_empty() {
        output::success("no subscription grew past the threshold");
        return client.close().await;
    }

    let rows = changes
        .iter()
        .map(|c| {
            vec![
                c.subscription.clone(),
                format_money(c.before),
                format_money(c.after),
                format_money(c.absolute()),
                c.percent().map(format_percent).unwrap_or_else(|| "NEW".to_string()),
            ]
        })
        .collect();
    let (before_label, after_label) = (before.to_string(), after.to_string());
    output::print_rows(
        &["Subscription", before_label.as_str(), after_label.as_str(), "Change", "Percent"],
        rows,
    );

    let summary = summarize(&changes);
    output::heading("Summary");
    println!(
        "New subscriptions:       {} ({})",
        summary.new_count,
        format_money(summary.new_cost)
    );
    println!(
        "Increased subscriptions: {} (+{})",
        summary.increased_count,
        format_money(summary.increased_change)
    );
    if let Some(avg) = summary.average_percent {
        println!("Average increase:        {}", format_percent(avg));
    }

    let top = top_by_absolute(&changes, SERVICE_BREAKDOWN);
    output::heading("Largest increases");
    for (i, change) in top.iter().enumerate() {
        println!(
            "{}. {}: +{}",
            i + 1,
            change.subscription,
            format_money(change.absolute())
        );
    }

    let names: Vec<&str> = top.iter().map(|c| c.subscription.as_str()).collect();
    if let Some(sql) = service_changes_sql(view, &names, before, after, thresholds) {
        output::heading("Services driving the increase");
        match client.query(&sql).await {
            Ok(result) => output::print_result(&result),
            Err(e) => output::warning(&format!("service breakdown failed: {e}")),
        }
    }
    client.close().await
}

pub(super) async fn summary(
    ctx: &Context,
    view: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<(), BillingError> {
    let (start, end) = summary_range(start, end, Utc::now().date_naive())?;
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&billing_summary_sql(view, start, end)).await?;
    output::heading(&format!("Billing summary {start} to {end}"));
    output::print_result(&result);

    let total: f64 = result
        .column_index("TotalCost")
        .map(|i| {
            result
                .rows
                .iter()
                .filter_map(|row| row.get(i).and_then(Cell::as_f64))
                .sum()
        })
        .unwrap_or(0.0);
    println!("Total: {}", format_money(total));
    client.close().await
}

pub(super) async fn daily(ctx: &Context, view: &str, days: u32) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&daily_costs_sql(view, days)).await?;
    output::heading(&format!("Daily costs, last {days} days"));
    output::print_result(&result);
    client.close().await
}

pub(super) async fn resources(ctx: &Context, view: &str, limit: u32) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&top_resources_sql(view, limit)).await?;
    output::heading(&format!("Top {limit} resources by cost"));
    output::print_result(&result);
    client.close().await
}

pub(super) async fn locations(ctx: &Context, view: &str) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&cost_by_location_sql(view)).await?;
    output::heading("Cost by location");
    output::print_result(&result);
    client.close().await
}

pub(super) async fn services(ctx: &Context, view: &str, limit: u32) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&top_services_sql(view, limit)).await?;
    output::heading(&format!("Top {limit} services by cost"));
    output::print_result(&result);
    client.close().await
}

pub(super) async fn trend(ctx: &Context, view: &str) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let result = client.query(&monthly_trend_sql(view)).await?;
    output::heading("Monthly cost trend");
    output::print_result(&result);
    client.close().await
}

pub(super) async fn smoke(ctx: &Context, view: &str, rows: u32) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    let outcome = smoke_test(&mut client, view, rows).await;
    client.close().await?;

    let smoke = match outcome {
        Ok(smoke) => smoke,
        Err(e) => {
            output::failure(&e.to_string());
            output::print_remediation(e.failure());
            return Err(e);
        }
    };
    output::heading(&format!("{}: {} rows", smoke.view, smoke.rows));
    if !smoke.sample.is_empty() {
        output::print_result(&smoke.sample);
    }
    Ok(())
}
