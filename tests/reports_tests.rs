use synapse_billing::reports::increases::{
    MonthlyCost, compare_months, monthly_costs_sql, parse_monthly_costs, service_changes_sql,
    summarize, top_by_absolute,
};
use chrono::NaiveDate;
use synapse_billing::error::BillingError;
use synapse_billing::reports::summary::{
    billing_summary_sql, cost_by_location_sql, daily_costs_sql, monthly_trend_sql, summary_range,
    top_resources_sql, top_services_sql,
};
use synapse_billing::reports::{CustomerGrouping, IncreaseThresholds, YearMonth};
use synapse_billing::sql::{Cell, QueryResult};

fn month(s: &str) -> YearMonth {
    s.parse().unwrap()
}

fn cost(subscription: &str, m: &str, cost: f64) -> MonthlyCost {
    MonthlyCost {
        subscription: subscription.into(),
        month: month(m),
        cost,
    }
}

#[test]
fn only_meaningful_increases_are_kept() {
    let costs = vec![
        cost("steady", "2025-02", 1000.0),
        cost("steady", "2025-03", 1050.0),
        cost("growing", "2025-02", 400.0),
        cost("growing", "2025-03", 600.0),
        cost("doubling", "2025-02", 200.0),
        cost("doubling", "2025-03", 400.0),
        cost("tiny", "2025-02", 10.0),
        cost("tiny", "2025-03", 90.0),
        cost("fresh", "2025-03", 300.0),
        cost("fresh-big", "2025-03", 900.0),
        cost("gone", "2025-02", 500.0),
    ];

    let changes = compare_months(
        &costs,
        month("2025-02"),
        month("2025-03"),
        IncreaseThresholds::default(),
    );
    let names: Vec<&str> = changes.iter().map(|c| c.subscription.as_str()).collect();

    assert_eq!(names, vec!["fresh-big", "fresh", "doubling", "growing"]);
    assert_eq!(changes[2].percent(), Some(100.0));
    assert_eq!(changes[3].percent(), Some(50.0));
}

#[test]
fn thresholds_are_configurable() {
    let costs = vec![cost("a", "2025-02", 100.0), cost("a", "2025-03", 104.0)];
    let strict = IncreaseThresholds {
        min_percent: 3.0,
        min_cost: 50.0,
    };
    assert_eq!(
        compare_months(&costs, month("2025-02"), month("2025-03"), strict).len(),
        1
    );
    assert!(
        compare_months(
            &costs,
            month("2025-02"),
            month("2025-03"),
            IncreaseThresholds::default()
        )
        .is_empty()
    );
}

#[test]
fn summary_separates_new_from_increased() {
    let costs = vec![
        cost("x", "2025-02", 200.0),
        cost("x", "2025-03", 400.0),
        cost("y", "2025-02", 1000.0),
        cost("y", "2025-03", 1500.0),
        cost("z", "2025-03", 250.0),
    ];
    let changes = compare_months(
        &costs,
        month("2025-02"),
        month("2025-03"),
        IncreaseThresholds::default(),
    );

    let summary = summarize(&changes);
    assert_eq!(summary.new_count, 1);
    assert_eq!(summary.new_cost, 250.0);
    assert_eq!(summary.increased_count, 2);
    assert_eq!(summary.increased_change, 700.0);
    assert_eq!(summary.average_percent, Some(75.0));

    let top: Vec<&str> = top_by_absolute(&changes, 2)
        .into_iter()
        .map(|c| c.subscription.as_str())
        .collect();
    assert_eq!(top, vec!["y", "z"]);
}

#[test]
fn monthly_costs_come_from_query_rows() {
    let result = QueryResult {
        columns: vec![
            "Subscription".into(),
            "Year".into(),
            "Month".into(),
            "TotalCost".into(),
        ],
        rows: vec![
            vec![
                Cell::Text("prod".into()),
                Cell::Int(2025),
                Cell::Int(3),
                Cell::Float(12.5),
            ],
            vec![Cell::Null, Cell::Int(2025), Cell::Int(3), Cell::Float(1.0)],
            vec![
                Cell::Text("dev".into()),
                Cell::Int(2025),
                Cell::Int(13),
                Cell::Float(1.0),
            ],
            vec![
                Cell::Text("test".into()),
                Cell::Int(2025),
                Cell::Int(2),
                Cell::Null,
            ],
        ],
    };

    assert_eq!(
        parse_monthly_costs(&result),
        vec![cost("prod", "2025-03", 12.5), cost("test", "2025-02", 0.0)]
    );
}

#[test]
fn month_filters_land_in_sql() {
    let sql = monthly_costs_sql("BillingDataFOCUS", month("2024-12"), month("2025-01"));
    assert!(sql.contains("FROM [BillingDataFOCUS]"));
    assert!(sql.contains("YEAR(TRY_CAST(ChargePeriodStart AS DATE)) = 2024 AND MONTH(TRY_CAST(ChargePeriodStart AS DATE)) = 12"));
    assert!(sql.contains("YEAR(TRY_CAST(ChargePeriodStart AS DATE)) = 2025 AND MONTH(TRY_CAST(ChargePeriodStart AS DATE)) = 1"));

    assert_eq!(
        service_changes_sql(
            "BillingData",
            &[],
            month("2025-02"),
            month("2025-03"),
            IncreaseThresholds::default()
        ),
        None
    );
    let services = service_changes_sql(
        "BillingData",
        &["prod", "o'neil"],
        month("2025-02"),
        month("2025-03"),
        IncreaseThresholds::default(),
    )
    .unwrap();
    assert!(services.contains("WHERE SubAccountName IN (N'prod', N'o''neil')"));
    assert!(services.contains("* 1.1\n"));
}

#[test]
fn customer_groupings_select_their_columns() {
    let sql = CustomerGrouping::SubAccount.sql("BillingData");
    assert!(sql.starts_with("SELECT SubAccountName AS CustomerSubscription,\n    SubAccountId AS SubscriptionId,"));
    assert!(sql.contains("COUNT(DISTINCT ServiceName) AS UniqueServices"));
    assert!(sql.ends_with("GROUP BY SubAccountName, SubAccountId\nORDER BY TotalCost DESC"));

    let billing = CustomerGrouping::BillingAccount.sql("BillingData");
    assert!(billing.contains("BillingAccountName AS CustomerAccount"));
    assert!(billing.contains("SUM(TRY_CAST(BilledCost AS FLOAT)) AS BilledCost"));
}

#[test]
fn summary_queries_read_effective_cost() {
    let top = top_services_sql("BillingData", 5);
    assert!(top.starts_with("SELECT TOP 5 ServiceName,"));
    assert!(top.contains("ORDER BY TotalCost DESC"));
    assert!(monthly_trend_sql("DailyCosts").contains("FROM [DailyCosts]"));
}

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn summary_is_bounded_by_both_dates() {
    let sql = billing_summary_sql("BillingData", day(2025, 3, 1), day(2025, 3, 31));
    assert!(sql.starts_with("SELECT SubAccountName,\n    ServiceCategory,"));
    assert!(sql.contains("FROM [BillingData]"));
    assert!(sql.contains("WHERE TRY_CAST(ChargePeriodStart AS DATE) BETWEEN '2025-03-01' AND '2025-03-31'"));
    assert!(sql.contains("COUNT(DISTINCT TRY_CAST(ChargePeriodStart AS DATE)) AS DaysActive"));
    assert!(sql.ends_with("GROUP BY SubAccountName, ServiceCategory\nORDER BY TotalCost DESC"));
}

#[test]
fn summary_range_defaults_to_last_thirty_days() {
    let today = day(2025, 4, 15);
    assert_eq!(
        summary_range(None, None, today).unwrap(),
        (day(2025, 3, 16), today)
    );
    assert_eq!(
        summary_range(None, Some(day(2025, 1, 31)), today).unwrap(),
        (day(2025, 1, 1), day(2025, 1, 31))
    );
    assert_eq!(
        summary_range(Some(day(2025, 4, 15)), None, today).unwrap(),
        (today, today)
    );

    let err = summary_range(Some(day(2025, 5, 1)), Some(day(2025, 4, 1)), today).unwrap_err();
    assert!(matches!(err, BillingError::InvalidInput(ref m) if m.contains("2025-05-01")));
}

#[test]
fn daily_costs_look_back_a_number_of_days() {
    let sql = daily_costs_sql("DailyCosts", 7);
    assert!(sql.contains("FROM [DailyCosts]"));
    assert!(sql.contains("WHERE [Date] >= DATEADD(day, -7, CAST(GETDATE() AS DATE))"));
    assert!(sql.contains("COUNT(DISTINCT ServiceName) AS Services"));
    assert!(sql.ends_with("GROUP BY [Date]\nORDER BY [Date] DESC"));
}

#[test]
fn resources_and_locations_rank_by_cost() {
    let resources = top_resources_sql("BillingDataFOCUS", 20);
    assert!(resources.starts_with("SELECT TOP 20 ResourceName,"));
    assert!(resources.contains("FROM [BillingDataFOCUS]"));
    assert!(resources.contains("WHERE ResourceId IS NOT NULL AND ResourceId != ''"));
    assert!(resources.ends_with("ORDER BY TotalCost DESC"));

    let locations = cost_by_location_sql("BillingData");
    assert!(locations.starts_with("SELECT COALESCE(NULLIF(Region, ''), 'Unassigned') AS Location,"));
    assert!(locations.contains("GROUP BY COALESCE(NULLIF(Region, ''), 'Unassigned')"));
    assert!(locations.ends_with("ORDER BY TotalCost DESC"));
}
