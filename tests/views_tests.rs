use pretty_assertions::assert_eq;
use synapse_billing::sql::columns::ColumnDef;
use synapse_billing::sql::views::{
    BulkSource, CsvHeader, DAILY_VIEW, FOCUS_VIEW, RAW_VIEW, ViewDefinition, billing_views,
    csp_view, daily_costs_view, legacy_view, first_row_sql, raw_view, recreate_all, views_for_format,
};
use synapse_billing::storage::BillingFormat;

fn url(pattern: &str) -> BulkSource {
    BulkSource::Url(format!(
        "https://billingstore.blob.core.windows.net/exports/{pattern}"
    ))
}

#[test]
fn raw_view_reads_header_row() {
    let view = raw_view(url("daily/focus/*.csv"));
    assert_eq!(
        view.create_sql(),
        "CREATE VIEW [BillingData] AS
SELECT *
FROM OPENROWSET(
    BULK 'https://billingstore.blob.core.windows.net/exports/daily/focus/*.csv',
    FORMAT = 'CSV',
    PARSER_VERSION = '2.0',
    HEADER_ROW = TRUE
) AS [BillingExport]"
    );
    assert_eq!(
        view.drop_if_exists_sql(),
        "IF EXISTS (SELECT * FROM sys.views WHERE name = N'BillingData') DROP VIEW [BillingData]"
    );
}

#[test]
fn data_source_form_adds_data_source_argument() {
    let bulk = BulkSource::DataSource {
        name: "BillingDataSource".into(),
        path: "daily/*/*.csv".into(),
    };
    let view = ViewDefinition::new("Small", bulk)
        .columns(vec![
            ColumnDef::new("ChargePeriodStart", "DATE"),
            ColumnDef::new("EffectiveCost", "DECIMAL(28,10)"),
        ])
        .header(CsvHeader::FirstRow(2));
    assert_eq!(
        view.select_sql(),
        "SELECT *
FROM OPENROWSET(
    BULK 'daily/*/*.csv',
    DATA_SOURCE = 'BillingDataSource',
    FORMAT = 'CSV',
    PARSER_VERSION = '2.0',
    FIRSTROW = 2
)
WITH (
    [ChargePeriodStart] DATE,
    [EffectiveCost] DECIMAL(28,10)
) AS [SmallRows]"
    );
}

#[test]
fn daily_costs_groups_by_date_and_service() {
    let sql = daily_costs_view(url("x/*.csv")).create_sql();
    assert!(sql.starts_with("CREATE VIEW [DailyCosts] AS\nSELECT CAST(ChargePeriodStart AS DATE) AS [Date],"));
    assert!(sql.contains(") AS [DailyData]\nGROUP BY CAST(ChargePeriodStart AS DATE), ServiceCategory, ServiceName, BillingCurrency"));
    assert!(sql.contains("    [EffectiveCost] DECIMAL(28,10)"));
}

#[test]
fn legacy_and_csp_views_skip_header_line() {
    let legacy = legacy_view(url("legacy/*.csv")).create_sql();
    assert!(legacy.contains("FIRSTROW = 2"));
    assert!(legacy.contains("[costInBillingCurrency] NVARCHAR(100)"));

    let csp = csp_view(url("csp/*.csv")).create_sql();
    assert!(csp.starts_with("CREATE VIEW [BillingDataCSP] AS"));
    assert!(csp.contains("COALESCE(SubscriptionId, CustomerTenantId) AS EntityId"));
    assert!(csp.contains("[ExtendedCost] DECIMAL(18,8)"));
    assert!(csp.contains("[CustomerName] NVARCHAR(500)"));
}

#[test]
fn focus_view_lists_columns_in_order() {
    let views = billing_views(url("f/*.csv"));
    let names: Vec<&str> = views.iter().map(|v| v.name.as_str()).collect();
    assert_eq!(names, vec![RAW_VIEW, FOCUS_VIEW, DAILY_VIEW]);

    let focus = &views[1];
    assert_eq!(focus.columns.len(), 60);
    assert_eq!(focus.columns[0].name, "BillingAccountId");
    assert_eq!(focus.select.len(), 60);
    assert_eq!(focus.select[0], "[BillingAccountId]");
}

#[test]
fn format_picks_view_set() {
    let bulk = url("x/*.csv");
    assert_eq!(views_for_format(BillingFormat::Focus, bulk.clone()).len(), 3);
    let standard = views_for_format(BillingFormat::Standard, bulk.clone());
    assert_eq!(standard[0].name, RAW_VIEW);
    assert_eq!(standard[0].header, CsvHeader::FirstRow(2));
    assert_eq!(
        views_for_format(BillingFormat::Csp, bulk)[0].name,
        "BillingDataCSP"
    );
}

#[test]
fn recreate_drops_everything_before_creating() {
    let steps = recreate_all(&billing_views(url("x/*.csv")));
    let labels: Vec<&str> = steps.iter().map(|s| s.label.as_str()).collect();
    assert_eq!(
        labels,
        vec![
            "drop view BillingData",
            "drop view BillingDataFOCUS",
            "drop view DailyCosts",
            "create view BillingData",
            "create view BillingDataFOCUS",
            "create view DailyCosts",
        ]
    );
}

#[test]
fn first_row_query_escapes_quotes_in_path() {
    let sql = first_row_sql(&BulkSource::Url("https://a/b/o'brien/*.csv".into()));
    assert!(sql.starts_with("SELECT TOP 1 *\nFROM OPENROWSET("));
    assert!(sql.contains("BULK 'https://a/b/o''brien/*.csv'"));
    assert!(sql.ends_with(") AS [FirstRow]"));
}
