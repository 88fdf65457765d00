//! Column-to-type mappings for the billing export layouts.

/// One entry of an OPENROWSET `WITH (...)` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub sql_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
        }
    }

    /// Guess a type from the column name: money and amounts become decimals.
    pub fn inferred(name: impl Into<String>) -> Self {
        let name = name.into();
        let lower = name.to_lowercase();
        let sql_type = if ["cost", "price", "quantity"]
            .iter()
            .any(|needle| lower.contains(needle))
        {
            "DECIMAL(18,8)"
        } else {
            "NVARCHAR(500)"
        };
        Self::new(name, sql_type)
    }
}

fn defs(pairs: &[(&str, &str)]) -> Vec<ColumnDef> {
    pairs
        .iter()
        .map(|(name, ty)| ColumnDef::new(*name, *ty))
        .collect()
}

const DEC: &str = "DECIMAL(28,10)";

/// FOCUS cost and usage export, typed.
pub fn focus_columns() -> Vec<ColumnDef> {
    defs(&[
        ("BillingAccountId", "NVARCHAR(200)"),
        ("BillingAccountName", "NVARCHAR(500)"),
        ("BillingPeriodStartDate", "DATE"),
        ("BillingPeriodEndDate", "DATE"),
        ("ServiceCategory", "NVARCHAR(200)"),
        ("ServiceName", "NVARCHAR(200)"),
        ("ServiceSubcategory", "NVARCHAR(200)"),
        ("ResourceId", "NVARCHAR(1000)"),
        ("ResourceName", "NVARCHAR(500)"),
        ("ResourceType", "NVARCHAR(200)"),
        ("Region", "NVARCHAR(100)"),
        ("Zone", "NVARCHAR(100)"),
        ("UsageQuantity", DEC),
        ("UsageUnit", "NVARCHAR(100)"),
        ("PricingCategory", "NVARCHAR(200)"),
        ("PricingQuantity", DEC),
        ("PricingUnit", "NVARCHAR(100)"),
        ("BilledCost", DEC),
        ("EffectiveCost", DEC),
        ("AmortizedCost", DEC),
        ("ContractedCost", DEC),
        ("ListCost", DEC),
        ("BillingCurrency", "NVARCHAR(10)"),
        ("Tags", "NVARCHAR(MAX)"),
        ("InvoiceId", "NVARCHAR(200)"),
        ("ChargeCategory", "NVARCHAR(100)"),
        ("ChargeFrequency", "NVARCHAR(100)"),
        ("ChargeDescription", "NVARCHAR(500)"),
        ("ChargePeriodStart", "DATE"),
        ("ChargePeriodEnd", "DATE"),
        ("CommitmentDiscountCategory", "NVARCHAR(200)"),
        ("CommitmentDiscountName", "NVARCHAR(500)"),
        ("CommitmentDiscountType", "NVARCHAR(100)"),
        ("Provider", "NVARCHAR(200)"),
        ("PublisherName", "NVARCHAR(500)"),
        ("PublisherType", "NVARCHAR(100)"),
        ("SkuId", "NVARCHAR(200)"),
        ("SkuName", "NVARCHAR(500)"),
        ("SubAccountId", "NVARCHAR(200)"),
        ("SubAccountName", "NVARCHAR(500)"),
        ("x_AccountOwnerId", "NVARCHAR(200)"),
        ("x_AccountOwnerName", "NVARCHAR(500)"),
        ("x_BilledCostInUsd", DEC),
        ("x_EffectiveCostInUsd", DEC),
        ("x_OnDemandCostInUsd", DEC),
        ("x_SkuDetails", "NVARCHAR(MAX)"),
        ("x_SkuIsCreditEligible", "NVARCHAR(10)"),
        ("x_SkuMeterCategory", "NVARCHAR(200)"),
        ("x_SkuMeterSubcategory", "NVARCHAR(200)"),
        ("x_SkuMeterId", "NVARCHAR(200)"),
        ("x_SkuMeterName", "NVARCHAR(500)"),
        ("x_SkuOfferId", "NVARCHAR(200)"),
        ("x_SkuOrderId", "NVARCHAR(200)"),
        ("x_SkuPartNumber", "NVARCHAR(200)"),
        ("x_SkuProductId", "NVARCHAR(200)"),
        ("x_SkuProductName", "NVARCHAR(500)"),
        ("x_SkuServiceFamily", "NVARCHAR(200)"),
        ("x_SkuServiceName", "NVARCHAR(200)"),
        ("x_SkuTerm", "NVARCHAR(100)"),
        ("x_SkuTier", "NVARCHAR(100)"),
    ])
}

/// Columns the daily aggregate needs from a FOCUS export.
pub fn daily_cost_columns() -> Vec<ColumnDef> {
    defs(&[
        ("ChargePeriodStart", "DATE"),
        ("ServiceCategory", "NVARCHAR(200)"),
        ("ServiceName", "NVARCHAR(200)"),
        ("EffectiveCost", DEC),
        ("BillingCurrency", "NVARCHAR(10)"),
    ])
}

/// Legacy "actual cost" daily export. Everything is text; the files carry
/// locale-formatted numbers that do not always cast cleanly.
pub fn legacy_columns() -> Vec<ColumnDef> {
    defs(&[
        ("date", "NVARCHAR(100)"),
        ("serviceFamily", "NVARCHAR(200)"),
        ("meterCategory", "NVARCHAR(200)"),
        ("meterSubCategory", "NVARCHAR(200)"),
        ("meterName", "NVARCHAR(500)"),
        ("billingAccountName", "NVARCHAR(200)"),
        ("costCenter", "NVARCHAR(100)"),
        ("resourceGroupName", "NVARCHAR(200)"),
        ("resourceLocation", "NVARCHAR(100)"),
        ("consumedService", "NVARCHAR(200)"),
        ("ResourceId", "NVARCHAR(1000)"),
        ("chargeType", "NVARCHAR(100)"),
        ("publisherType", "NVARCHAR(100)"),
        ("quantity", "NVARCHAR(100)"),
        ("costInBillingCurrency", "NVARCHAR(100)"),
        ("costInUsd", "NVARCHAR(100)"),
        ("PayGPrice", "NVARCHAR(100)"),
        ("billingCurrency", "NVARCHAR(10)"),
        ("subscriptionName", "NVARCHAR(200)"),
        ("SubscriptionId", "NVARCHAR(100)"),
        ("ProductName", "NVARCHAR(500)"),
        ("frequency", "NVARCHAR(100)"),
        ("unitOfMeasure", "NVARCHAR(100)"),
        ("tags", "NVARCHAR(4000)"),
    ])
}

const CSP_COLUMN_NAMES: &[&str] = &[
    "Date",
    "CustomerTenantId",
    "CustomerName",
    "CustomerDomain",
    "SubscriptionId",
    "SubscriptionName",
    "SubscriptionDescription",
    "ServiceFamily",
    "MeterCategory",
    "MeterSubCategory",
    "MeterName",
    "ResourceGroup",
    "ResourceLocation",
    "ConsumedService",
    "ResourceId",
    "ChargeType",
    "PublisherType",
    "Quantity",
    "UnitPrice",
    "EffectiveUnitPrice",
    "ExtendedCost",
    "CostInBillingCurrency",
    "BillingCurrency",
    "PCToBCExchangeRate",
    "ResellerMpnId",
    "ProductName",
    "UnitOfMeasure",
    "BillingPeriod",
    "Tags",
];

/// Cloud Solution Provider partner export; types inferred from names.
pub fn csp_columns() -> Vec<ColumnDef> {
    CSP_COLUMN_NAMES
        .iter()
        .map(|name| ColumnDef::inferred(*name))
        .collect()
}
