use std::fmt;

/// Column markers only present in Cloud Solution Provider exports.
const CSP_INDICATORS: [&str; 4] = ["customertenantid", "customername", "reseller", "partnerearn"];

/// Layout of a billing export file, told apart by its header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingFormat {
    /// Classic "actual cost" export with subscription columns.
    Standard,
    /// Partner (CSP) export with customer columns.
    Csp,
    /// FOCUS cost and usage export.
    Focus,
}

impl BillingFormat {
    /// Detect the layout from the start of a CSV file.
    ///
    /// Anything without a subscription column is treated as CSP, since
    /// aggregated partner exports omit it.
    pub fn detect(head: &str) -> Self {
        let header = head
            .trim_start_matches('\u{feff}')
            .lines()
            .next()
            .unwrap_or_default()
            .to_lowercase();

        if CSP_INDICATORS.iter().any(|marker| header.contains(marker)) {
            BillingFormat::Csp
        } else if header.contains("chargeperiodstart") && header.contains("effectivecost") {
            BillingFormat::Focus
        } else if header.contains("subscriptionid") {
            BillingFormat::Standard
        } else {
            BillingFormat::Csp
        }
    }
}

impl fmt::Display for BillingFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BillingFormat::Standard => "standard",
            BillingFormat::Csp => "csp",
            BillingFormat::Focus => "focus",
        })
    }
}
