use crate::sql::quote::quote_ident;

/// Which export columns identify a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerGrouping {
    /// Subscription-level (`SubAccountName`), the usual customer boundary.
    SubAccount,
    BillingAccount,
    /// Microsoft Customer Agreement account owner extension columns.
    AccountOwner,
}

impl CustomerGrouping {
    /// Tried in order until one yields rows.
    pub const FALLBACK: [CustomerGrouping; 2] =
        [CustomerGrouping::SubAccount, CustomerGrouping::BillingAccount];

    pub fn title(self) -> &'static str {
        match self {
            CustomerGrouping::SubAccount => "Costs by subscription",
            CustomerGrouping::BillingAccount => "Costs by billing account",
            CustomerGrouping::AccountOwner => "Costs by account owner",
        }
    }

    fn columns(self) -> [(&'static str, &'static str); 2] {
        match self {
            CustomerGrouping::SubAccount => [
                ("SubAccountName", "CustomerSubscription"),
                ("SubAccountId", "SubscriptionId"),
            ],
            CustomerGrouping::BillingAccount => [
                ("BillingAccountName", "CustomerAccount"),
                ("BillingAccountId", "AccountId"),
            ],
            CustomerGrouping::AccountOwner => [
                ("x_AccountOwnerName", "AccountOwner"),
                ("x_AccountOwnerId", "OwnerId"),
            ],
        }
    }

    /// Total effective cost per customer, largest first.
    pub fn sql(self, view: &str) -> String {
        let [(name, name_alias), (id, id_alias)] = self.columns();
        let mut measures = vec!["SUM(TRY_CAST(EffectiveCost AS FLOAT)) AS TotalCost"];
        if self != CustomerGrouping::AccountOwner {
            measures.push("SUM(TRY_CAST(BilledCost AS FLOAT)) AS BilledCost");
        }
        measures.push("COUNT(*) AS Transactions");
        if self != CustomerGrouping::AccountOwner {
            measures.push("COUNT(DISTINCT ServiceName) AS UniqueServices");
        }

        format!(
            "SELECT {name} AS {name_alias},\n    {id} AS {id_alias},\n    {}\n\
             FROM {}\n\
             WHERE {name} IS NOT NULL AND {name} != ''\n\
             GROUP BY {name}, {id}\n\
             ORDER BY TotalCost DESC",
            measures.join(",\n    "),
            quote_ident(view)
        )
    }
}
