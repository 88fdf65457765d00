use super::Context;
use crate::error::BillingError;
use crate::output;
use crate::sql::SqlExecutor;
use crate::sql::catalog::inspection_sections;
use tracing::warn;

pub(super) async fn run(ctx: &Context) -> Result<(), BillingError> {
    let mut client = ctx.connect_billing().await?;
    output::heading(&format!("Objects in {}", client.database()));

    for (title, sql) in inspection_sections() {
        output::heading(title);
        match client.query(sql).await {
            Ok(result) => output::print_result(&result),
            Err(e) => {
                warn!(section = title, error = %e, "inspection query failed");
                output::failure(&format!("{}: {e}", e.failure().label()));
            }
        }
    }
    client.close().await
}
