use super::Context;
use crate::config::{SQL_SCOPE, STORAGE_SCOPE};
use crate::error::{BillingError, SqlFailure};
use crate::output;
use crate::sql::connection::ConnectionSpec;
use crate::sql::SqlExecutor;

/// Walk token, master, billing database and storage in turn. Each hop is
/// tried once; a failing hop is explained and the walk goes on where that
/// still makes sense.
pub(super) async fn run(ctx: &Context) -> Result<(), BillingError> {
    let config = &ctx.config;
    config.validate()?;
    let mut problems: Vec<SqlFailure> = Vec::new();

    output::heading("Configuration");
    println!("Tenant:    {}", config.tenant_id);
    println!("Client:    {}", config.client_id);
    println!("Endpoint:  {}", config.sql_host());
    println!("Database:  {}", config.database_name);
    println!("ODBC:      {}", ctx.billing_spec().odbc_connection_string(None));

    output::heading("Azure AD token");
    match ctx.tokens.token(SQL_SCOPE).await {
        Ok(_) => output::success("service principal can acquire a SQL token"),
        Err(e) => {
            output::failure(&e.to_string());
            println!("  Check tenant_id, client_id and client_secret; the secret may have expired.");
            return Ok(());
        }
    }

    for spec in [ConnectionSpec::master(config), ctx.billing_spec()] {
        output::heading(&format!("Database {}", spec.database));
        match ctx.connect_once(&spec).await {
            Ok(mut client) => {
                output::success("connected");
                match client.query("SELECT USER_NAME() AS UserName, DB_NAME() AS DatabaseName").await {
                    Ok(result) => output::print_result(&result),
                    Err(e) => output::warning(&e.to_string()),
                }
                client.close().await?;
            }
            Err(e) => {
                let kind = e.failure();
                output::failure(&format!("{}: {e}", kind.label()));
                problems.push(kind);
            }
        }
    }

    if config.validate_storage().is_ok() {
        output::heading(&format!("Storage {}/{}", config.storage_account, config.container));
        let listing = match ctx.tokens.token(STORAGE_SCOPE).await {
            Ok(_) => ctx.dfs()?.list_paths(&config.export_path).await,
            Err(e) => Err(e),
        };
        match listing {
            Ok(entries) => output::success(&format!(
                "{} entries under '{}'",
                entries.len(),
                config.export_path
            )),
            Err(e) => {
                let kind = e.failure();
                output::failure(&format!("{}: {e}", kind.label()));
                problems.push(kind);
            }
        }
    }

    output::heading("Result");
    if problems.is_empty() {
        output::success("no problems found");
    } else {
        let mut shown = Vec::new();
        for kind in problems {
            if !shown.contains(&kind) {
                output::print_remediation(kind);
                shown.push(kind);
            }
        }
    }
    Ok(())
}
