use super::views::{finish, plan_views, verify_views};
use super::{Context, STEP_PAUSE};
use crate::cli::ProvisionArgs;
use crate::config::Config;
use crate::error::{BillingError, SqlFailure};
use crate::output;
use crate::sql::connection::ConnectionSpec;
use crate::sql::retry::wait_for_synapse;
use crate::sql::runner::{SqlStep, execute_batch};
use crate::sql::security::{create_database_sql, manual_user_script, provisioning_steps};
use crate::sql::SqlExecutor;
use std::path::Path;
use tracing::{error, info};

/// Written next to the working directory when provisioning cannot finish.
const MANUAL_SCRIPT_FILE: &str = "synapse_billing_setup.sql";

pub(super) async fn run(ctx: &Context, args: &ProvisionArgs) -> Result<(), BillingError> {
    let config = &ctx.config;
    config.validate_provisioning()?;
    let views = plan_views(ctx, &args.views).await?;
    let steps = provisioning_steps(config, &views);

    if args.views.dry_run {
        let create_db = SqlStep::new("create database", create_database_sql(&config.database_name));
        output::print_sql_steps(std::slice::from_ref(&create_db));
        output::print_sql_steps(&steps);
        return Ok(());
    }

    output::heading(&format!("Connecting to {}", config.sql_host()));
    let master = if args.no_wait {
        ctx.connect_once(&ConnectionSpec::master(config)).await
    } else {
        wait_for_synapse(config, &ctx.tokens).await
    };
    let mut master = match master {
        Ok(client) => client,
        Err(e) => return Err(give_up(config, e).await),
    };

    output::heading(&format!("Creating database {}", config.database_name));
    match master.execute(&create_database_sql(&config.database_name)).await {
        Ok(()) => output::success(&format!("database {} ready", config.database_name)),
        Err(e) if e.failure().is_benign() => {
            output::warning(&format!("database {} already exists", config.database_name))
        }
        Err(e) => return Err(give_up(config, e).await),
    }
    master.close().await?;

    let mut client = match ctx.connect_billing().await {
        Ok(client) => client,
        Err(e) => return Err(give_up(config, e).await),
    };

    output::heading("Creating storage access objects, views and users");
    let report = execute_batch(&mut client, &steps, STEP_PAUSE).await;
    output::print_batch(&report);
    verify_views(&mut client, &views).await;
    client.close().await?;

    output::heading("Summary");
    println!("Database:   {}", config.database_name);
    println!("Endpoint:   {}", config.sql_host());
    println!(
        "Views:      {}",
        views.iter().map(|v| v.name.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "Connection: {}",
        ctx.billing_spec().odbc_connection_string(None)
    );
    finish(&report)
}

/// Print what went wrong and what to do about it, and leave the manual
/// setup script on disk for an admin.
async fn give_up(config: &Config, err: BillingError) -> BillingError {
    let kind = err.failure();
    error!(failure = kind.label(), error = %err, "provisioning stopped");
    output::failure(&err.to_string());
    output::print_remediation(kind);

    if matches!(kind, SqlFailure::LoginFailed | SqlFailure::Timeout | SqlFailure::Other) {
        let path = Path::new(MANUAL_SCRIPT_FILE);
        match tokio::fs::write(path, manual_user_script(config)).await {
            Ok(()) => {
                info!(path = %path.display(), "manual setup script written");
                output::warning(&format!(
                    "Run {} in Synapse Studio as an admin, then rerun provisioning.",
                    path.display()
                ));
            }
            Err(e) => error!(path = %path.display(), error = %e, "could not write setup script"),
        }
    }
    err
}
