use super::Context;
use crate::cli::QueryArgs;
use crate::config::Config;
use crate::error::BillingError;
use crate::output;
use crate::sql::connection::ConnectionSpec;
use crate::sql::security::manual_user_script;
use crate::sql::SqlExecutor;
use std::path::Path;
use tracing::info;

pub(super) async fn run(ctx: &Context, args: &QueryArgs) -> Result<(), BillingError> {
    let sql = match (&args.sql, &args.file) {
        (Some(sql), _) => sql.clone(),
        (None, Some(path)) => tokio::fs::read_to_string(path).await?,
        (None, None) => {
            return Err(BillingError::InvalidInput(
                "pass the SQL text or --file".to_string(),
            ));
        }
    };

    let spec = match &args.database {
        Some(db) => ConnectionSpec::new(&ctx.config, db.clone()),
        None => ctx.billing_spec(),
    };
    let mut client = ctx.connect_once(&spec).await?;
    let result = client.query(&sql).await?;
    output::print_result(&result);
    client.close().await
}

pub(super) async fn user_sql(config: &Config, output_path: Option<&Path>) -> Result<(), BillingError> {
    if config.client_id.trim().is_empty() {
        return Err(BillingError::Config(
            "missing required setting `client_id`".to_string(),
        ));
    }
    let script = manual_user_script(config);
    match output_path {
        Some(path) => {
            tokio::fs::write(path, script).await?;
            info!(path = %path.display(), "setup script written");
        }
        None => print!("{script}"),
    }
    Ok(())
}

pub(super) fn connection_string(
    config: &Config,
    show_secret: bool,
    database: Option<&str>,
) -> Result<(), BillingError> {
    config.validate()?;
    let spec = match database {
        Some(db) => ConnectionSpec::new(config, db),
        None => ConnectionSpec::billing(config),
    };
    let secret = show_secret.then_some(config.client_secret.as_str());
    println!("{}", spec.odbc_connection_string(secret));
    Ok(())
}
