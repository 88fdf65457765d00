use super::{Context, STEP_PAUSE};
use crate::cli::ViewArgs;
use crate::error::BillingError;
use crate::output;
use crate::reports::smoke_test;
use crate::sql::runner::{BatchReport, execute_batch};
use crate::sql::views::{ViewDefinition, recreate_all, views_for_format};
use crate::sql::SynapseClient;
use crate::storage::{
    self, BillingFormat, DEFAULT_EXTENSION, bulk_source_for, configured_bulk_source,
};
use tracing::info;

/// Decide the BULK path and export layout, then build the view set.
pub(super) async fn plan_views(
    ctx: &Context,
    args: &ViewArgs,
) -> Result<Vec<ViewDefinition>, BillingError> {
    let fixed = args.format.fixed();
    let (bulk, detected) = if args.scan {
        let dfs = ctx.dfs()?;
        let scan = storage::discover(&dfs, &ctx.config.export_path, DEFAULT_EXTENSION).await?;
        info!(
            pattern = scan.relative_pattern(),
            files = scan.file_count(),
            groups = scan.groups.len(),
            "derived BULK path from storage"
        );
        let detected = match fixed {
            Some(_) => None,
            None => {
                let (file, format) = storage::detect_format(&dfs, &scan).await?;
                info!(file = %file.name, %format, "detected export layout");
                Some(format)
            }
        };
        (bulk_source_for(&ctx.config, scan.relative_pattern()), detected)
    } else {
        (configured_bulk_source(&ctx.config), None)
    };

    let format = fixed.or(detected).unwrap_or(BillingFormat::Focus);
    Ok(views_for_format(format, bulk))
}

pub(super) async fn create_views(ctx: &Context, args: &ViewArgs) -> Result<(), BillingError> {
    // Every view points into the export container.
    ctx.config.validate()?;
    ctx.config.validate_storage()?;
    let views = plan_views(ctx, args).await?;
    let steps = recreate_all(&views);
    if args.dry_run {
        output::print_sql_steps(&steps);
        return Ok(());
    }

    let mut client = ctx.connect_billing().await?;
    output::heading(&format!("Recreating views in {}", client.database()));
    let report = execute_batch(&mut client, &steps, STEP_PAUSE).await;
    output::print_batch(&report);

    if report.is_clean() {
        verify_views(&mut client, &views).await;
    }
    client.close().await?;
    finish(&report)
}

/// Count rows through each view; failures are reported, not returned.
pub(super) async fn verify_views(client: &mut SynapseClient, views: &[ViewDefinition]) {
    output::heading("Verifying views");
    for view in views {
        match smoke_test(client, &view.name, 0).await {
            Ok(result) => output::success(&format!("{}: {} rows", view.name, result.rows)),
            Err(e) => {
                let kind = e.failure();
                output::failure(&format!("{}: {e}", view.name));
                output::print_remediation(kind);
            }
        }
    }
}

/// Print remediation for each distinct failure and turn failures into an error.
pub(super) fn finish(report: &BatchReport) -> Result<(), BillingError> {
    if report.is_clean() {
        return Ok(());
    }
    for kind in report.failures() {
        output::print_remediation(kind);
    }
    Err(BillingError::BatchFailed {
        failed: report.failed(),
        total: report.outcomes.len(),
    })
}
