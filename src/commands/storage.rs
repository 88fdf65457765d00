use super::Context;
use crate::cli::ScanArgs;
use crate::error::BillingError;
use crate::output;
use crate::sql::views::views_for_format;
use crate::storage::{self, StorageScan, bulk_source_for};

async fn scan_from_args(ctx: &Context, args: &ScanArgs) -> Result<StorageScan, BillingError> {
    let dfs = ctx.dfs()?;
    let prefix = args.prefix.as_deref().unwrap_or(&ctx.config.export_path);
    storage::discover(&dfs, prefix, &args.extension).await
}

pub(super) async fn scan_storage(ctx: &Context, args: &ScanArgs) -> Result<(), BillingError> {
    let scan = scan_from_args(ctx, args).await?;

    output::heading(&format!(
        "{} .{} files in {}/{}",
        scan.file_count(),
        scan.extension,
        ctx.config.storage_account,
        ctx.config.container
    ));
    let rows = scan
        .groups
        .iter()
        .map(|group| {
            let size: u64 = group.files.iter().map(|f| f.size).sum();
            let newest = group
                .files
                .iter()
                .filter_map(|f| f.last_modified)
                .max()
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            vec![
                if group.directory.is_empty() { "/".to_string() } else { group.directory.clone() },
                group.files.len().to_string(),
                output::format_bytes(size),
                newest,
            ]
        })
        .collect();
    output::print_rows(&["Directory", "Files", "Size", "Last modified"], rows);

    output::heading("OPENROWSET path");
    println!("Common prefix: {}", scan.common_prefix);
    println!("Pattern:       {}", scan.relative_pattern());
    println!("BULK URL:      {}", scan.bulk_url(&ctx.config.container_url()));
    if let Some(group) = scan.newest_group() {
        println!("Newest export: {}", group.directory);
    }
    Ok(())
}

pub(super) async fn detect_format(ctx: &Context, args: &ScanArgs) -> Result<(), BillingError> {
    let scan = scan_from_args(ctx, args).await?;
    let dfs = ctx.dfs()?;
    let (file, format) = storage::detect_format(&dfs, &scan).await?;

    output::heading("Export format");
    println!("File:   {}", file.name);
    println!("Format: {format}");
    let bulk = bulk_source_for(&ctx.config, scan.relative_pattern());
    let names: Vec<String> = views_for_format(format, bulk)
        .into_iter()
        .map(|v| v.name)
        .collect();
    println!("Views:  {}", names.join(", "));
    Ok(())
}
