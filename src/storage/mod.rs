//! Export storage: listing, path pattern discovery and format detection.

pub mod dfs;
pub mod format;
pub mod scan;

use crate::config::{Config, StorageAuth};
use crate::error::BillingError;
use crate::sql::security::DATA_SOURCE_NAME;
use crate::sql::views::BulkSource;

pub use dfs::DfsClient;
pub use format::BillingFormat;
pub use scan::{BlobEntry, FileGroup, StorageScan, scan};

/// Bytes fetched from a file to read its header line.
pub const HEADER_READ_BYTES: u64 = 8192;

/// Extension used when none is given.
pub const DEFAULT_EXTENSION: &str = "csv";

/// Point OPENROWSET at `relative_pattern`, either through the external data
/// source or, without credential objects, through the absolute blob URL.
pub fn bulk_source_for(config: &Config, relative_pattern: &str) -> BulkSource {
    let relative = relative_pattern.trim_start_matches('/');
    match config.storage_auth {
        StorageAuth::Passthrough => {
            BulkSource::Url(format!("{}/{}", config.container_url(), relative))
        }
        StorageAuth::ManagedIdentity | StorageAuth::Sas => BulkSource::DataSource {
            name: DATA_SOURCE_NAME.to_string(),
            path: relative.to_string(),
        },
    }
}

/// Every CSV file directly under the configured export path.
pub fn configured_bulk_source(config: &Config) -> BulkSource {
    let export = config.export_path.trim_matches('/');
    let pattern = if export.is_empty() {
        format!("*.{DEFAULT_EXTENSION}")
    } else {
        format!("{export}/*.{DEFAULT_EXTENSION}")
    };
    bulk_source_for(config, &pattern)
}

/// List the export path and derive its wildcard pattern.
pub async fn discover(
    dfs: &DfsClient<'_>,
    prefix: &str,
    extension: &str,
) -> Result<StorageScan, BillingError> {
    let entries = dfs.list_paths(prefix).await?;
    scan(entries, extension).map_err(|e| match e {
        BillingError::NoFiles { extension, .. } => BillingError::NoFiles {
            extension,
            prefix: prefix.to_string(),
        },
        other => other,
    })
}

/// Read the newest file's header and detect the export layout.
pub async fn detect_format(
    dfs: &DfsClient<'_>,
    scan: &StorageScan,
) -> Result<(BlobEntry, BillingFormat), BillingError> {
    let newest = scan.newest_file().ok_or_else(|| BillingError::NoFiles {
        extension: scan.extension.clone(),
        prefix: scan.common_prefix.clone(),
    })?;
    let head = dfs.read_head(&newest.name, HEADER_READ_BYTES).await?;
    Ok((newest.clone(), BillingFormat::detect(&head)))
}
