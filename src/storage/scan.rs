//! Group export files by directory and derive an OPENROWSET path pattern.

use crate::error::BillingError;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// One file or directory reported by the storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Path from the container root, `/`-separated.
    pub name: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
    pub is_directory: bool,
}

impl BlobEntry {
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: 0,
            last_modified: None,
            is_directory: false,
        }
    }

    /// Everything before the last `/`; empty for files at the container root.
    pub fn directory(&self) -> &str {
        self.name.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
    }

    pub fn file_name(&self) -> &str {
        self.name.rsplit_once('/').map(|(_, f)| f).unwrap_or(&self.name)
    }

    pub fn has_extension(&self, extension: &str) -> bool {
        self.file_name()
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case(extension))
    }
}

/// Files sharing one parent directory, e.g. the parts of one export run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileGroup {
    pub directory: String,
    pub files: Vec<BlobEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageScan {
    pub extension: String,
    /// Sorted by directory name; export runs are named by date range, so the
    /// last group is the newest.
    pub groups: Vec<FileGroup>,
    /// Longest directory prefix shared by every group.
    pub common_prefix: String,
    relative_pattern: String,
}

impl StorageScan {
    pub fn file_count(&self) -> usize {
        self.groups.iter().map(|g| g.files.len()).sum()
    }

    /// Pattern relative to the container root, e.g. `daily/focus/*/*/*.csv`.
    pub fn relative_pattern(&self) -> &str {
        &self.relative_pattern
    }

    /// Absolute pattern under a container URL.
    pub fn bulk_url(&self, container_url: &str) -> String {
        format!(
            "{}/{}",
            container_url.trim_end_matches('/'),
            self.relative_pattern
        )
    }

    pub fn newest_group(&self) -> Option<&FileGroup> {
        self.groups.last()
    }

    /// Most recently modified file, falling back to the last file of the
    /// newest group when the listing carried no timestamps.
    pub fn newest_file(&self) -> Option<&BlobEntry> {
        self.groups
            .iter()
            .flat_map(|g| g.files.iter())
            .filter(|f| f.last_modified.is_some())
            .max_by_key(|f| f.last_modified)
            .or_else(|| self.newest_group().and_then(|g| g.files.last()))
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn common_prefix<'a>(dirs: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let mut iter = dirs.into_iter();
    let Some(first) = iter.next() else {
        return Vec::new();
    };
    let mut prefix = segments(first);
    for dir in iter {
        let segs = segments(dir);
        let shared = prefix
            .iter()
            .zip(segs.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefix.truncate(shared);
    }
    prefix
}

/// Filter `entries` to files with `extension` and derive the wildcard path.
///
/// When every group sits the same number of levels below the common prefix
/// the pattern uses one `*` per level, so only matching files are read. Mixed
/// depths fall back to the recursive `**` form.
pub fn scan(
    entries: impl IntoIterator<Item = BlobEntry>,
    extension: &str,
) -> Result<StorageScan, BillingError> {
    let extension = extension.trim_start_matches('.').to_lowercase();
    let mut grouped: BTreeMap<String, Vec<BlobEntry>> = BTreeMap::new();
    for entry in entries
        .into_iter()
        .filter(|e| !e.is_directory && e.has_extension(&extension))
    {
        grouped
            .entry(entry.directory().to_string())
            .or_default()
            .push(entry);
    }

    if grouped.is_empty() {
        return Err(BillingError::NoFiles {
            extension,
            prefix: String::new(),
        });
    }

    let prefix = common_prefix(grouped.keys().map(String::as_str));
    let depths: Vec<usize> = grouped
        .keys()
        .map(|dir| segments(dir).len() - prefix.len())
        .collect();
    let uniform = depths.windows(2).all(|w| w[0] == w[1]);

    let mut parts: Vec<String> = prefix.iter().map(|s| s.to_string()).collect();
    if uniform {
        parts.extend(std::iter::repeat_n("*".to_string(), depths[0]));
        parts.push(format!("*.{extension}"));
    } else {
        parts.push("**".to_string());
    }
    let common_prefix = prefix.join("/");
    let relative_pattern = parts.join("/");

    let groups = grouped
        .into_iter()
        .map(|(directory, mut files)| {
            files.sort_by(|a, b| a.name.cmp(&b.name));
            FileGroup { directory, files }
        })
        .collect();

    Ok(StorageScan {
        extension,
        groups,
        common_prefix,
        relative_pattern,
    })
}
