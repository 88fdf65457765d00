use super::scan::BlobEntry;
use crate::azure_auth::TokenProvider;
use crate::config::{Config, STORAGE_SCOPE};
use crate::error::BillingError;

use chrono::{DateTime, Utc};
use reqwest::header::RANGE;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

const STORAGE_API_VERSION: &str = "2023-11-03";
const CONTINUATION_HEADER: &str = "x-ms-continuation";
const PAGE_SIZE: &str = "5000";

#[derive(Debug, Deserialize)]
struct PathList {
    #[serde(default)]
    paths: Vec<PathItem>,
}

/// The service sends booleans and sizes as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PathItem {
    name: String,
    #[serde(default)]
    is_directory: Option<StringOrValue>,
    #[serde(default)]
    content_length: Option<StringOrValue>,
    #[serde(default)]
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StringOrValue {
    Text(String),
    Number(u64),
    Bool(bool),
}

impl StringOrValue {
    fn as_bool(&self) -> bool {
        match self {
            StringOrValue::Text(s) => s.eq_ignore_ascii_case("true"),
            StringOrValue::Bool(b) => *b,
            StringOrValue::Number(n) => *n != 0,
        }
    }

    fn as_u64(&self) -> u64 {
        match self {
            StringOrValue::Text(s) => s.parse().unwrap_or(0),
            StringOrValue::Number(n) => *n,
            StringOrValue::Bool(_) => 0,
        }
    }
}

impl From<PathItem> for BlobEntry {
    fn from(item: PathItem) -> Self {
        BlobEntry {
            is_directory: item.is_directory.as_ref().is_some_and(StringOrValue::as_bool),
            size: item.content_length.as_ref().map_or(0, StringOrValue::as_u64),
            last_modified: item
                .last_modified
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc2822(s).ok())
                .map(|d| d.with_timezone(&Utc)),
            name: item.name,
        }
    }
}

/// Data Lake (hierarchical namespace) client for one container.
pub struct DfsClient<'a> {
    http: reqwest::Client,
    tokens: &'a TokenProvider,
    endpoint: Url,
    container: String,
}

impl<'a> DfsClient<'a> {
    pub fn new(
        http: reqwest::Client,
        tokens: &'a TokenProvider,
        endpoint: Url,
        container: &str,
    ) -> Self {
        Self {
            http,
            tokens,
            endpoint,
            container: container.to_string(),
        }
    }

    pub fn from_config(
        config: &Config,
        http: reqwest::Client,
        tokens: &'a TokenProvider,
    ) -> Result<Self, BillingError> {
        config.validate_storage()?;
        Ok(Self::new(http, tokens, config.dfs_endpoint()?, &config.container))
    }

    fn url_for(&self, path: &str) -> Result<Url, BillingError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                BillingError::Config(format!("invalid storage endpoint {}", self.endpoint))
            })?
            .pop_if_empty()
            .push(&self.container)
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }

    /// Recursively list everything under `prefix`, following continuation
    /// tokens until the service stops returning one.
    pub async fn list_paths(&self, prefix: &str) -> Result<Vec<BlobEntry>, BillingError> {
        let token = self.tokens.token(STORAGE_SCOPE).await?;
        let url = self.url_for("")?;
        let directory = prefix.trim_matches('/');

        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut query = vec![
                ("resource", "filesystem"),
                ("recursive", "true"),
                ("maxResults", PAGE_SIZE),
            ];
            if !directory.is_empty() {
                query.push(("directory", directory));
            }
            if let Some(marker) = continuation.as_deref() {
                query.push(("continuation", marker));
            }

            let resp = self
                .http
                .get(url.clone())
                .query(&query)
                .bearer_auth(&token)
                .header("x-ms-version", STORAGE_API_VERSION)
                .send()
                .await?;
            let resp = check_status(resp).await?;

            continuation = resp
                .headers()
                .get(CONTINUATION_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string);

            let page: PathList = resp.json().await?;
            debug!(count = page.paths.len(), "listed storage page");
            entries.extend(page.paths.into_iter().map(BlobEntry::from));

            if continuation.is_none() {
                break;
            }
        }

        info!(
            container = %self.container,
            prefix = directory,
            count = entries.len(),
            "storage listing complete"
        );
        Ok(entries)
    }

    /// First `bytes` bytes of a file, enough to read a CSV header.
    pub async fn read_head(&self, path: &str, bytes: u64) -> Result<String, BillingError> {
        let token = self.tokens.token(STORAGE_SCOPE).await?;
        let resp = self
            .http
            .get(self.url_for(path)?)
            .bearer_auth(&token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header(RANGE, format!("bytes=0-{}", bytes.saturating_sub(1)))
            .send()
            .await?;
        let resp = check_status(resp).await?;
        let body = resp.bytes().await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }
}

#[derive(Debug, Deserialize)]
struct StorageErrorBody {
    error: StorageErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StorageErrorDetail {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Turn a non-success response into `StorageStatus`, keeping the service's
/// error code when the body carries one.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, BillingError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<StorageErrorBody>(&body) {
        Ok(parsed) => format!("{}: {}", parsed.error.code, parsed.error.message),
        Err(_) if body.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => body.trim().to_string(),
    };
    Err(BillingError::StorageStatus { status, message })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_items_parse_string_fields() {
        let json = r#"{"paths":[
            {"name":"exports/a","isDirectory":"true","lastModified":"Tue, 05 Aug 2025 10:00:00 GMT"},
            {"name":"exports/a/part_0.csv","contentLength":"2048","lastModified":"Tue, 05 Aug 2025 10:01:00 GMT"}
        ]}"#;
        let list: PathList = serde_json::from_str(json).unwrap();
        let entries: Vec<BlobEntry> = list.paths.into_iter().map(BlobEntry::from).collect();

        assert!(entries[0].is_directory);
        assert!(!entries[1].is_directory);
        assert_eq!(entries[1].size, 2048);
        assert_eq!(
            entries[1].last_modified.map(|d| d.to_rfc3339()),
            Some("2025-08-05T10:01:00+00:00".to_string())
        );
    }

    #[test]
    fn empty_listing_has_no_paths() {
        let list: PathList = serde_json::from_str("{}").unwrap();
        assert!(list.paths.is_empty());
    }
}
