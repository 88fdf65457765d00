use oauth2::basic::BasicErrorResponseType;
use oauth2::reqwest::Error as ReqwestClientError;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum BillingError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth2 server error: {error}")]
    Oauth2Server { error: String },

    #[error("SQL error: {0}")]
    Tds(#[from] tiberius::error::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("storage request failed with status {status}: {message}")]
    StorageStatus { status: StatusCode, message: String },

    #[error("no {extension} files found under '{prefix}'")]
    NoFiles { extension: String, prefix: String },

    #[error("{failed} of {total} SQL steps failed")]
    BatchFailed { failed: usize, total: usize },
}

impl From<figment::Error> for BillingError {
    fn from(e: figment::Error) -> Self {
        BillingError::Figment(Box::new(e))
    }
}

impl
    From<
        RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for BillingError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<ReqwestClientError>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(err) => {
                let error = match err.error_description() {
                    Some(desc) => format!("{}: {}", err.error(), desc),
                    None => err.error().to_string(),
                };
                BillingError::Oauth2Server { error }
            }
            RequestTokenError::Request(req_e) => {
                BillingError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                BillingError::Json(parse_err.into_inner())
            }
            RequestTokenError::Other(s) => BillingError::Oauth2Token(s),
        }
    }
}

impl BillingError {
    /// Classify this error by the text the remote service put in it.
    pub fn failure(&self) -> SqlFailure {
        match self {
            BillingError::Timeout(_) => SqlFailure::Timeout,
            BillingError::Io(e) if e.kind() == std::io::ErrorKind::TimedOut => SqlFailure::Timeout,
            BillingError::Reqwest(e) if e.is_timeout() => SqlFailure::Timeout,
            BillingError::StorageStatus { status, .. }
                if *status == StatusCode::FORBIDDEN || *status == StatusCode::UNAUTHORIZED =>
            {
                SqlFailure::PermissionDenied
            }
            BillingError::NoFiles { .. } => SqlFailure::NoFilesFound,
            other => SqlFailure::classify(&other.to_string()),
        }
    }
}

/// Coarse failure kinds recognised in SQL endpoint and storage error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlFailure {
    LoginFailed,
    Timeout,
    PermissionDenied,
    DatabaseMissing,
    /// A credential, data source, principal or other object is not there.
    ObjectMissing,
    AlreadyExists,
    CannotDrop,
    NoFilesFound,
    Other,
}

impl SqlFailure {
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();

        if message.contains("Login failed") {
            SqlFailure::LoginFailed
        } else if lower.contains("already exists") || lower.contains("there is already an object")
        {
            SqlFailure::AlreadyExists
        } else if message.contains("Cannot drop") {
            SqlFailure::CannotDrop
        } else if lower.contains("no files were found")
            || lower.contains("cannot be opened because it does not exist")
        {
            SqlFailure::NoFilesFound
        } else if lower.contains("timeout") || lower.contains("timed out") {
            SqlFailure::Timeout
        } else if lower.contains("cannot open database") || names_missing_database(&lower) {
            SqlFailure::DatabaseMissing
        } else if lower.contains("does not exist") || lower.contains("cannot find the") {
            SqlFailure::ObjectMissing
        } else if lower.contains("access denied")
            || lower.contains("permission")
            || lower.contains("not authorized")
            || lower.contains("authorizationpermissionmismatch")
        {
            SqlFailure::PermissionDenied
        } else {
            SqlFailure::Other
        }
    }

    /// Failures that mean the object is already in the desired state.
    pub fn is_benign(self) -> bool {
        matches!(self, SqlFailure::AlreadyExists | SqlFailure::CannotDrop)
    }

    pub fn label(self) -> &'static str {
        match self {
            SqlFailure::LoginFailed => "login failed",
            SqlFailure::Timeout => "timeout",
            SqlFailure::PermissionDenied => "permission denied",
            SqlFailure::DatabaseMissing => "database missing",
            SqlFailure::ObjectMissing => "object missing",
            SqlFailure::AlreadyExists => "already exists",
            SqlFailure::CannotDrop => "cannot drop",
            SqlFailure::NoFilesFound => "no files found",
            SqlFailure::Other => "error",
        }
    }

    /// Manual steps an operator can take for this failure.
    pub fn remediation(self) -> &'static [&'static str] {
        match self {
            SqlFailure::LoginFailed => &[
                "The service principal has no database user yet.",
                "Run the output of `synapse-billing user-sql` in Synapse Studio as an admin,",
                "connected to the billing database (not master).",
            ],
            SqlFailure::Timeout => &[
                "Firewall rules may not have propagated yet; wait a few minutes and retry.",
                "Check that the workspace allows connections from this client IP.",
            ],
            SqlFailure::PermissionDenied => &[
                "Grant the 'Storage Blob Data Reader' role on the storage account to the",
                "service principal and to the workspace managed identity, then wait 5-10 minutes.",
            ],
            SqlFailure::DatabaseMissing => &[
                "The billing database does not exist; run `synapse-billing provision` first.",
            ],
            SqlFailure::ObjectMissing => &[
                "A credential, data source or principal the statement refers to is missing.",
                "Check that the master key, credential and data source steps succeeded,",
                "and that client_id names an existing service principal.",
            ],
            SqlFailure::AlreadyExists | SqlFailure::CannotDrop => {
                &["The object already exists; nothing to do."]
            }
            SqlFailure::NoFilesFound => &[
                "The billing export may not have run yet (it can take 5-30 minutes).",
                "Check the export path with `synapse-billing scan-storage`.",
                "The export might be parquet instead of CSV.",
            ],
            SqlFailure::Other => &[
                "Check that the workspace finished provisioning and that the credentials are correct.",
            ],
        }
    }
}

/// `Database 'X' does not exist`, as opposed to any other missing object.
fn names_missing_database(lower: &str) -> bool {
    lower.contains("does not exist")
        && (lower.contains("database '") || lower.contains("database \""))
}

/// Whether retrying the failed operation can reasonably succeed later.
pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for BillingError {
    fn is_retryable(&self) -> bool {
        match self {
            BillingError::Timeout(_) | BillingError::Io(_) => true,
            BillingError::Reqwest(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error())
            }
            BillingError::Oauth2Token(_) => true,
            BillingError::StorageStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            BillingError::Tds(_) => matches!(
                self.failure(),
                SqlFailure::LoginFailed | SqlFailure::Timeout | SqlFailure::Other
            ),
            BillingError::Config(_)
            | BillingError::InvalidInput(_)
            | BillingError::Figment(_)
            | BillingError::UrlParse(_)
            | BillingError::Json(_)
            | BillingError::Oauth2Server { .. }
            | BillingError::NoFiles { .. }
            | BillingError::BatchFailed { .. } => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_known_messages() {
        assert_eq!(
            SqlFailure::classify("Login failed for user '<token-identified principal>'."),
            SqlFailure::LoginFailed
        );
        assert_eq!(
            SqlFailure::classify("There is already an object named 'BillingData' in the database."),
            SqlFailure::AlreadyExists
        );
        assert_eq!(
            SqlFailure::classify("Cannot drop the view 'X', because it does not exist"),
            SqlFailure::CannotDrop
        );
        assert_eq!(
            SqlFailure::classify("Content of directory on path 'x/*.csv' cannot be listed. No files were found."),
            SqlFailure::NoFilesFound
        );
        assert_eq!(
            SqlFailure::classify("Connection Timeout Expired"),
            SqlFailure::Timeout
        );
        assert_eq!(
            SqlFailure::classify("Cannot open database \"BillingAnalytics\" requested by the login."),
            SqlFailure::DatabaseMissing
        );
        assert_eq!(
            SqlFailure::classify("Access denied to the storage path"),
            SqlFailure::PermissionDenied
        );
        assert_eq!(SqlFailure::classify("syntax error"), SqlFailure::Other);
    }

    #[test]
    fn missing_objects_are_not_missing_databases() {
        assert_eq!(
            SqlFailure::classify(
                "Database 'BillingAnalytics' does not exist. Make sure that the name is entered correctly."
            ),
            SqlFailure::DatabaseMissing
        );
        assert_eq!(
            SqlFailure::classify(
                "Cannot find the CREDENTIAL 'BillingStorageCredential', because it does not exist or you do not have permission."
            ),
            SqlFailure::ObjectMissing
        );
        assert_eq!(
            SqlFailure::classify(
                "Cannot add the principal '1111', because it does not exist or you do not have permission."
            ),
            SqlFailure::ObjectMissing
        );
        assert_eq!(
            SqlFailure::classify("External data source 'BillingDataSource' does not exist."),
            SqlFailure::ObjectMissing
        );
        assert!(
            SqlFailure::ObjectMissing.remediation()[0].contains("credential, data source or principal")
        );
    }

    #[test]
    fn login_match_is_case_sensitive() {
        assert_eq!(SqlFailure::classify("login failed somewhere"), SqlFailure::Other);
    }

    #[test]
    fn config_errors_are_not_retryable() {
        assert!(!BillingError::Config("missing tenant_id".into()).is_retryable());
        assert!(BillingError::Timeout(Duration::from_secs(1)).is_retryable());
    }
}
