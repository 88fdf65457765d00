//! Layered operator configuration.
//!
//! Sources, later ones winning:
//! - built-in defaults
//! - a TOML file (`synapse.toml` unless another path is given)
//! - `SYNAPSE_*` environment variables (a `.env` file is loaded into the
//!   environment by `main` before this runs)

use crate::error::BillingError;
use crate::sql::retry::RetrySchedule;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "synapse.toml";
pub const DEFAULT_DATABASE: &str = "BillingAnalytics";
pub const ENV_PREFIX: &str = "SYNAPSE_";
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Token audience for the serverless SQL endpoint.
pub const SQL_SCOPE: &str = "https://database.windows.net/.default";
/// Token audience for the storage data plane.
pub const STORAGE_SCOPE: &str = "https://storage.azure.com/.default";

/// How the serverless pool authenticates to storage when reading exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageAuth {
    /// Database-scoped credential using the workspace managed identity.
    #[default]
    ManagedIdentity,
    /// Database-scoped credential holding a SAS token.
    Sas,
    /// No credential objects; OPENROWSET reads absolute URLs as the caller.
    Passthrough,
}

impl StorageAuth {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageAuth::ManagedIdentity => "managed_identity",
            StorageAuth::Sas => "sas",
            StorageAuth::Passthrough => "passthrough",
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub workspace_name: String,
    pub database_name: String,

    pub storage_account: String,
    pub container: String,
    /// Directory inside the container that holds the exported CSV files.
    pub export_path: String,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,

    pub storage_auth: StorageAuth,
    pub sas_token: Option<String>,
    pub master_key_password: Option<String>,

    pub loglevel: String,
    pub connect_timeout_secs: u64,
    pub retry: RetrySchedule,

    pub authority_host: String,
    /// Overrides `https://{storage_account}.dfs.core.windows.net`.
    pub storage_dfs_endpoint: Option<Url>,
    pub proxy: Option<Url>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            workspace_name: String::new(),
            database_name: DEFAULT_DATABASE.to_string(),
            storage_account: String::new(),
            container: String::new(),
            export_path: String::new(),
            subscription_id: None,
            resource_group: None,
            storage_auth: StorageAuth::default(),
            sas_token: None,
            master_key_password: None,
            loglevel: "info".to_string(),
            connect_timeout_secs: 30,
            retry: RetrySchedule::default(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            storage_dfs_endpoint: None,
            proxy: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("workspace_name", &self.workspace_name)
            .field("database_name", &self.database_name)
            .field("storage_account", &self.storage_account)
            .field("container", &self.container)
            .field("export_path", &self.export_path)
            .field("storage_auth", &self.storage_auth)
            .field("sas_token", &self.sas_token.as_deref().map(redact))
            .field(
                "master_key_password",
                &self.master_key_password.as_deref().map(redact),
            )
            .field("loglevel", &self.loglevel)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("retry", &self.retry)
            .field("authority_host", &self.authority_host)
            .finish_non_exhaustive()
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() { "<unset>" } else { "<redacted>" }
}

impl Config {
    /// Load configuration from defaults, the TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, BillingError> {
        let figment = Self::figment(path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE)));
        Ok(figment.extract()?)
    }

    pub fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Check the service-principal fields needed to acquire any token.
    pub fn validate_identity(&self) -> Result<(), BillingError> {
        let required = [
            ("tenant_id", &self.tenant_id),
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
        ];
        missing_field(&required)
    }

    /// Check the fields every command needs to reach the SQL endpoint.
    pub fn validate(&self) -> Result<(), BillingError> {
        self.validate_identity()?;
        let required = [
            ("workspace_name", &self.workspace_name),
            ("database_name", &self.database_name),
        ];
        missing_field(&required)
    }

    /// Check the fields needed to talk to the export storage account.
    pub fn validate_storage(&self) -> Result<(), BillingError> {
        let required = [
            ("storage_account", &self.storage_account),
            ("container", &self.container),
        ];
        missing_field(&required)?;
        if self.storage_auth == StorageAuth::Sas && is_blank(self.sas_token.as_deref()) {
            return Err(BillingError::Config(
                "storage_auth = \"sas\" requires sas_token".to_string(),
            ));
        }
        Ok(())
    }

    /// Check everything provisioning sends to the server.
    ///
    /// Database-scoped credentials cannot be created without a master key, so
    /// every mode except passthrough needs `master_key_password`.
    pub fn validate_provisioning(&self) -> Result<(), BillingError> {
        self.validate()?;
        self.validate_storage()?;
        if self.storage_auth != StorageAuth::Passthrough
            && is_blank(self.master_key_password.as_deref())
        {
            return Err(BillingError::Config(format!(
                "storage_auth = \"{}\" requires master_key_password (set it in {DEFAULT_CONFIG_FILE} or {ENV_PREFIX}MASTER_KEY_PASSWORD)",
                self.storage_auth.as_str()
            )));
        }
        Ok(())
    }

    pub fn sql_host(&self) -> String {
        format!("{}-ondemand.sql.azuresynapse.net", self.workspace_name)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn token_url(&self) -> Result<Url, BillingError> {
        Ok(Url::parse(&format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        ))?)
    }

    /// Blob endpoint URL of the export container, as OPENROWSET expects it.
    pub fn container_url(&self) -> String {
        format!(
            "https://{}.blob.core.windows.net/{}",
            self.storage_account, self.container
        )
    }

    pub fn dfs_endpoint(&self) -> Result<Url, BillingError> {
        match &self.storage_dfs_endpoint {
            Some(url) => Ok(url.clone()),
            None => Ok(Url::parse(&format!(
                "https://{}.dfs.core.windows.net",
                self.storage_account
            ))?),
        }
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

fn missing_field(required: &[(&str, &String)]) -> Result<(), BillingError> {
    match required.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(BillingError::Config(format!(
            "missing required setting `{name}` (set it in {DEFAULT_CONFIG_FILE} or {ENV_PREFIX}{})",
            name.to_uppercase()
        ))),
        None => Ok(()),
    }
}
