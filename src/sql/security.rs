//! Database, credential, data source and principal DDL.

use crate::config::{Config, StorageAuth};
use crate::sql::quote::{quote_ident, quote_literal, quote_nliteral};
use crate::sql::runner::SqlStep;
use crate::sql::views::ViewDefinition;

pub const CREDENTIAL_NAME: &str = "BillingStorageCredential";
pub const DATA_SOURCE_NAME: &str = "BillingDataSource";
pub const PRINCIPAL_ROLES: [&str; 3] = ["db_datareader", "db_datawriter", "db_ddladmin"];

/// Secret material for the database-scoped storage credential.
#[derive(Clone, PartialEq, Eq)]
pub enum StorageCredential {
    SharedAccessSignature(String),
    ManagedIdentity,
}

impl std::fmt::Debug for StorageCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageCredential::SharedAccessSignature(_) => f.write_str("SharedAccessSignature(..)"),
            StorageCredential::ManagedIdentity => f.write_str("ManagedIdentity"),
        }
    }
}

impl StorageCredential {
    pub fn from_config(config: &Config) -> Option<Self> {
        match config.storage_auth {
            StorageAuth::ManagedIdentity => Some(StorageCredential::ManagedIdentity),
            StorageAuth::Sas => config
                .sas_token
                .as_ref()
                .map(|t| StorageCredential::SharedAccessSignature(t.clone())),
            StorageAuth::Passthrough => None,
        }
    }
}

pub fn create_database_sql(name: &str) -> String {
    format!(
        "IF DB_ID({}) IS NULL CREATE DATABASE {}",
        quote_nliteral(name),
        quote_ident(name)
    )
}

pub fn create_master_key_sql(password: &str) -> String {
    format!(
        "IF NOT EXISTS (SELECT * FROM sys.symmetric_keys WHERE name = '##MS_DatabaseMasterKey##') \
         CREATE MASTER KEY ENCRYPTION BY PASSWORD = {}",
        quote_literal(password)
    )
}

pub fn drop_credential_sql(name: &str) -> String {
    format!(
        "IF EXISTS (SELECT * FROM sys.database_scoped_credentials WHERE name = {}) \
         DROP DATABASE SCOPED CREDENTIAL {}",
        quote_nliteral(name),
        quote_ident(name)
    )
}

pub fn create_credential_sql(name: &str, credential: &StorageCredential) -> String {
    match credential {
        StorageCredential::SharedAccessSignature(token) => format!(
            "CREATE DATABASE SCOPED CREDENTIAL {}\nWITH IDENTITY = 'SHARED ACCESS SIGNATURE',\nSECRET = {}",
            quote_ident(name),
            // The portal hands out tokens with a leading '?', which the
            // credential must not contain.
            quote_literal(token.trim_start_matches('?'))
        ),
        StorageCredential::ManagedIdentity => format!(
            "CREATE DATABASE SCOPED CREDENTIAL {}\nWITH IDENTITY = 'Managed Identity'",
            quote_ident(name)
        ),
    }
}

pub fn drop_data_source_sql(name: &str) -> String {
    format!(
        "IF EXISTS (SELECT * FROM sys.external_data_sources WHERE name = {}) \
         DROP EXTERNAL DATA SOURCE {}",
        quote_nliteral(name),
        quote_ident(name)
    )
}

pub fn create_data_source_sql(name: &str, location: &str, credential: &str) -> String {
    format!(
        "CREATE EXTERNAL DATA SOURCE {}\nWITH (\n    LOCATION = {},\n    CREDENTIAL = {}\n)",
        quote_ident(name),
        quote_literal(location),
        quote_ident(credential)
    )
}

/// Create (if needed) a contained user for an Azure AD principal and add it
/// to each role.
pub fn service_principal_user_sql(principal: &str, roles: &[&str]) -> Vec<String> {
    let mut stmts = vec![format!(
        "IF NOT EXISTS (SELECT * FROM sys.database_principals WHERE name = {}) \
         CREATE USER {} FROM EXTERNAL PROVIDER",
        quote_nliteral(principal),
        quote_ident(principal)
    )];
    stmts.extend(
        roles
            .iter()
            .map(|role| format!("ALTER ROLE {role} ADD MEMBER {}", quote_ident(principal))),
    );
    stmts
}

/// Storage-access objects: master key, credential and data source.
///
/// Dropping happens in dependency order (views that use the data source must
/// already be gone, which `views::recreate_all` arranges when run first).
pub fn storage_access_steps(config: &Config) -> Vec<SqlStep> {
    let mut steps = Vec::new();
    if let Some(password) = &config.master_key_password {
        steps.push(SqlStep::new("create master key", create_master_key_sql(password)));
    }

    let Some(credential) = StorageCredential::from_config(config) else {
        return steps;
    };
    steps.push(SqlStep::new(
        "drop data source",
        drop_data_source_sql(DATA_SOURCE_NAME),
    ));
    steps.push(SqlStep::new(
        "drop credential",
        drop_credential_sql(CREDENTIAL_NAME),
    ));
    steps.push(SqlStep::new(
        "create credential",
        create_credential_sql(CREDENTIAL_NAME, &credential),
    ));
    steps.push(SqlStep::new(
        "create data source",
        create_data_source_sql(DATA_SOURCE_NAME, &config.container_url(), CREDENTIAL_NAME),
    ));
    steps
}

pub fn principal_steps(principal: &str) -> Vec<SqlStep> {
    service_principal_user_sql(principal, &PRINCIPAL_ROLES)
        .into_iter()
        .enumerate()
        .map(|(i, sql)| {
            let label = if i == 0 {
                format!("create user {principal}")
            } else {
                format!("grant {}", PRINCIPAL_ROLES[i - 1])
            };
            SqlStep::new(label, sql)
        })
        .collect()
}

/// Script an admin can paste into Synapse Studio when the service principal
/// cannot log in to the billing database yet.
pub fn manual_user_script(config: &Config) -> String {
    let mut script = String::new();
    script.push_str("-- Run in Synapse Studio as a workspace admin.\n");
    script.push_str("-- Connect to the serverless pool and select the master database first.\n");
    script.push_str(&create_database_sql(&config.database_name));
    script.push_str("\nGO\n\n");
    script.push_str(&format!("USE {};\nGO\n\n", quote_ident(&config.database_name)));
    if let Some(password) = &config.master_key_password {
        script.push_str(&create_master_key_sql(password));
        script.push_str(";\nGO\n\n");
    }
    for stmt in service_principal_user_sql(&config.client_id, &PRINCIPAL_ROLES) {
        script.push_str(&stmt);
        script.push_str(";\n");
    }
    script.push_str("GO\n\n");
    script.push_str(&format!(
        "SELECT name, type_desc, authentication_type_desc\nFROM sys.database_principals\nWHERE name = {};\n",
        quote_nliteral(&config.client_id)
    ));
    script
}

/// Full provisioning batch for an existing database.
///
/// Views are dropped before the data source they read through, and created
/// after it; the principal's user comes last.
pub fn provisioning_steps(config: &Config, views: &[ViewDefinition]) -> Vec<SqlStep> {
    let (drops, creates): (Vec<_>, Vec<_>) = views
        .iter()
        .map(|v| {
            let [drop, create] = v.recreate_steps();
            (drop, create)
        })
        .unzip();

    let mut steps = drops;
    steps.extend(storage_access_steps(config));
    steps.extend(creates);
    steps.extend(principal_steps(&config.client_id));
    steps
}
