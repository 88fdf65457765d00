use pretty_assertions::assert_eq;
use synapse_billing::config::{Config, StorageAuth};
use synapse_billing::sql::connection::ConnectionSpec;
use synapse_billing::sql::security::{
    CREDENTIAL_NAME, StorageCredential, create_credential_sql, create_data_source_sql,
    create_database_sql, manual_user_script, provisioning_steps, service_principal_user_sql,
    storage_access_steps,
};
use synapse_billing::sql::views::{BulkSource, billing_views};
use std::time::Duration;

fn config(auth: StorageAuth) -> Config {
    Config {
        tenant_id: "tenant".into(),
        client_id: "11111111-2222-3333-4444-555555555555".into(),
        client_secret: "secret".into(),
        workspace_name: "billing-ws".into(),
        storage_account: "billingstore".into(),
        container: "exports".into(),
        storage_auth: auth,
        sas_token: Some("?sv=2024-01-01&sig=abc".into()),
        master_key_password: Some("Str0ng!Pass".into()),
        ..Config::default()
    }
}

#[test]
fn database_creation_is_guarded() {
    assert_eq!(
        create_database_sql("BillingAnalytics"),
        "IF DB_ID(N'BillingAnalytics') IS NULL CREATE DATABASE [BillingAnalytics]"
    );
}

#[test]
fn sas_credential_drops_leading_question_mark() {
    let sql = create_credential_sql(
        CREDENTIAL_NAME,
        &StorageCredential::SharedAccessSignature("?sv=2024&sig=a'b".into()),
    );
    assert_eq!(
        sql,
        "CREATE DATABASE SCOPED CREDENTIAL [BillingStorageCredential]
WITH IDENTITY = 'SHARED ACCESS SIGNATURE',
SECRET = 'sv=2024&sig=a''b'"
    );
}

#[test]
fn managed_identity_credential_has_no_secret() {
    let sql = create_credential_sql("Cred", &StorageCredential::ManagedIdentity);
    assert_eq!(
        sql,
        "CREATE DATABASE SCOPED CREDENTIAL [Cred]\nWITH IDENTITY = 'Managed Identity'"
    );
    assert_eq!(
        format!("{:?}", StorageCredential::SharedAccessSignature("sig".into())),
        "SharedAccessSignature(..)"
    );
}

#[test]
fn data_source_points_at_container() {
    assert_eq!(
        create_data_source_sql(
            "BillingDataSource",
            "https://billingstore.blob.core.windows.net/exports",
            "BillingStorageCredential"
        ),
        "CREATE EXTERNAL DATA SOURCE [BillingDataSource]
WITH (
    LOCATION = 'https://billingstore.blob.core.windows.net/exports',
    CREDENTIAL = [BillingStorageCredential]
)"
    );
}

#[test]
fn principal_user_gets_every_role() {
    let stmts = service_principal_user_sql("app", &["db_datareader", "db_ddladmin"]);
    assert_eq!(stmts.len(), 3);
    assert!(stmts[0].ends_with("CREATE USER [app] FROM EXTERNAL PROVIDER"));
    assert_eq!(stmts[1], "ALTER ROLE db_datareader ADD MEMBER [app]");
    assert_eq!(stmts[2], "ALTER ROLE db_ddladmin ADD MEMBER [app]");
}

#[test]
fn passthrough_needs_no_credential_objects() {
    let mut cfg = config(StorageAuth::Passthrough);
    cfg.master_key_password = None;
    assert!(storage_access_steps(&cfg).is_empty());

    let labels: Vec<String> = storage_access_steps(&config(StorageAuth::Sas))
        .into_iter()
        .map(|s| s.label)
        .collect();
    assert_eq!(
        labels,
        vec![
            "create master key",
            "drop data source",
            "drop credential",
            "create credential",
            "create data source",
        ]
    );
}

#[test]
fn managed_identity_creates_master_key_before_credential() {
    let cfg = Config {
        sas_token: None,
        ..config(StorageAuth::ManagedIdentity)
    };
    cfg.validate_provisioning().unwrap();

    let steps = storage_access_steps(&cfg);
    assert_eq!(steps[0].label, "create master key");
    assert!(steps[0].sql.contains("Str0ng!Pass"));
    let credential = steps
        .iter()
        .find(|s| s.label == "create credential")
        .unwrap();
    assert!(credential.sql.contains("IDENTITY = 'Managed Identity'"), "{}", credential.sql);
}

#[test]
fn provisioning_drops_views_before_data_source() {
    let cfg = config(StorageAuth::ManagedIdentity);
    let views = billing_views(BulkSource::DataSource {
        name: "BillingDataSource".into(),
        path: "daily/*.csv".into(),
    });
    let labels: Vec<String> = provisioning_steps(&cfg, &views)
        .into_iter()
        .map(|s| s.label)
        .collect();

    let pos = |label: &str| labels.iter().position(|l| l == label).unwrap();
    assert!(pos("drop view DailyCosts") < pos("drop data source"));
    assert!(pos("create data source") < pos("create view BillingData"));
    assert!(pos("create view DailyCosts") < pos(&format!("create user {}", cfg.client_id)));
    assert_eq!(labels.last().map(String::as_str), Some("grant db_ddladmin"));
}

#[test]
fn manual_script_targets_billing_database() {
    let script = manual_user_script(&config(StorageAuth::ManagedIdentity));
    assert!(script.contains("IF DB_ID(N'BillingAnalytics') IS NULL CREATE DATABASE [BillingAnalytics]"));
    assert!(script.contains("USE [BillingAnalytics];\nGO"));
    assert!(script.contains("CREATE USER [11111111-2222-3333-4444-555555555555] FROM EXTERNAL PROVIDER;"));
    assert!(script.contains("ALTER ROLE db_datawriter ADD MEMBER"));
    assert!(script.contains("CREATE MASTER KEY ENCRYPTION BY PASSWORD = 'Str0ng!Pass'"));
}

#[test]
fn odbc_string_hides_secret_unless_asked() {
    let mut spec = ConnectionSpec::billing(&config(StorageAuth::ManagedIdentity));
    spec.connect_timeout = Duration::from_secs(45);
    assert_eq!(
        spec.odbc_connection_string(None),
        "DRIVER={ODBC Driver 18 for SQL Server};\
         SERVER=billing-ws-ondemand.sql.azuresynapse.net,1433;\
         DATABASE=BillingAnalytics;\
         UID=11111111-2222-3333-4444-555555555555;\
         PWD=<client_secret>;\
         Authentication=ActiveDirectoryServicePrincipal;\
         Encrypt=yes;\
         TrustServerCertificate=no;\
         Connection Timeout=45;"
    );
    assert!(spec.odbc_connection_string(Some("secret")).contains("PWD=secret;"));
}
