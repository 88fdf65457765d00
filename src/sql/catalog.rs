//! Read-only queries describing what exists in a database.

pub const DATABASES: &str = "SELECT name, create_date FROM sys.databases ORDER BY name";

pub const VIEWS: &str = r#"
SELECT schema_name(v.schema_id) AS SchemaName,
       v.name AS ViewName,
       v.create_date AS CreatedDate,
       v.modify_date AS ModifiedDate
FROM sys.views v
ORDER BY SchemaName, ViewName
"#;

pub const TABLES: &str = r#"
SELECT schema_name(t.schema_id) AS SchemaName,
       t.name AS TableName,
       t.create_date AS CreatedDate,
       t.modify_date AS ModifiedDate
FROM sys.tables t
ORDER BY SchemaName, TableName
"#;

pub const EXTERNAL_TABLES: &str = r#"
SELECT schema_name(t.schema_id) AS SchemaName,
       t.name AS TableName,
       t.create_date AS CreatedDate
FROM sys.external_tables t
ORDER BY SchemaName, TableName
"#;

pub const SCHEMAS: &str = r#"
SELECT s.name AS SchemaName,
       p.name AS Owner
FROM sys.schemas s
LEFT JOIN sys.database_principals p ON s.principal_id = p.principal_id
WHERE s.name NOT IN ('sys', 'INFORMATION_SCHEMA', 'guest')
ORDER BY SchemaName
"#;

pub const BILLING_OBJECTS: &str = r#"
SELECT type_desc AS ObjectType,
       schema_name(schema_id) AS SchemaName,
       name AS ObjectName
FROM sys.objects
WHERE LOWER(name) LIKE '%billing%'
ORDER BY ObjectType, SchemaName, ObjectName
"#;

pub const CREDENTIALS: &str = r#"
SELECT name AS CredentialName, credential_identity AS IdentityName
FROM sys.database_scoped_credentials
ORDER BY name
"#;

pub const DATA_SOURCES: &str = r#"
SELECT name AS DataSourceName, location AS Location
FROM sys.external_data_sources
ORDER BY name
"#;

/// Title and query for each section of an inspection report.
pub fn inspection_sections() -> [(&'static str, &'static str); 8] {
    [
        ("Views", VIEWS),
        ("Tables", TABLES),
        ("External tables", EXTERNAL_TABLES),
        ("Schemas", SCHEMAS),
        ("Objects containing 'billing'", BILLING_OBJECTS),
        ("Database scoped credentials", CREDENTIALS),
        ("External data sources", DATA_SOURCES),
        ("Databases", DATABASES),
    ]
}
