use crate::config::Config;
use crate::error::BillingError;
use crate::sql::result::{Cell, QueryResult};
use futures::TryStreamExt;
use std::time::Duration;
use tiberius::{AuthMethod, Client, Config as TdsConfig, EncryptionLevel, QueryItem};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

pub const SQL_PORT: u16 = 1433;
pub const MASTER_DATABASE: &str = "master";

/// Where and how to open one connection to the serverless SQL endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSpec {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub client_id: String,
    pub connect_timeout: Duration,
}

impl ConnectionSpec {
    pub fn new(config: &Config, database: impl Into<String>) -> Self {
        Self {
            host: config.sql_host(),
            port: SQL_PORT,
            database: database.into(),
            client_id: config.client_id.clone(),
            connect_timeout: config.connect_timeout(),
        }
    }

    pub fn master(config: &Config) -> Self {
        Self::new(config, MASTER_DATABASE)
    }

    pub fn billing(config: &Config) -> Self {
        Self::new(config, config.database_name.clone())
    }

    /// ODBC Driver 18 connection string for the same endpoint.
    ///
    /// The secret is written only when one is passed; otherwise `PWD` holds a
    /// placeholder so the string can be printed safely.
    pub fn odbc_connection_string(&self, secret: Option<&str>) -> String {
        let pwd = secret.unwrap_or("<client_secret>");
        [
            "DRIVER={ODBC Driver 18 for SQL Server}".to_string(),
            format!("SERVER={},{}", self.host, self.port),
            format!("DATABASE={}", self.database),
            format!("UID={}", self.client_id),
            format!("PWD={pwd}"),
            "Authentication=ActiveDirectoryServicePrincipal".to_string(),
            "Encrypt=yes".to_string(),
            "TrustServerCertificate=no".to_string(),
            format!("Connection Timeout={}", self.connect_timeout.as_secs()),
        ]
        .join(";")
            + ";"
    }

    fn tds_config(&self, host: &str, port: u16, access_token: &str) -> TdsConfig {
        let mut cfg = TdsConfig::new();
        cfg.host(host);
        cfg.port(port);
        cfg.database(&self.database);
        cfg.application_name("synapse-billing");
        cfg.authentication(AuthMethod::aad_token(access_token));
        cfg.encryption(EncryptionLevel::Required);
        cfg
    }
}

/// Something that can run verbatim SQL batches.
#[allow(async_fn_in_trait)]
pub trait SqlExecutor {
    /// Run a batch, discarding any rows it returns.
    async fn execute(&mut self, sql: &str) -> Result<(), BillingError>;

    /// Run a batch and collect its first result set.
    async fn query(&mut self, sql: &str) -> Result<QueryResult, BillingError>;
}

/// One open TDS connection authenticated with an Azure AD access token.
pub struct SynapseClient {
    database: String,
    inner: Client<Compat<TcpStream>>,
}

impl SynapseClient {
    /// Connect, giving up after `connect_timeout`.
    pub async fn connect(spec: &ConnectionSpec, access_token: &str) -> Result<Self, BillingError> {
        let attempt = Self::connect_inner(spec, access_token);
        let inner = tokio::time::timeout(spec.connect_timeout, attempt)
            .await
            .map_err(|_| BillingError::Timeout(spec.connect_timeout))??;
        info!(host = %spec.host, database = %spec.database, "connected to SQL endpoint");
        Ok(Self {
            database: spec.database.clone(),
            inner,
        })
    }

    async fn connect_inner(
        spec: &ConnectionSpec,
        access_token: &str,
    ) -> Result<Client<Compat<TcpStream>>, BillingError> {
        let cfg = spec.tds_config(&spec.host, spec.port, access_token);
        let tcp = TcpStream::connect(cfg.get_addr()).await?;
        tcp.set_nodelay(true)?;

        match Client::connect(cfg, tcp.compat_write()).await {
            Ok(client) => Ok(client),
            // The gateway may redirect us to the node that owns the database.
            Err(tiberius::error::Error::Routing { host, port }) => {
                debug!(%host, port, "following gateway redirect");
                let cfg = spec.tds_config(&host, port, access_token);
                let tcp = TcpStream::connect(cfg.get_addr()).await?;
                tcp.set_nodelay(true)?;
                Ok(Client::connect(cfg, tcp.compat_write()).await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub async fn close(self) -> Result<(), BillingError> {
        self.inner.close().await?;
        Ok(())
    }
}

impl SqlExecutor for SynapseClient {
    async fn execute(&mut self, sql: &str) -> Result<(), BillingError> {
        let mut stream = self.inner.simple_query(sql).await?;
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Metadata(meta) = item {
                debug!(columns = meta.columns().len(), "statement returned a result set");
            }
        }
        Ok(())
    }

    async fn query(&mut self, sql: &str) -> Result<QueryResult, BillingError> {
        let mut stream = self.inner.simple_query(sql).await?;
        let columns: Vec<String> = stream
            .columns()
            .await?
            .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();

        let rows = stream
            .into_first_result()
            .await?
            .iter()
            .map(|row| row.cells().map(|(_, data)| Cell::from(data)).collect())
            .collect();

        Ok(QueryResult { columns, rows })
    }
}
