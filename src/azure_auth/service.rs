use super::endpoints::AzureAdEndpoints;
use crate::azure_auth::ServicePrincipal;
use crate::config::Config;
use crate::error::{BillingError, IsRetryable};

use backon::{ExponentialBuilder, Retryable};
use chrono::{DateTime, TimeDelta, Utc};
use oauth2::TokenResponse;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, error};

/// Tokens are refreshed this many seconds before they expire.
const EXPIRY_MARGIN_SECS: i64 = 300;

fn default_retry_policy() -> ExponentialBuilder {
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(1))
        .with_max_delay(Duration::from_secs(3))
        .with_max_times(3)
        .with_jitter()
}

/// HTTP client shared by the token exchange and storage calls.
pub fn build_http_client(config: &Config) -> Result<reqwest::Client, BillingError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(concat!("synapse-billing/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        // Token endpoints must not be followed across redirects.
        .redirect(reqwest::redirect::Policy::none());
    if let Some(proxy_url) = config.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }
    Ok(builder.build()?)
}

#[derive(Clone)]
struct CachedToken {
    secret: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + TimeDelta::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

/// Acquires and caches service-principal access tokens per scope.
pub struct TokenProvider {
    principal: ServicePrincipal,
    http: reqwest::Client,
    cache: Mutex<HashMap<String, CachedToken>>,
}

impl TokenProvider {
    pub fn new(principal: ServicePrincipal, http: reqwest::Client) -> Self {
        Self {
            principal,
            http,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self, BillingError> {
        Ok(Self::new(ServicePrincipal::from_config(config)?, http))
    }

    /// Bearer token for `scope`, from cache when it is not about to expire.
    pub async fn token(&self, scope: &str) -> Result<String, BillingError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.get(scope)
            && cached.is_fresh(Utc::now())
        {
            debug!(scope, "using cached access token");
            return Ok(cached.secret.clone());
        }

        let fresh = self.request(scope).await?;
        let secret = fresh.secret.clone();
        cache.insert(scope.to_string(), fresh);
        Ok(secret)
    }

    async fn request(&self, scope: &str) -> Result<CachedToken, BillingError> {
        let response = (|| async {
            AzureAdEndpoints::client_credentials(&self.principal, scope, &self.http).await
        })
        .retry(default_retry_policy())
        .when(|e: &BillingError| e.is_retryable())
        .notify(|err, dur: Duration| {
            error!(
                "Azure AD token request failed: {}, retrying in {:?}",
                err, dur
            );
        })
        .await?;

        let lifetime = response
            .expires_in()
            .and_then(|d| TimeDelta::from_std(d).ok())
            .unwrap_or(TimeDelta::hours(1));
        Ok(CachedToken {
            secret: response.access_token().secret().clone(),
            expires_at: Utc::now() + lifetime,
        })
    }
}
