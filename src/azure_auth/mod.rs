//! Service-principal authentication against Azure AD.

mod endpoints;
pub mod service;

use crate::config::Config;
use crate::error::BillingError;
use url::Url;

pub use service::{TokenProvider, build_http_client};

/// Client-credential identity used in place of an interactive login.
#[derive(Clone)]
pub struct ServicePrincipal {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub token_url: Url,
}

impl ServicePrincipal {
    pub fn from_config(config: &Config) -> Result<Self, BillingError> {
        config.validate_identity()?;
        Ok(Self {
            tenant_id: config.tenant_id.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token_url: config.token_url()?,
        })
    }
}

impl std::fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicePrincipal")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("token_url", &self.token_url.as_str())
            .finish_non_exhaustive()
    }
}
