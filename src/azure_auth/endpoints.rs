use crate::azure_auth::ServicePrincipal;
use crate::error::BillingError;

use oauth2::{
    AuthType, Client as OAuth2Client, ClientId, ClientSecret, EndpointNotSet, EndpointSet, Scope,
    StandardRevocableToken, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenResponse,
    },
};
use tracing::info;

/// Stateless Azure AD token endpoint.
pub(super) struct AzureAdEndpoints;

impl AzureAdEndpoints {
    /// Exchange the client secret for an access token for `scope`.
    pub(super) async fn client_credentials(
        principal: &ServicePrincipal,
        scope: &str,
        http_client: &reqwest::Client,
    ) -> Result<BasicTokenResponse, BillingError> {
        let client = build_oauth2_client(principal)?;
        let token = client
            .exchange_client_credentials()
            .add_scope(Scope::new(scope.to_string()))
            .request_async(http_client)
            .await?;
        info!(client_id = %principal.client_id, scope, "access token acquired");
        Ok(token)
    }
}

fn build_oauth2_client(principal: &ServicePrincipal) -> Result<AzureAdClient, BillingError> {
    let client = OAuth2Client::new(ClientId::new(principal.client_id.clone()))
        .set_client_secret(ClientSecret::new(principal.client_secret.clone()))
        // Azure AD expects the secret in the form body, not in basic auth.
        .set_auth_type(AuthType::RequestBody)
        .set_token_uri(TokenUrl::new(principal.token_url.to_string())?);
    Ok(client)
}

pub(super) type AzureAdClient = OAuth2Client<
    BasicErrorResponse,
    BasicTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
