//! The contract every delegated-access integration implements.

use async_trait::async_trait;

use crate::error::{AuthEngineError, Result};
use crate::form::FormDescriptor;
use crate::oauth::OAuthClient;
use crate::request::{AuthorizationRequest, AuthorizationUrl, CallbackInput, RefreshInput};
use crate::token::TokenSet;

/// Authorization flow controller for one downstream service.
///
/// Implementations are stateless between calls: everything a call needs
/// arrives in its input, and the PKCE verifier travels through the host.
///
/// ```text
/// UNAUTHENTICATED -> authorization_url -> (host) CALLBACK_PENDING
///                 -> handle_callback   -> AUTHENTICATED
///                 -> refresh_access_token (repeat) -> AUTHENTICATED
/// ```
#[async_trait]
pub trait AuthorizationProvider: Send + Sync {
    /// Stable provider identifier, used in logs and errors.
    fn id(&self) -> &str;

    /// Extra fields the installer must supply before authorization.
    fn auth_form(&self) -> Option<FormDescriptor> {
        None
    }

    /// Build the authorization URL. Must not touch the network.
    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl>;

    /// Exchange the redirect's code for tokens, running any follow-up
    /// discovery the provider needs before the token set is complete.
    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet>;

    /// Whether [`AuthorizationProvider::refresh_access_token`] is available.
    fn supports_refresh(&self) -> bool {
        false
    }

    /// Renew the access token. The default rejects the call.
    async fn refresh_access_token(&self, _input: &RefreshInput) -> Result<TokenSet> {
        Err(AuthEngineError::RefreshUnsupported {
            provider: self.id().to_string(),
        })
    }
}

/// A bare [`OAuthClient`] is a complete provider for services with no quirks
/// beyond its configuration.
#[async_trait]
impl AuthorizationProvider for OAuthClient {
    fn id(&self) -> &str {
        self.provider()
    }

    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        OAuthClient::authorization_url(self, req)
    }

    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet> {
        self.exchange_code(input).await
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_access_token(&self, input: &RefreshInput) -> Result<TokenSet> {
        self.refresh(input).await
    }
}
