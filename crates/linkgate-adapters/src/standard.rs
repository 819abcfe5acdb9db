//! Configurable OAuth 2.0 provider.
//!
//! Covers every service whose flow is plain RFC 6749 (plus optional PKCE):
//! endpoints, scopes, client authentication, and authorize extras are all
//! data. A handful of presets fill those in for common services; any field
//! can still be overridden from settings.

use async_trait::async_trait;
use linkgate_auth_engine::{
    AuthorizationProvider, AuthorizationRequest, AuthorizationUrl, CallbackInput, ClientAuth,
    OAuthClient, OAuthEndpoints, RefreshInput, Result, TokenRequestFormat, TokenSet,
};

/// A provider driven entirely by its [`OAuthClient`] configuration.
#[derive(Debug, Clone)]
pub struct StandardProvider {
    client: OAuthClient,
    refresh: bool,
}

impl StandardProvider {
    /// Wrap a configured client. Refresh is assumed to be supported.
    pub fn new(client: OAuthClient) -> Self {
        Self {
            client,
            refresh: true,
        }
    }

    /// GitHub OAuth app. Refresh tokens are only issued when the app opts
    /// into expiring user tokens, so refresh is off by default.
    pub fn github(id: impl Into<String>) -> Self {
        let client = OAuthClient::new(
            id,
            OAuthEndpoints::new(
                "https://github.com/login/oauth/authorize",
                "https://github.com/login/oauth/access_token",
            ),
        )
        .with_scopes(["repo", "read:user"]);
        Self::new(client).with_refresh(false)
    }

    /// Google. `access_type=offline` plus `prompt=consent` so a refresh
    /// token is issued on every grant.
    pub fn google(id: impl Into<String>) -> Self {
        let client = OAuthClient::new(
            id,
            OAuthEndpoints::new(
                "https://accounts.google.com/o/oauth2/v2/auth",
                "https://oauth2.googleapis.com/token",
            ),
        )
        .with_scopes(["openid", "email", "profile"])
        .with_authorize_param("access_type", "offline")
        .with_authorize_param("prompt", "consent");
        Self::new(client)
    }

    /// Notion. HTTP Basic client auth, JSON token requests, no PKCE, and
    /// access tokens that never expire.
    pub fn notion(id: impl Into<String>) -> Self {
        let client = OAuthClient::new(
            id,
            OAuthEndpoints::new(
                "https://api.notion.com/v1/oauth/authorize",
                "https://api.notion.com/v1/oauth/token",
            ),
        )
        .with_pkce(false)
        .with_client_auth(ClientAuth::BasicAuth)
        .with_request_format(TokenRequestFormat::Json)
        .with_authorize_param("owner", "user");
        Self::new(client).with_refresh(false)
    }

    /// Whether `refresh_access_token` is offered at all.
    pub fn with_refresh(mut self, enabled: bool) -> Self {
        self.refresh = enabled;
        self
    }

    /// Adjust the underlying client, e.g. to apply setting overrides.
    pub fn map_client(mut self, f: impl FnOnce(OAuthClient) -> OAuthClient) -> Self {
        self.client = f(self.client);
        self
    }

    pub fn client(&self) -> &OAuthClient {
        &self.client
    }
}

#[async_trait]
impl AuthorizationProvider for StandardProvider {
    fn id(&self) -> &str {
        self.client.provider()
    }

    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        self.client.authorization_url(req)
    }

    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet> {
        self.client.exchange_code(input).await
    }

    fn supports_refresh(&self) -> bool {
        self.refresh
    }

    async fn refresh_access_token(&self, input: &RefreshInput) -> Result<TokenSet> {
        if !self.refresh {
            return Err(linkgate_auth_engine::AuthEngineError::RefreshUnsupported {
                provider: self.id().to_string(),
            });
        }
        self.client.refresh(input).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use linkgate_auth_engine::AuthEngineError;
    use std::collections::HashMap;
    use url::Url;

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: "C1".to_string(),
            state: "abc123".to_string(),
            redirect_uri: "https://host/cb".to_string(),
            ..Default::default()
        }
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn google_preset_asks_for_offline_access() {
        let provider = StandardProvider::google("google");
        let out = provider.authorization_url(&request()).unwrap();
        let params = query(&out.authorization_url);
        assert_eq!(params["access_type"], "offline");
        assert_eq!(params["prompt"], "consent");
        assert_eq!(params["scope"], "openid email profile");
        assert!(out.code_verifier.is_some());
        assert!(provider.supports_refresh());
    }

    #[test]
    fn notion_preset_has_no_pkce() {
        let provider = StandardProvider::notion("notion");
        let out = provider.authorization_url(&request()).unwrap();
        let params = query(&out.authorization_url);
        assert_eq!(params["owner"], "user");
        assert!(!params.contains_key("code_challenge"));
        assert!(out.code_verifier.is_none());
    }

    #[tokio::test]
    async fn refresh_disabled_is_rejected_without_network() {
        let provider = StandardProvider::github("github");
        assert!(!provider.supports_refresh());
        let err = provider
            .refresh_access_token(&RefreshInput {
                refresh_token: "rt".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AuthEngineError::RefreshUnsupported { .. }));
    }

    #[test]
    fn map_client_overrides_scopes() {
        let provider = StandardProvider::github("github").map_client(|c| c.with_scopes(["gist"]));
        let out = provider.authorization_url(&request()).unwrap();
        assert_eq!(query(&out.authorization_url)["scope"], "gist");
        assert_eq!(provider.id(), "github");
    }
}
