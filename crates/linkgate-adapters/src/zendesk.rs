//! Zendesk OAuth 2.0.
//!
//! Every Zendesk account lives on its own subdomain and has its own
//! authorization server, so the installer supplies the subdomain through the
//! authorization form and the endpoints are derived from it on each call:
//!
//! ```text
//! https://{subdomain}.zendesk.com/oauth/authorizations/new
//! https://{subdomain}.zendesk.com/oauth/tokens
//! ```
//!
//! The subdomain is returned as the `subdomain` extension of the token set
//! so the host can build API URLs and pass it back on refresh.

use async_trait::async_trait;
use linkgate_auth_engine::{
    AuthEngineError, AuthorizationProvider, AuthorizationRequest, AuthorizationUrl,
    CallbackInput, FormDescriptor, FormField, OAuthClient, OAuthEndpoints, RefreshInput, Result,
    TokenSet,
};

pub const SUBDOMAIN_FIELD: &str = "subdomain";

#[derive(Debug, Clone)]
pub struct ZendeskProvider {
    id: String,
    scopes: Vec<String>,
    /// Replaces `https://{subdomain}.zendesk.com` when set.
    base_url: Option<String>,
}

impl ZendeskProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scopes: vec!["read".to_string(), "write".to_string()],
            base_url: None,
        }
    }

    /// Scopes to request, e.g. `read` or `tickets:write`.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Serve every subdomain from one base URL (tests, proxies). The
    /// subdomain is still validated and recorded.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    fn client_for(&self, subdomain: &str) -> Result<OAuthClient> {
        validate_subdomain(subdomain)?;
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => format!("https://{subdomain}.zendesk.com"),
        };
        Ok(OAuthClient::new(
            self.id.clone(),
            OAuthEndpoints::new(
                format!("{base}/oauth/authorizations/new"),
                format!("{base}/oauth/tokens"),
            ),
        )
        .with_scopes(self.scopes.iter().cloned()))
    }
}

/// A Zendesk subdomain is a single DNS label: ASCII letters, digits, and
/// inner hyphens, at most 63 characters.
pub fn validate_subdomain(subdomain: &str) -> Result<()> {
    let valid = !subdomain.is_empty()
        && subdomain.len() <= 63
        && !subdomain.starts_with('-')
        && !subdomain.ends_with('-')
        && subdomain
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-');
    if valid {
        Ok(())
    } else {
        Err(AuthEngineError::InvalidConfig {
            reason: format!("`{subdomain}` is not a valid Zendesk subdomain"),
        })
    }
}

#[async_trait]
impl AuthorizationProvider for ZendeskProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_form(&self) -> Option<FormDescriptor> {
        Some(FormDescriptor::new(vec![
            FormField::text(SUBDOMAIN_FIELD, "Zendesk subdomain").with_placeholder("yourcompany"),
        ]))
    }

    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        let subdomain = req.require_field(SUBDOMAIN_FIELD)?;
        self.client_for(subdomain)?.authorization_url(req)
    }

    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet> {
        let subdomain = input.require_field(SUBDOMAIN_FIELD)?;
        let client = self.client_for(subdomain)?;
        let tokens = client.exchange_code(input).await?;
        Ok(tokens.with_extension(SUBDOMAIN_FIELD, subdomain))
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    async fn refresh_access_token(&self, input: &RefreshInput) -> Result<TokenSet> {
        let subdomain = input.require_field(SUBDOMAIN_FIELD)?;
        let tokens = self.client_for(subdomain)?.refresh(input).await?;
        Ok(tokens.with_extension(SUBDOMAIN_FIELD, subdomain))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
