//! Atlassian Cloud (Jira, Confluence) OAuth 2.0 (3LO).
//!
//! Differences from a plain provider:
//!
//! - the authorize URL must carry `audience=api.atlassian.com` and
//!   `prompt=consent`;
//! - token requests are JSON, not form-encoded;
//! - refresh tokens rotate, so every refresh returns a new one;
//! - a grant is not tied to a site. After the exchange the provider is asked
//!   which cloud sites the token can reach, and the chosen site's id and URL
//!   are returned as token set extensions (`cloud_id`, `site_url`,
//!   `site_name` when the site has one). API calls are then made against
//!   `https://api.atlassian.com/ex/jira/{cloud_id}`.

use async_trait::async_trait;
use linkgate_auth_engine::{
    AuthEngineError, AuthorizationProvider, AuthorizationRequest, AuthorizationUrl,
    CallbackInput, FormDescriptor, FormField, OAuthClient, OAuthEndpoints, RefreshInput, Result,
    TokenRequestFormat, TokenSet,
};
use serde::Deserialize;

const AUTHORIZE_URL: &str = "https://auth.atlassian.com/authorize";
const TOKEN_URL: &str = "https://auth.atlassian.com/oauth/token";
const RESOURCES_URL: &str = "https://api.atlassian.com/oauth/token/accessible-resources";

/// Form field that pins the grant to one site when several are accessible.
pub const SITE_FIELD: &str = "site";

/// One entry of the accessible-resources response.
#[derive(Debug, Clone, Deserialize)]
struct AccessibleResource {
    id: String,
    url: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Clone)]
pub struct AtlassianProvider {
    client: OAuthClient,
    resources_url: String,
}

impl AtlassianProvider {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_urls(id, AUTHORIZE_URL, TOKEN_URL, RESOURCES_URL)
    }

    /// Point the provider at other endpoints (staging, tests).
    pub fn with_urls(
        id: impl Into<String>,
        authorize_url: impl Into<String>,
        token_url: impl Into<String>,
        resources_url: impl Into<String>,
    ) -> Self {
        let client = OAuthClient::new(id, OAuthEndpoints::new(authorize_url, token_url))
            .with_scopes([
                "read:jira-work",
                "write:jira-work",
                "read:jira-user",
                "offline_access",
            ])
            .with_pkce(false)
            .with_request_format(TokenRequestFormat::Json)
            .with_authorize_param("audience", "api.atlassian.com")
            .with_authorize_param("prompt", "consent");
        Self {
            client,
            resources_url: resources_url.into(),
        }
    }

    /// Scopes to request. `offline_access` is needed for a refresh token.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.client = self.client.with_scopes(scopes);
        self
    }

    /// Adjust the underlying client, e.g. to apply setting overrides.
    pub fn map_client(mut self, f: impl FnOnce(OAuthClient) -> OAuthClient) -> Self {
        self.client = f(self.client);
        self
    }

    /// Resolve the site this grant applies to.
    ///
    /// With a `site` field the matching site (by URL or name) is required;
    /// without one the first accessible site is used.
    async fn discover_site(
        &self,
        access_token: &str,
        wanted: Option<&str>,
    ) -> Result<AccessibleResource> {
        let body = self.client.get_json(&self.resources_url, access_token).await?;
        let sites: Vec<AccessibleResource> = serde_json::from_value(body).map_err(|e| {
            AuthEngineError::malformed(format!("accessible-resources is not a site list: {e}"))
        })?;

        tracing::debug!(
            provider = %self.client.provider(),
            sites = sites.len(),
            "accessible resources discovered"
        );

        match wanted {
            Some(wanted) => {
                let wanted = wanted.trim_end_matches('/');
                sites
                    .into_iter()
                    .find(|s| {
                        s.url.trim_end_matches('/').eq_ignore_ascii_case(wanted)
                            || s.name.eq_ignore_ascii_case(wanted)
                    })
                    .ok_or_else(|| AuthEngineError::DiscoveryFailed {
                        reason: format!("site `{wanted}` is not accessible with this grant"),
                    })
            }
            None => sites
                .into_iter()
                .next()
                .ok_or_else(|| AuthEngineError::DiscoveryFailed {
                    reason: "no accessible Atlassian sites for this grant".to_string(),
                }),
        }
    }
}

impl Default for AtlassianProvider {
    fn default() -> Self {
        Self::new("atlassian")
    }
}

#[async_trait]
impl AuthorizationProvider for AtlassianProvider {
    fn id(&self) -> &str {
        self.client.provider()
    }

    fn auth_form(&self) -> Option<FormDescriptor> {
        Some(FormDescriptor::new(vec![
            FormField::text(SITE_FIELD, "Site URL")
                .optional()
                .with_placeholder("https://your-team.atlassian.net"),
        ]))
    }

    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        self.client.authorization_url(req)
    }

    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet> {
        let tokens = self.client.exchange_code(input).await?;
        let site = self
            .discover_site(&tokens.access_token, input.field(SITE_FIELD))
            .await?;

        tracing::info!(
            provider = %self.client.provider(),
            cloud_id = %site.id,
            site_url = %site.url,
            "atlassian site resolved"
        );

        let tokens = tokens
            .with_extension("cloud_id", site.id)
            .with_extension("site_url", site.url);
        Ok(if site.name.is_empty() {
            tokens
        } else {
            tokens.with_extension("site_name", site.name)
        })
    }

    fn supports_refresh(&self) -> bool {
        true
    }

    /// Rotating refresh. A `cloud_id` passed in the input fields is carried
    /// over so the host does not lose the site binding.
    async fn refresh_access_token(&self, input: &RefreshInput) -> Result<TokenSet> {
        let mut tokens = self.client.refresh(input).await?;
        for key in ["cloud_id", "site_url", "site_name"] {
            if tokens.extension(key).is_none()
                && let Some(value) = input.field(key)
            {
                tokens = tokens.with_extension(key, value);
            }
        }
        Ok(tokens)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
