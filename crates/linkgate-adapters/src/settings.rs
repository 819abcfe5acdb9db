//! Declarative integration settings.
//!
//! Each `[providers.<id>]` / `[events.<id>]` table of the host configuration
//! deserializes into one of these and builds the matching integration. The
//! host owns file loading and environment overrides; this module only turns
//! settings into values implementing the contracts.

use std::collections::BTreeMap;
use std::sync::Arc;

use linkgate_auth_engine::{
    AuthorizationProvider, ClientAuth, OAuthClient, OAuthEndpoints, TokenRequestFormat,
};
use linkgate_bridge::{EventBridge, EventSource, PollStateStore};
use linkgate_kernel::IntegrationRegistry;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::atlassian::AtlassianProvider;
use crate::error::{AdapterError, Result};
use crate::github::GitHubRepo;
use crate::github_poll::GitHubIssuePoller;
use crate::github_webhook::GitHubWebhookSource;
use crate::standard::StandardProvider;
use crate::zendesk::ZendeskProvider;

// ---------------------------------------------------------------------------
// Authorization providers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Plain OAuth 2.0; `authorize_url` and `token_url` are required.
    #[default]
    Standard,
    Github,
    Google,
    Notion,
    Atlassian,
    Zendesk,
}

/// One `[providers.<id>]` table.
///
/// Client credentials and the redirect URI are host-side values passed in
/// with each request; they live here so the host has one place to read them
/// from.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub kind: ProviderKind,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_url: Option<String>,
    pub token_url: Option<String>,
    pub scopes: Option<Vec<String>>,
    pub scope_delimiter: Option<String>,
    pub pkce: Option<bool>,
    pub client_auth: Option<ClientAuth>,
    pub request_format: Option<TokenRequestFormat>,
    pub refresh: Option<bool>,
    pub authorize_params: BTreeMap<String, String>,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("kind", &self.kind)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .finish_non_exhaustive()
    }
}

impl ProviderSettings {
    /// Check settings without building anything.
    pub fn validate(&self, id: &str) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AdapterError::invalid(id, "client_id is empty"));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(AdapterError::invalid(id, "redirect_uri is empty"));
        }
        check_url(id, "redirect_uri", &self.redirect_uri)?;
        for (name, value) in [
            ("authorize_url", &self.authorize_url),
            ("token_url", &self.token_url),
        ] {
            if let Some(value) = value {
                check_url(id, name, value)?;
            }
        }
        if self.kind == ProviderKind::Standard
            && (self.authorize_url.is_none() || self.token_url.is_none())
        {
            return Err(AdapterError::invalid(
                id,
                "standard providers need authorize_url and token_url",
            ));
        }
        Ok(())
    }

    /// Build the provider registered under `id`.
    pub fn build(&self, id: &str) -> Result<Arc<dyn AuthorizationProvider>> {
        self.validate(id)?;

        let provider: Arc<dyn AuthorizationProvider> = match self.kind {
            ProviderKind::Standard => {
                let endpoints = OAuthEndpoints::new(
                    self.authorize_url.clone().unwrap_or_default(),
                    self.token_url.clone().unwrap_or_default(),
                );
                Arc::new(self.standard(StandardProvider::new(OAuthClient::new(id, endpoints))))
            }
            ProviderKind::Github => Arc::new(self.standard(StandardProvider::github(id))),
            ProviderKind::Google => Arc::new(self.standard(StandardProvider::google(id))),
            ProviderKind::Notion => Arc::new(self.standard(StandardProvider::notion(id))),
            ProviderKind::Atlassian => {
                let provider = AtlassianProvider::new(id).map_client(|c| self.overrides(c));
                Arc::new(provider)
            }
            ProviderKind::Zendesk => {
                if self.authorize_url.is_some() || self.token_url.is_some() {
                    return Err(AdapterError::invalid(
                        id,
                        "zendesk endpoints are derived from the subdomain field",
                    ));
                }
                let mut provider = ZendeskProvider::new(id);
                if let Some(scopes) = &self.scopes {
                    provider = provider.with_scopes(scopes.iter().cloned());
                }
                Arc::new(provider)
            }
        };

        tracing::debug!(provider = %id, kind = ?self.kind, "provider built from settings");
        Ok(provider)
    }

    fn standard(&self, provider: StandardProvider) -> StandardProvider {
        let provider = provider.map_client(|c| self.overrides(c));
        match self.refresh {
            Some(refresh) => provider.with_refresh(refresh),
            None => provider,
        }
    }

    /// Apply explicit settings on top of a preset client.
    fn overrides(&self, mut client: OAuthClient) -> OAuthClient {
        if self.authorize_url.is_some() || self.token_url.is_some() {
            let current = client.endpoints().clone();
            client = client.with_endpoints(OAuthEndpoints::new(
                self.authorize_url.clone().unwrap_or(current.authorize_url),
                self.token_url.clone().unwrap_or(current.token_url),
            ));
        }
        if let Some(scopes) = &self.scopes {
            client = client.with_scopes(scopes.iter().cloned());
        }
        if let Some(delimiter) = &self.scope_delimiter {
            client = client.with_scope_delimiter(delimiter.clone());
        }
        if let Some(pkce) = self.pkce {
            client = client.with_pkce(pkce);
        }
        if let Some(auth) = self.client_auth {
            client = client.with_client_auth(auth);
        }
        if let Some(format) = self.request_format {
            client = client.with_request_format(format);
        }
        for (key, value) in &self.authorize_params {
            client = client.with_authorize_param(key.clone(), value.clone());
        }
        client
    }
}

fn check_url(id: &str, name: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| AdapterError::invalid(id, format!("{name} `{value}` is not a URL: {e}")))
}

// ---------------------------------------------------------------------------
// Event sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    GithubWebhook,
    GithubIssues,
}

/// One `[events.<id>]` table.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSettings {
    pub kind: EventKind,
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Webhook signing secret.
    #[serde(default)]
    pub secret: Option<String>,
    /// Webhook event subscriptions.
    #[serde(default)]
    pub events: Option<Vec<String>>,
    #[serde(default)]
    pub per_page: Option<u8>,
    #[serde(default)]
    pub include_pull_requests: bool,
    /// Poll cadence in seconds, used by hosts that schedule polls.
    #[serde(default)]
    pub poll_interval_secs: Option<u64>,
}

impl std::fmt::Debug for EventSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSettings")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl EventSettings {
    pub fn build(&self, id: &str) -> Result<Arc<dyn EventSource>> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(AdapterError::invalid(id, "owner and repo are required"));
        }
        if self.token.trim().is_empty() {
            return Err(AdapterError::invalid(id, "token is empty"));
        }

        let mut repo = GitHubRepo::new(&self.owner, &self.repo, &self.token);
        if let Some(base) = &self.api_base {
            check_url(id, "api_base", base)?;
            repo = repo.with_base_url(base);
        }

        let source: Arc<dyn EventSource> = match self.kind {
            EventKind::GithubWebhook => {
                let mut source = GitHubWebhookSource::new(id, repo);
                if let Some(secret) = &self.secret {
                    source = source.with_secret(secret);
                }
                if let Some(events) = &self.events {
                    source = source.with_events(events.iter().cloned());
                }
                Arc::new(source)
            }
            EventKind::GithubIssues => {
                let mut source = GitHubIssuePoller::new(id, repo)
                    .with_pull_requests(self.include_pull_requests);
                if let Some(per_page) = self.per_page {
                    source = source.with_per_page(per_page);
                }
                Arc::new(source)
            }
        };

        tracing::debug!(source = %id, kind = ?self.kind, "event source built from settings");
        Ok(source)
    }
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// Build every configured integration and register it under its table id.
///
/// Nothing is registered unless every entry builds: a bad entry stops the
/// host before any integration is reachable.
pub fn register_all(
    registry: &IntegrationRegistry,
    providers: &BTreeMap<String, ProviderSettings>,
    events: &BTreeMap<String, EventSettings>,
    store: Arc<dyn PollStateStore>,
) -> Result<()> {
    let providers = providers
        .iter()
        .map(|(id, settings)| settings.build(id).map(|built| (id, built)))
        .collect::<Result<Vec<_>>>()?;
    let sources = events
        .iter()
        .map(|(id, settings)| settings.build(id).map(|built| (id, built)))
        .collect::<Result<Vec<_>>>()?;

    for (id, provider) in providers {
        registry.register_authorization(id.clone(), provider);
    }
    for (id, source) in sources {
        registry.register_callbacks(id.clone(), EventBridge::with_store(source, Arc::clone(&store)));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use linkgate_auth_engine::{AuthorizationRequest, ErrorKind};

    fn settings(kind: ProviderKind) -> ProviderSettings {
        ProviderSettings {
            kind,
            client_id: "C1".to_string(),
            redirect_uri: "http://127.0.0.1:8765/callback".to_string(),
            ..Default::default()
        }
    }

    fn request() -> AuthorizationRequest {
        AuthorizationRequest {
            client_id: "C1".to_string(),
            state: "s".to_string(),
            redirect_uri: "http://127.0.0.1:8765/callback".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn standard_requires_endpoints() {
        let err = settings(ProviderKind::Standard).build("acme").err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let provider = ProviderSettings {
            authorize_url: Some("https://acme.example/authorize".to_string()),
            token_url: Some("https://acme.example/token".to_string()),
            scopes: Some(vec!["a".to_string(), "b".to_string()]),
            scope_delimiter: Some(",".to_string()),
            pkce: Some(false),
            ..settings(ProviderKind::Standard)
        }
        .build("acme")
        .unwrap();
        let url = provider.authorization_url(&request()).unwrap();
        assert!(url.authorization_url.starts_with("https://acme.example/authorize?"));
        assert!(url.authorization_url.contains("scope=a%2Cb"));
        assert!(url.code_verifier.is_none());
        assert_eq!(provider.id(), "acme");
    }

    #[test]
    fn preset_overrides_apply() {
        let mut params = BTreeMap::new();
        params.insert("login".to_string(), "mona".to_string());
        let provider = ProviderSettings {
            authorize_params: params,
            refresh: Some(true),
            ..settings(ProviderKind::Github)
        }
        .build("gh")
        .unwrap();
        assert!(provider.supports_refresh());
        let url = provider.authorization_url(&request()).unwrap();
        assert!(url.authorization_url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.authorization_url.contains("login=mona"));
    }

    #[test]
    fn blank_client_id_and_bad_urls_are_rejected() {
        let err = ProviderSettings {
            client_id: " ".to_string(),
            ..settings(ProviderKind::Google)
        }
        .build("g")
        .err().unwrap();
        assert!(err.to_string().contains("client_id"));

        let err = ProviderSettings {
            token_url: Some("not a url".to_string()),
            ..settings(ProviderKind::Google)
        }
        .build("g")
        .err().unwrap();
        assert!(err.to_string().contains("token_url"));
    }

    #[test]
    fn zendesk_rejects_fixed_endpoints() {
        let err = ProviderSettings {
            token_url: Some("https://x.example/token".to_string()),
            ..settings(ProviderKind::Zendesk)
        }
        .build("zd")
        .err().unwrap();
        assert!(matches!(err, AdapterError::InvalidSettings { .. }));
        assert!(settings(ProviderKind::Zendesk).build("zd").is_ok());
    }

    #[test]
    fn register_all_is_all_or_nothing() {
        let registry = IntegrationRegistry::new();
        let store: Arc<dyn PollStateStore> = Arc::new(linkgate_bridge::MemoryPollStateStore::new());

        let mut providers = BTreeMap::new();
        providers.insert("google".to_string(), settings(ProviderKind::Google));
        providers.insert("broken".to_string(), settings(ProviderKind::Standard));
        let events = BTreeMap::new();

        assert!(register_all(&registry, &providers, &events, Arc::clone(&store)).is_err());
        assert_eq!(registry.count(), 0);

        providers.remove("broken");
        register_all(&registry, &providers, &events, store).unwrap();
        assert!(registry.authorization("google").is_ok());
    }

    #[test]
    fn event_settings_parse_and_build() {
        let parsed: EventSettings = serde_json::from_str(
            r#"{"kind": "github_issues", "owner": "o", "repo": "r", "token": "t", "per_page": 50}"#,
        )
        .unwrap();
        let source = parsed.build("issues").unwrap();
        assert!(source.supports_poll());
        assert!(!source.supports_install());

        let webhook = EventSettings {
            kind: EventKind::GithubWebhook,
            ..parsed.clone()
        }
        .build("hooks")
        .unwrap();
        assert!(webhook.supports_install());

        let err = EventSettings {
            token: String::new(),
            ..parsed
        }
        .build("issues")
        .err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
