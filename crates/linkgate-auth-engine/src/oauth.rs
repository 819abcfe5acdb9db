//! OAuth 2.0 Authorization Code Flow with optional PKCE.
//!
//! [`OAuthClient`] is the shared machinery behind every provider
//! integration: it builds RFC 6749 authorization URLs, performs the code
//! exchange and refresh grants, and turns token endpoint responses into
//! [`TokenSet`]s. Provider quirks (client authentication style, JSON token
//! requests, extra authorize parameters, scope delimiter) are configuration
//! on the client, not separate code paths.
//!
//! The client is stateless across calls: the PKCE verifier is returned to
//! the caller and comes back in with the callback.
//!
//! # Flow Overview
//!
//! 1. [`OAuthClient::authorization_url`] generates a PKCE pair (when enabled)
//!    and returns the URL plus the verifier.
//! 2. The user consents; the provider redirects to the host.
//! 3. [`OAuthClient::exchange_code`] extracts the code from the redirect and
//!    exchanges it for tokens.
//! 4. [`OAuthClient::refresh`] renews the access token.

use reqwest::header::{ACCEPT, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;

use crate::callback::extract_authorization_code;
use crate::error::{AuthEngineError, Result};
use crate::pkce::{PKCE_METHOD, PkcePair};
use crate::request::{AuthorizationRequest, AuthorizationUrl, CallbackInput, RefreshInput};
use crate::token::TokenSet;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Authorization and token endpoints of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthEndpoints {
    /// The authorization endpoint URL.
    pub authorize_url: String,
    /// The token endpoint URL.
    pub token_url: String,
}

impl OAuthEndpoints {
    pub fn new(authorize_url: impl Into<String>, token_url: impl Into<String>) -> Self {
        Self {
            authorize_url: authorize_url.into(),
            token_url: token_url.into(),
        }
    }
}

/// How client credentials are presented to the token endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientAuth {
    /// `client_id` / `client_secret` in the request body.
    #[default]
    RequestBody,
    /// HTTP Basic with `client_id:client_secret`.
    BasicAuth,
}

/// Encoding of token endpoint requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenRequestFormat {
    /// `application/x-www-form-urlencoded` (RFC 6749).
    #[default]
    Form,
    /// `application/json`, for providers that only accept JSON.
    Json,
}

/// OAuth client bound to one provider's endpoints and scope set.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    provider: String,
    endpoints: OAuthEndpoints,
    scopes: Vec<String>,
    scope_delimiter: String,
    use_pkce: bool,
    client_auth: ClientAuth,
    request_format: TokenRequestFormat,
    authorize_params: Vec<(String, String)>,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Create a client with PKCE enabled, space-delimited scopes, and
    /// credentials in the form body.
    pub fn new(provider: impl Into<String>, endpoints: OAuthEndpoints) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(concat!("linkgate/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();

        Self {
            provider: provider.into(),
            endpoints,
            scopes: Vec::new(),
            scope_delimiter: " ".to_string(),
            use_pkce: true,
            client_auth: ClientAuth::default(),
            request_format: TokenRequestFormat::default(),
            authorize_params: Vec::new(),
            http,
        }
    }

    /// Replace the authorize and token endpoints.
    pub fn with_endpoints(mut self, endpoints: OAuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Scopes requested on the authorize URL, replacing any set before.
    pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scopes = scopes.into_iter().map(Into::into).collect();
        self
    }

    /// Separator used to join scopes. Most providers take a space; some
    /// want a comma.
    pub fn with_scope_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.scope_delimiter = delimiter.into();
        self
    }

    /// Send an S256 challenge and expect the verifier at exchange time.
    pub fn with_pkce(mut self, enabled: bool) -> Self {
        self.use_pkce = enabled;
        self
    }

    /// Where client credentials go on token requests.
    pub fn with_client_auth(mut self, client_auth: ClientAuth) -> Self {
        self.client_auth = client_auth;
        self
    }

    /// Encoding of token request bodies.
    pub fn with_request_format(mut self, format: TokenRequestFormat) -> Self {
        self.request_format = format;
        self
    }

    /// Append a provider-specific authorize parameter (e.g. `audience`).
    pub fn with_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.authorize_params.push((key.into(), value.into()));
        self
    }

    /// Use a caller-supplied HTTP client (proxies, timeouts, tests).
    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn endpoints(&self) -> &OAuthEndpoints {
        &self.endpoints
    }

    pub fn uses_pkce(&self) -> bool {
        self.use_pkce
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    // -----------------------------------------------------------------------
    // Authorization URL
    // -----------------------------------------------------------------------

    /// Build the authorization URL the user should visit.
    ///
    /// Parameters: `response_type=code`, `client_id`, `redirect_uri`,
    /// `scope` (omitted when empty), `state` (verbatim), then
    /// `code_challenge` / `code_challenge_method=S256` when PKCE is on,
    /// then provider-specific extras. Existing query parameters on the
    /// authorize endpoint are preserved. No network call is made.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::InvalidConfig`] for an empty client id or state,
    /// [`AuthEngineError::UrlParse`] for a bad authorize endpoint.
    pub fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        if req.client_id.is_empty() {
            return Err(AuthEngineError::InvalidConfig {
                reason: format!("{}: client id is empty", self.provider),
            });
        }
        if req.state.is_empty() {
            return Err(AuthEngineError::InvalidConfig {
                reason: format!("{}: state is empty", self.provider),
            });
        }

        let pkce = if self.use_pkce {
            Some(PkcePair::generate()?)
        } else {
            None
        };

        let mut url = Url::parse(&self.endpoints.authorize_url)?;
        {
            let mut params = url.query_pairs_mut();
            params.append_pair("response_type", "code");
            params.append_pair("client_id", &req.client_id);
            params.append_pair("redirect_uri", &req.redirect_uri);
            if !self.scopes.is_empty() {
                params.append_pair("scope", &self.scopes.join(&self.scope_delimiter));
            }
            params.append_pair("state", &req.state);
            if let Some(ref pkce) = pkce {
                params.append_pair("code_challenge", &pkce.challenge);
                params.append_pair("code_challenge_method", PKCE_METHOD);
            }
            for (key, value) in &self.authorize_params {
                params.append_pair(key, value);
            }
        }

        tracing::debug!(provider = %self.provider, pkce = self.use_pkce, "built authorization url");

        Ok(AuthorizationUrl {
            authorization_url: url.to_string(),
            code_verifier: pkce.map(|p| p.verifier),
        })
    }

    // -----------------------------------------------------------------------
    // Token grants
    // -----------------------------------------------------------------------

    /// Exchange the code carried by `input.callback_url` for tokens.
    ///
    /// The code is extracted before anything touches the network, so a
    /// redirect without a code fails without a request being sent.
    ///
    /// # Errors
    ///
    /// - [`AuthEngineError::MissingAuthorizationCode`] / `AuthorizationDenied`
    ///   from the redirect.
    /// - [`AuthEngineError::InvalidConfig`] when PKCE is on and no verifier
    ///   was supplied.
    /// - [`AuthEngineError::HttpStatus`] when the provider rejects the code.
    pub async fn exchange_code(&self, input: &CallbackInput) -> Result<TokenSet> {
        let code = extract_authorization_code(&input.callback_url)?;

        let verifier = input.code_verifier.as_deref().filter(|v| !v.is_empty());
        if self.use_pkce && verifier.is_none() {
            return Err(AuthEngineError::InvalidConfig {
                reason: format!("{}: code verifier is required for PKCE", self.provider),
            });
        }

        let mut params = vec![
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("redirect_uri", input.redirect_uri.as_str()),
        ];
        if let Some(verifier) = verifier {
            params.push(("code_verifier", verifier));
        }

        tracing::debug!(
            provider = %self.provider,
            token_url = %self.endpoints.token_url,
            "exchanging authorization code"
        );

        self.token_request(params, &input.client_id, &input.client_secret)
            .await
    }

    /// Run the refresh grant.
    ///
    /// When the provider does not rotate refresh tokens the response carries
    /// none; the returned set then keeps `input.refresh_token`.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::HttpStatus`] if the refresh token is rejected.
    /// Never retried here.
    pub async fn refresh(&self, input: &RefreshInput) -> Result<TokenSet> {
        if input.refresh_token.is_empty() {
            return Err(AuthEngineError::InvalidConfig {
                reason: format!("{}: refresh token is empty", self.provider),
            });
        }

        let params = vec![
            ("grant_type", "refresh_token"),
            ("refresh_token", input.refresh_token.as_str()),
        ];

        tracing::debug!(
            provider = %self.provider,
            token_url = %self.endpoints.token_url,
            "refreshing access token"
        );

        let tokens = self
            .token_request(params, &input.client_id, &input.client_secret)
            .await?;
        Ok(tokens.with_refresh_fallback(&input.refresh_token))
    }

    /// POST a grant to the token endpoint, attaching client credentials.
    async fn token_request(
        &self,
        mut params: Vec<(&str, &str)>,
        client_id: &str,
        client_secret: &str,
    ) -> Result<TokenSet> {
        let mut request = self
            .http
            .post(&self.endpoints.token_url)
            .header(ACCEPT, HeaderValue::from_static("application/json"));

        match self.client_auth {
            ClientAuth::RequestBody => {
                params.push(("client_id", client_id));
                if !client_secret.is_empty() {
                    params.push(("client_secret", client_secret));
                }
            }
            ClientAuth::BasicAuth => {
                request = request.basic_auth(client_id, Some(client_secret));
            }
        }

        request = match self.request_format {
            TokenRequestFormat::Form => request.form(&params),
            TokenRequestFormat::Json => {
                let body: Map<String, Value> = params
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                    .collect();
                request.json(&body)
            }
        };

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        let tokens = Self::parse_token_response(status, &body)?;
        tracing::debug!(provider = %self.provider, "token request succeeded");
        Ok(tokens)
    }

    /// Interpret a token endpoint response.
    ///
    /// Non-success statuses surface the raw body. Some providers answer
    /// `200 OK` with an `error` object; that is reported the same way.
    pub fn parse_token_response(status: reqwest::StatusCode, body: &str) -> Result<TokenSet> {
        if !status.is_success() {
            return Err(AuthEngineError::HttpStatus {
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        if let Ok(err) = serde_json::from_str::<TokenErrorResponse>(body)
            && err.access_token.is_none()
        {
            tracing::debug!(error = %err.error, "token endpoint returned an error object");
            return Err(AuthEngineError::HttpStatus {
                status: status.as_u16(),
                body: body.to_string(),
            });
        }

        TokenSet::from_response_body(body)
    }

    // -----------------------------------------------------------------------
    // Authenticated provider calls
    // -----------------------------------------------------------------------

    /// GET a JSON document with a bearer token, e.g. for post-exchange
    /// resource discovery.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::HttpStatus`] on a non-success status,
    /// [`AuthEngineError::MalformedResponse`] on a non-JSON body.
    pub async fn get_json(&self, url: &str, access_token: &str) -> Result<Value> {
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .send()
            .await?;
        read_json(response).await
    }
}

/// Read a response body as JSON, mapping failures into the error taxonomy.
///
/// # Errors
///
/// [`AuthEngineError::HttpStatus`] for non-success statuses,
/// [`AuthEngineError::MalformedResponse`] for bodies that are not JSON.
pub async fn read_json(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AuthEngineError::HttpStatus {
            status: status.as_u16(),
            body,
        });
    }
    serde_json::from_str(&body)
        .map_err(|e| AuthEngineError::malformed(format!("expected JSON body: {e}")))
}

/// Error object some token endpoints return.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    access_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
