//! Inputs and outputs of the three authorization operations.
//!
//! Field names follow the host-facing JSON contract (`clientId`,
//! `redirectUri`, ...), hence the camelCase renames.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{AuthEngineError, Result};

/// Input to building an authorization URL.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequest {
    /// Provider-specific values collected through the authorization form.
    #[serde(default)]
    pub fields: HashMap<String, String>,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Anti-forgery token, echoed verbatim into the URL. Verified by the host.
    pub state: String,
    pub redirect_uri: String,
}

impl AuthorizationRequest {
    /// Look up a form field, treating blank values as absent.
    pub fn field(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }

    /// Look up a form field that must be present.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::MissingField`] when the field is absent or blank.
    pub fn require_field(&self, key: &str) -> Result<&str> {
        require(&self.fields, key)
    }
}

impl std::fmt::Debug for AuthorizationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRequest")
            .field("fields", &self.fields)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("state", &self.state)
            .field("redirect_uri", &self.redirect_uri)
            .finish()
    }
}

/// The URL the user should visit, plus the PKCE verifier when one was made.
///
/// The verifier is not retained anywhere else: the host must persist it
/// until the callback arrives.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationUrl {
    pub authorization_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
}

impl AuthorizationUrl {
    /// A URL built without PKCE.
    pub fn plain(url: impl Into<String>) -> Self {
        Self {
            authorization_url: url.into(),
            code_verifier: None,
        }
    }
}

impl std::fmt::Debug for AuthorizationUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationUrl")
            .field("authorization_url", &self.authorization_url)
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Input to the code exchange.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackInput {
    /// The full inbound redirect URL, including its query string.
    pub callback_url: String,
    /// The state the host persisted when it issued the authorization URL.
    #[serde(default)]
    pub state: String,
    /// The verifier returned by `getAuthorizationUrl`, when PKCE was used.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_verifier: Option<String>,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub redirect_uri: String,
    /// The same form values that were used to build the authorization URL.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl CallbackInput {
    pub fn field(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }

    /// # Errors
    ///
    /// [`AuthEngineError::MissingField`] when the field is absent or blank.
    pub fn require_field(&self, key: &str) -> Result<&str> {
        require(&self.fields, key)
    }
}

impl std::fmt::Debug for CallbackInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackInput")
            .field("callback_url", &self.callback_url)
            .field("state", &self.state)
            .field("code_verifier", &self.code_verifier.as_ref().map(|_| "<redacted>"))
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Input to the refresh grant.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshInput {
    pub refresh_token: String,
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    /// Form values, for providers whose endpoints depend on them.
    #[serde(default)]
    pub fields: HashMap<String, String>,
}

impl RefreshInput {
    pub fn field(&self, key: &str) -> Option<&str> {
        lookup(&self.fields, key)
    }

    /// # Errors
    ///
    /// [`AuthEngineError::MissingField`] when the field is absent or blank.
    pub fn require_field(&self, key: &str) -> Result<&str> {
        require(&self.fields, key)
    }
}

impl std::fmt::Debug for RefreshInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshInput")
            .field("refresh_token", &"<redacted>")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("fields", &self.fields)
            .finish()
    }
}

fn lookup<'a>(fields: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    fields
        .get(key)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}

fn require<'a>(fields: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    lookup(fields, key).ok_or_else(|| AuthEngineError::MissingField {
        key: key.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
