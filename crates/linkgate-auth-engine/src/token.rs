//! Token sets produced by code exchange and refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthEngineError, Result};

/// Seconds before the nominal expiry at which a token is treated as expired.
const EXPIRY_SAFETY_MARGIN_SECS: i64 = 60;

/// Tokens returned by a provider, plus any provider-specific fields.
///
/// The core OAuth fields are typed; everything else the provider returned (or
/// the integration attached, such as a discovered tenant id) lives in
/// [`TokenSet::extensions`]. On the wire the extensions are flattened next to
/// the core fields, so the host sees one JSON object.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer credential for downstream API calls.
    pub access_token: String,

    /// Credential for the refresh grant, when the provider issues one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds, relative to issue time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Space-delimited granted scopes, as returned by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Usually `Bearer`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Provider-specific fields passed through untouched.
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl TokenSet {
    /// Create a token set holding only an access token.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            expires_in: None,
            scope: None,
            token_type: None,
            extensions: Map::new(),
        }
    }

    /// Parse a token endpoint response body.
    ///
    /// Some providers encode `expires_in` as a string; both forms are
    /// accepted. A body that is not a JSON object, or lacks a non-empty
    /// `access_token`, is a shape error.
    ///
    /// # Errors
    ///
    /// Returns [`AuthEngineError::MalformedResponse`] on any shape problem.
    pub fn from_response_body(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| AuthEngineError::malformed(format!("token response is not JSON: {e}")))?;
        let Value::Object(mut map) = value else {
            return Err(AuthEngineError::malformed("token response is not a JSON object"));
        };

        let access_token = match map.remove("access_token") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => {
                return Err(AuthEngineError::malformed(
                    "token response missing `access_token`",
                ));
            }
        };

        let expires_in = match map.remove("expires_in") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
            Some(Value::String(s)) => Some(s.parse::<u64>().map_err(|_| {
                AuthEngineError::malformed(format!("`expires_in` is not a number: {s}"))
            })?),
            Some(other) => {
                return Err(AuthEngineError::malformed(format!(
                    "`expires_in` has unexpected type: {other}"
                )));
            }
        };

        Ok(Self {
            access_token,
            refresh_token: take_string(&mut map, "refresh_token"),
            expires_in,
            scope: take_string(&mut map, "scope"),
            token_type: take_string(&mut map, "token_type"),
            extensions: map,
        })
    }

    /// Look up a provider-specific field.
    pub fn extension(&self, key: &str) -> Option<&Value> {
        self.extensions.get(key)
    }

    /// Attach a provider-specific field, replacing any previous value.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extensions.insert(key.into(), value.into());
        self
    }

    /// Keep `original` as the refresh token when the provider did not rotate it.
    pub fn with_refresh_fallback(mut self, original: &str) -> Self {
        if self.refresh_token.as_deref().is_none_or(str::is_empty) {
            self.refresh_token = Some(original.to_string());
        }
        self
    }

    /// Split the granted scope string into individual scopes.
    pub fn scopes(&self) -> Vec<&str> {
        self.scope
            .as_deref()
            .map(|s| s.split([' ', ',']).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    /// Absolute expiry time, given when the token was issued.
    pub fn expires_at(&self, issued_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.expires_in
            .and_then(|secs| i64::try_from(secs).ok())
            .map(|secs| issued_at + Duration::seconds(secs))
    }

    /// Whether the access token should be considered expired at `now`.
    ///
    /// Tokens are treated as expired 60 seconds early. Without expiry
    /// information the token is assumed valid.
    pub fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.expires_at(issued_at) {
            Some(expires_at) => now >= expires_at - Duration::seconds(EXPIRY_SAFETY_MARGIN_SECS),
            None => false,
        }
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .field("extensions", &self.extensions.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            // Not a string: leave it for the integration to interpret.
            map.insert(key.to_string(), other);
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
