//! Error types for the auth engine crate.
//!
//! All auth engine operations surface errors through [`AuthEngineError`].
//! Variants fall into four broad classes, exposed through
//! [`AuthEngineError::kind`], so that callers can tell a misconfigured
//! integration apart from a provider that rejected a request or one that
//! returned a body we could not understand.

/// Coarse classification of an [`AuthEngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required hook or setting is missing. Terminates startup; never
    /// retried.
    Configuration,
    /// The OAuth protocol failed: missing code, denied consent, or a
    /// non-success HTTP status from the provider.
    Protocol,
    /// The provider answered with a body that does not have the expected
    /// shape (unparseable JSON, missing `access_token`, ...).
    Shape,
    /// Transport-level failure talking to the provider.
    Transport,
}

/// Unified error type for the linkgate auth engine.
#[derive(Debug, thiserror::Error)]
pub enum AuthEngineError {
    // -- Configuration errors ------------------------------------------------
    /// A mandatory hook was not supplied at registration time.
    #[error("missing required hook `{hook}`")]
    MissingHook {
        /// Name of the hook, using the host-facing field name.
        hook: &'static str,
    },

    /// Configuration is missing or malformed.
    #[error("invalid configuration: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },

    /// A provider-specific form field was not supplied.
    #[error("missing required field `{key}`")]
    MissingField {
        /// The form field key.
        key: String,
    },

    /// The provider does not issue refresh tokens.
    #[error("provider {provider} does not support token refresh")]
    RefreshUnsupported {
        /// The provider identifier.
        provider: String,
    },

    // -- Protocol errors -----------------------------------------------------
    /// The redirect URL carried no `code` query parameter.
    #[error("authorization code missing from callback url")]
    MissingAuthorizationCode,

    /// The authorization server redirected back with an `error` parameter.
    #[error("authorization denied: {error}{}", describe(.description))]
    AuthorizationDenied {
        /// The OAuth error code (e.g. `access_denied`).
        error: String,
        /// Optional `error_description` from the redirect.
        description: Option<String>,
    },

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// Post-exchange discovery found nothing the grant applies to (e.g. no
    /// accessible site or tenant).
    #[error("resource discovery failed: {reason}")]
    DiscoveryFailed {
        /// What the provider returned instead.
        reason: String,
    },

    /// The local callback listener timed out waiting for the redirect.
    #[error("callback timed out after {timeout_secs} seconds")]
    CallbackTimeout {
        /// How many seconds we waited before giving up.
        timeout_secs: u64,
    },

    // -- Shape errors --------------------------------------------------------
    /// The provider returned a body that could not be interpreted.
    #[error("malformed provider response: {reason}")]
    MalformedResponse {
        /// What was wrong with the body.
        reason: String,
    },

    // -- Transport and plumbing ----------------------------------------------
    /// An HTTP request to the provider failed before a response arrived.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The system CSPRNG failed.
    #[error("random number generation failed")]
    Random,

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error (e.g. from the callback TCP listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// URL parsing error.
    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),
}

impl AuthEngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingHook { .. }
            | Self::InvalidConfig { .. }
            | Self::MissingField { .. }
            | Self::RefreshUnsupported { .. }
            | Self::UrlParse(_) => ErrorKind::Configuration,
            Self::MissingAuthorizationCode
            | Self::AuthorizationDenied { .. }
            | Self::HttpStatus { .. }
            | Self::DiscoveryFailed { .. }
            | Self::CallbackTimeout { .. } => ErrorKind::Protocol,
            Self::MalformedResponse { .. } | Self::Serialization(_) => ErrorKind::Shape,
            Self::Network(_) | Self::Random | Self::Io(_) => ErrorKind::Transport,
        }
    }

    /// Build a [`AuthEngineError::MalformedResponse`] from any displayable cause.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::MalformedResponse {
            reason: reason.to_string(),
        }
    }
}

fn describe(description: &Option<String>) -> String {
    description
        .as_deref()
        .map(|d| format!(" ({d})"))
        .unwrap_or_default()
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, AuthEngineError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
