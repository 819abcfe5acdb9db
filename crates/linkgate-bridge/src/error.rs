//! Bridge error types.
//!
//! Hooks and the bridge driver surface errors through [`BridgeError`]. The
//! classification reuses the auth engine's [`ErrorKind`] so hosts handle
//! both crates' failures the same way.

use linkgate_auth_engine::{AuthEngineError, ErrorKind};

/// Unified error type for the callback event bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    // -- Configuration errors ------------------------------------------------
    /// A mandatory hook was not supplied at registration time.
    #[error("missing required hook `{hook}`")]
    MissingHook { hook: &'static str },

    /// `poll` was invoked on a source that only receives pushes.
    #[error("event source `{source_id}` does not support polling")]
    PollUnsupported { source_id: String },

    /// The event source is misconfigured.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // -- Protocol errors -----------------------------------------------------
    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    // -- Shape errors --------------------------------------------------------
    /// The provider returned a body that could not be interpreted.
    #[error("malformed provider response: {reason}")]
    MalformedResponse { reason: String },

    /// An inbound event payload did not have the expected shape.
    #[error("invalid event payload: {reason}")]
    InvalidPayload { reason: String },

    /// JSON serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Transport and plumbing ----------------------------------------------
    /// An HTTP request to the provider failed before a response arrived.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Loading or committing poll state failed.
    #[error("poll state store error: {reason}")]
    Store { reason: String },

    /// I/O error (e.g. from a file-backed state store).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other auth engine failure raised inside a hook.
    #[error("auth error: {0}")]
    Auth(AuthEngineError),
}

impl BridgeError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingHook { .. } | Self::PollUnsupported { .. } | Self::InvalidConfig { .. } => {
                ErrorKind::Configuration
            }
            Self::HttpStatus { .. } => ErrorKind::Protocol,
            Self::MalformedResponse { .. }
            | Self::InvalidPayload { .. }
            | Self::Serialization(_) => ErrorKind::Shape,
            Self::Network(_) | Self::Store { .. } | Self::Io(_) => ErrorKind::Transport,
            Self::Auth(inner) => inner.kind(),
        }
    }

    pub fn invalid_payload(reason: impl std::fmt::Display) -> Self {
        Self::InvalidPayload {
            reason: reason.to_string(),
        }
    }
}

/// Keep protocol, shape, and transport failures in their own variants so a
/// hook using the auth engine's HTTP helpers reports them the same way as
/// one talking to the provider directly.
impl From<AuthEngineError> for BridgeError {
    fn from(err: AuthEngineError) -> Self {
        match err {
            AuthEngineError::HttpStatus { status, body } => Self::HttpStatus { status, body },
            AuthEngineError::MalformedResponse { reason } => Self::MalformedResponse { reason },
            AuthEngineError::Network(e) => Self::Network(e),
            other => Self::Auth(other),
        }
    }
}

/// Convenience alias used throughout the bridge crate.
pub type Result<T> = std::result::Result<T, BridgeError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_missing_hook() {
        let err = BridgeError::MissingHook { hook: "handle" };
        assert_eq!(err.to_string(), "missing required hook `handle`");
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn auth_errors_keep_their_class() {
        let err: BridgeError = AuthEngineError::HttpStatus {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        assert!(matches!(err, BridgeError::HttpStatus { status: 502, .. }));
        assert_eq!(err.kind(), ErrorKind::Protocol);

        let err: BridgeError = AuthEngineError::malformed("not json").into();
        assert_eq!(err.kind(), ErrorKind::Shape);

        let err: BridgeError = AuthEngineError::MissingAuthorizationCode.into();
        assert!(matches!(err, BridgeError::Auth(_)));
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BridgeError>();
    }
}
