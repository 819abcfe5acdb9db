//! Adapter error types.
//!
//! Errors raised while *building* an integration from settings. Once built,
//! integrations report through the auth engine and bridge error types of the
//! contract they implement.

use linkgate_auth_engine::{AuthEngineError, ErrorKind};
use linkgate_bridge::BridgeError;

/// Unified error type for linkgate adapters.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Settings for an integration are missing or malformed.
    #[error("invalid settings for `{adapter_id}`: {reason}")]
    InvalidSettings { adapter_id: String, reason: String },

    #[error(transparent)]
    Auth(#[from] AuthEngineError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl AdapterError {
    pub fn invalid(adapter_id: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSettings {
            adapter_id: adapter_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSettings { .. } => ErrorKind::Configuration,
            Self::Auth(inner) => inner.kind(),
            Self::Bridge(inner) => inner.kind(),
        }
    }
}

/// Convenience alias used throughout the adapters crate.
pub type Result<T> = std::result::Result<T, AdapterError>;
