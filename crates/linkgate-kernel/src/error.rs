//! Kernel error types.
//!
//! Every public API in this crate returns [`KernelError`]. Failures raised by
//! an integration's own hooks are wrapped unchanged so their classification
//! survives the trip through the host.

use linkgate_auth_engine::{AuthEngineError, ErrorKind};
use linkgate_bridge::BridgeError;

/// Unified error type for the linkgate host runtime.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    // -- Registry errors ----------------------------------------------------
    /// Nothing is registered under this adapter id.
    #[error("adapter not found: {adapter_id}")]
    AdapterNotFound { adapter_id: String },

    /// The adapter exists but did not register the requested capability.
    #[error("adapter `{adapter_id}` has no {capability} registered")]
    NotRegistered {
        adapter_id: String,
        capability: &'static str,
    },

    // -- Scheduler errors ---------------------------------------------------
    /// A poll loop is already running for this callback id.
    #[error("poll already scheduled for callback `{callback_id}`")]
    PollAlreadyScheduled { callback_id: String },

    /// A poll loop was requested with an unusable cadence.
    #[error("invalid poll schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// The scheduler has been shut down and will not accept new work.
    #[error("poll scheduler is shut down")]
    SchedulerShutdown,

    // -- Integration errors -------------------------------------------------
    #[error(transparent)]
    Auth(#[from] AuthEngineError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

impl KernelError {
    /// Classify this error. Registry and scheduler misuse are
    /// configuration errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(inner) => inner.kind(),
            Self::Bridge(inner) => inner.kind(),
            _ => ErrorKind::Configuration,
        }
    }
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_registered_display() {
        let err = KernelError::NotRegistered {
            adapter_id: "github".to_string(),
            capability: "authorization provider",
        };
        assert_eq!(
            err.to_string(),
            "adapter `github` has no authorization provider registered"
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn wrapped_errors_keep_kind() {
        let err: KernelError = BridgeError::HttpStatus {
            status: 500,
            body: "boom".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.to_string(), "provider returned HTTP 500: boom");

        let err: KernelError = AuthEngineError::malformed("x").into();
        assert_eq!(err.kind(), ErrorKind::Shape);
    }
}
