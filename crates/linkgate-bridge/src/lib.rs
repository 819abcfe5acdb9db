//! Callback event bridge.
//!
//! One contract for receiving external events whether the provider pushes
//! them (webhooks) or has to be polled:
//!
//! - **[`source`]** -- the [`EventSource`] trait (`install`, `handle`, `poll`).
//! - **[`registration`]** -- the same contract assembled from closures;
//!   building without `handle` fails immediately.
//! - **[`store`]** -- where poll checkpoints live between calls.
//! - **[`bridge`]** -- [`EventBridge`], which loads the last checkpoint,
//!   runs the hook, and commits the returned checkpoint on success.
//!
//! A poll hook does not mutate state through a callback. It returns
//! [`PollOutcome`] with the new items and the next checkpoint, and the bridge
//! commits it at most once per call.

pub mod bridge;
pub mod error;
pub mod event;
pub mod registration;
pub mod source;
pub mod store;

pub use bridge::EventBridge;
pub use error::{BridgeError, Result};
pub use event::{HandledEvent, InboundEvent, InstallContext, PollOutcome, PollRequest, PollState};
pub use registration::{CallbackRegistration, CallbackRegistrationBuilder};
pub use source::EventSource;
pub use store::{JsonFilePollStateStore, MemoryPollStateStore, PollStateStore};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn EventSource>();
        assert_send_sync::<dyn PollStateStore>();
        assert_send_sync::<EventBridge>();
    }
}
