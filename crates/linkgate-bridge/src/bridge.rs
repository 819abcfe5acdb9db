//! Bridge driver.
//!
//! [`EventBridge`] pairs an [`EventSource`] with a [`PollStateStore`] and is
//! the only thing a host calls. It threads poll checkpoints between calls:
//! the state committed after poll *n* is the state presented to poll *n+1*
//! for the same callback id.
//!
//! The bridge neither retries nor deduplicates. A hook error is returned to
//! the caller untouched and leaves the committed state as it was.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::event::{HandledEvent, InboundEvent, InstallContext, PollRequest};
use crate::source::EventSource;
use crate::store::{MemoryPollStateStore, PollStateStore};

/// Host-facing driver for one event source.
#[derive(Clone)]
pub struct EventBridge {
    source: Arc<dyn EventSource>,
    store: Arc<dyn PollStateStore>,
}

impl EventBridge {
    /// Bridge with a process-local state store.
    pub fn new(source: Arc<dyn EventSource>) -> Self {
        Self::with_store(source, Arc::new(MemoryPollStateStore::new()))
    }

    /// Bridge whose committed state lives in `store`.
    pub fn with_store(source: Arc<dyn EventSource>, store: Arc<dyn PollStateStore>) -> Self {
        Self { source, store }
    }

    pub fn source_id(&self) -> &str {
        self.source.id()
    }

    pub fn source(&self) -> &Arc<dyn EventSource> {
        &self.source
    }

    pub fn store(&self) -> &Arc<dyn PollStateStore> {
        &self.store
    }

    pub fn supports_install(&self) -> bool {
        self.source.supports_install()
    }

    pub fn supports_poll(&self) -> bool {
        self.source.supports_poll()
    }

    pub async fn install(&self, ctx: &InstallContext) -> Result<Option<Value>> {
        tracing::info!(
            source = %self.source.id(),
            callback_id = %ctx.callback_id,
            "installing callback"
        );
        let meta = self.source.install(ctx).await.inspect_err(|e| {
            tracing::warn!(source = %self.source.id(), callback_id = %ctx.callback_id, error = %e, "install failed");
        })?;
        Ok(meta)
    }

    /// Forward one inbound push. `Ok(None)` means the event was not
    /// actionable, which is not an error.
    pub async fn handle(&self, event: &InboundEvent) -> Result<Option<HandledEvent>> {
        let handled = self.source.handle(event).await?;
        tracing::debug!(
            source = %self.source.id(),
            callback_id = %event.callback_id,
            event_id = %event.event_id,
            actionable = handled.is_some(),
            "event handled"
        );
        Ok(handled)
    }

    /// Run one poll for `callback_id` and return the new items.
    ///
    /// The hook's `next_state` is committed only after it returned `Ok`.
    /// Two concurrent calls for the same id are not serialized here; the
    /// later commit wins. Hosts that poll on a timer should go through a
    /// scheduler that serializes per callback id.
    pub async fn poll(&self, callback_id: &str) -> Result<Vec<Map<String, Value>>> {
        let state = self.store.load(callback_id).await?;
        let req = PollRequest {
            callback_id: callback_id.to_string(),
            state,
        };

        let outcome = self.source.poll(&req).await?;

        let committed = outcome.next_state.is_some();
        if let Some(next) = outcome.next_state {
            self.store.commit(callback_id, next).await?;
        }

        tracing::debug!(
            source = %self.source.id(),
            callback_id,
            items = outcome.items.len(),
            committed,
            "poll completed"
        );
        Ok(outcome.items)
    }

    /// Drop the checkpoint for `callback_id` so the next poll starts fresh.
    pub async fn reset(&self, callback_id: &str) -> Result<()> {
        self.store.clear(callback_id).await
    }
}

impl std::fmt::Debug for EventBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBridge")
            .field("source", &self.source.id())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::event::{PollOutcome, PollState};
    use crate::registration::CallbackRegistration;
    use serde_json::json;

    fn counter_source() -> Arc<dyn EventSource> {
        Arc::new(
            CallbackRegistration::builder("counter")
                .handle(|_event| async { Ok(None) })
                .poll(|req: PollRequest| async move {
                    let n = req.state.get("n").and_then(Value::as_u64).unwrap_or(0);
                    let mut item = Map::new();
                    item.insert("n".to_string(), json!(n));
                    Ok(PollOutcome::new(
                        vec![item],
                        PollState::new().with("n", n + 1),
                    ))
                })
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn state_advances_between_polls() {
        let bridge = EventBridge::new(counter_source());
        let first = bridge.poll("cb").await.unwrap();
        let second = bridge.poll("cb").await.unwrap();
        assert_eq!(first[0]["n"], 0);
        assert_eq!(second[0]["n"], 1);

        // Other identities are independent.
        let other = bridge.poll("cb-2").await.unwrap();
        assert_eq!(other[0]["n"], 0);
    }

    #[tokio::test]
    async fn reset_restarts_from_default() {
        let bridge = EventBridge::new(counter_source());
        bridge.poll("cb").await.unwrap();
        bridge.reset("cb").await.unwrap();
        assert_eq!(bridge.poll("cb").await.unwrap()[0]["n"], 0);
    }

    #[tokio::test]
    async fn poll_on_push_only_source_is_configuration_error() {
        let source = CallbackRegistration::builder("push")
            .handle(|_event| async { Ok(None) })
            .build()
            .unwrap();
        let bridge = EventBridge::new(Arc::new(source));
        assert!(!bridge.supports_poll());
        let err = bridge.poll("cb").await.unwrap_err();
        assert!(matches!(err, BridgeError::PollUnsupported { .. }));
    }
}
