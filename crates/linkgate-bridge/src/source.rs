//! The event source contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::event::{HandledEvent, InboundEvent, InstallContext, PollOutcome, PollRequest};

/// Trait that every callback-capable integration implements.
///
/// Only [`handle`](EventSource::handle) is required. Sources that need the
/// provider to be told where to deliver pushes implement
/// [`install`](EventSource::install); sources without push support implement
/// [`poll`](EventSource::poll) instead.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Identifier of this event source (e.g. `"github"`).
    fn id(&self) -> &str;

    fn supports_install(&self) -> bool {
        false
    }

    /// Configure the provider to deliver pushes to `ctx.callback_url`.
    ///
    /// Returns provider-assigned metadata (such as a webhook id), or `None`
    /// when there is nothing to record.
    async fn install(&self, ctx: &InstallContext) -> Result<Option<Value>> {
        let _ = ctx;
        Ok(None)
    }

    /// Turn one inbound push into a result, or `None` when the push is not
    /// actionable.
    async fn handle(&self, event: &InboundEvent) -> Result<Option<HandledEvent>>;

    fn supports_poll(&self) -> bool {
        false
    }

    /// Fetch items that appeared since `req.state`.
    async fn poll(&self, req: &PollRequest) -> Result<PollOutcome> {
        let _ = req;
        Err(BridgeError::PollUnsupported {
            source_id: self.id().to_string(),
        })
    }
}
