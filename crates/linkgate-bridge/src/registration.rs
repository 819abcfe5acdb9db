//! Closure-based callback registration.
//!
//! The builder refuses to build without a `handle` hook; `install` and
//! `poll` are optional.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::{BridgeError, Result};
use crate::event::{HandledEvent, InboundEvent, InstallContext, PollOutcome, PollRequest};
use crate::source::EventSource;

type InstallHook =
    Arc<dyn Fn(InstallContext) -> BoxFuture<'static, Result<Option<Value>>> + Send + Sync>;
type HandleHook =
    Arc<dyn Fn(InboundEvent) -> BoxFuture<'static, Result<Option<HandledEvent>>> + Send + Sync>;
type PollHook = Arc<dyn Fn(PollRequest) -> BoxFuture<'static, Result<PollOutcome>> + Send + Sync>;

/// An event source assembled from individual hooks.
#[derive(Clone)]
pub struct CallbackRegistration {
    id: String,
    install: Option<InstallHook>,
    handle: HandleHook,
    poll: Option<PollHook>,
}

impl CallbackRegistration {
    pub fn builder(id: impl Into<String>) -> CallbackRegistrationBuilder {
        CallbackRegistrationBuilder {
            id: id.into(),
            install: None,
            handle: None,
            poll: None,
        }
    }
}

impl std::fmt::Debug for CallbackRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistration")
            .field("id", &self.id)
            .field("install", &self.install.is_some())
            .field("poll", &self.poll.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`CallbackRegistration`].
pub struct CallbackRegistrationBuilder {
    id: String,
    install: Option<InstallHook>,
    handle: Option<HandleHook>,
    poll: Option<PollHook>,
}

impl CallbackRegistrationBuilder {
    pub fn install<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(InstallContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<Value>>> + Send + 'static,
    {
        self.install = Some(Arc::new(
            move |ctx| -> BoxFuture<'static, Result<Option<Value>>> { Box::pin(hook(ctx)) },
        ));
        self
    }

    pub fn handle<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(InboundEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<HandledEvent>>> + Send + 'static,
    {
        self.handle = Some(Arc::new(
            move |event| -> BoxFuture<'static, Result<Option<HandledEvent>>> {
                Box::pin(hook(event))
            },
        ));
        self
    }

    pub fn poll<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(PollRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PollOutcome>> + Send + 'static,
    {
        self.poll = Some(Arc::new(
            move |req| -> BoxFuture<'static, Result<PollOutcome>> { Box::pin(hook(req)) },
        ));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`BridgeError::MissingHook`] when `handle` was not supplied.
    pub fn build(self) -> Result<CallbackRegistration> {
        let handle = self
            .handle
            .ok_or(BridgeError::MissingHook { hook: "handle" })?;

        tracing::debug!(
            source = %self.id,
            install = self.install.is_some(),
            poll = self.poll.is_some(),
            "callback hooks registered"
        );

        Ok(CallbackRegistration {
            id: self.id,
            install: self.install,
            handle,
            poll: self.poll,
        })
    }
}

#[async_trait]
impl EventSource for CallbackRegistration {
    fn id(&self) -> &str {
        &self.id
    }

    fn supports_install(&self) -> bool {
        self.install.is_some()
    }

    async fn install(&self, ctx: &InstallContext) -> Result<Option<Value>> {
        match &self.install {
            Some(hook) => hook(ctx.clone()).await,
            None => Ok(None),
        }
    }

    async fn handle(&self, event: &InboundEvent) -> Result<Option<HandledEvent>> {
        (self.handle)(event.clone()).await
    }

    fn supports_poll(&self) -> bool {
        self.poll.is_some()
    }

    async fn poll(&self, req: &PollRequest) -> Result<PollOutcome> {
        match &self.poll {
            Some(hook) => hook(req.clone()).await,
            None => Err(BridgeError::PollUnsupported {
                source_id: self.id.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
