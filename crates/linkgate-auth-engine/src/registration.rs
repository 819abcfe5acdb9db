//! Closure-based authorization registration.
//!
//! Hosts that assemble an integration from loose functions rather than a
//! type use [`AuthorizationRegistration::builder`]. The builder uses the
//! host-facing hook names and refuses to build without
//! `getAuthorizationUrl` and `handleCallback`, so a half-wired integration
//! fails at startup instead of on the first user.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::error::{AuthEngineError, Result};
use crate::form::FormDescriptor;
use crate::provider::AuthorizationProvider;
use crate::request::{AuthorizationRequest, AuthorizationUrl, CallbackInput, RefreshInput};
use crate::token::TokenSet;

type FormHook = Arc<dyn Fn() -> FormDescriptor + Send + Sync>;
type UrlHook = Arc<dyn Fn(&AuthorizationRequest) -> Result<AuthorizationUrl> + Send + Sync>;
type CallbackHook = Arc<dyn Fn(CallbackInput) -> BoxFuture<'static, Result<TokenSet>> + Send + Sync>;
type RefreshHook = Arc<dyn Fn(RefreshInput) -> BoxFuture<'static, Result<TokenSet>> + Send + Sync>;

/// An authorization provider assembled from individual hooks.
#[derive(Clone)]
pub struct AuthorizationRegistration {
    id: String,
    get_auth_form: Option<FormHook>,
    get_authorization_url: UrlHook,
    handle_callback: CallbackHook,
    refresh_access_token: Option<RefreshHook>,
}

impl AuthorizationRegistration {
    pub fn builder(id: impl Into<String>) -> AuthorizationRegistrationBuilder {
        AuthorizationRegistrationBuilder {
            id: id.into(),
            get_auth_form: None,
            get_authorization_url: None,
            handle_callback: None,
            refresh_access_token: None,
        }
    }
}

impl std::fmt::Debug for AuthorizationRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationRegistration")
            .field("id", &self.id)
            .field("getAuthForm", &self.get_auth_form.is_some())
            .field("refreshAccessToken", &self.refresh_access_token.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`AuthorizationRegistration`].
pub struct AuthorizationRegistrationBuilder {
    id: String,
    get_auth_form: Option<FormHook>,
    get_authorization_url: Option<UrlHook>,
    handle_callback: Option<CallbackHook>,
    refresh_access_token: Option<RefreshHook>,
}

impl AuthorizationRegistrationBuilder {
    pub fn get_auth_form<F>(mut self, hook: F) -> Self
    where
        F: Fn() -> FormDescriptor + Send + Sync + 'static,
    {
        self.get_auth_form = Some(Arc::new(hook));
        self
    }

    pub fn get_authorization_url<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AuthorizationRequest) -> Result<AuthorizationUrl> + Send + Sync + 'static,
    {
        self.get_authorization_url = Some(Arc::new(hook));
        self
    }

    pub fn handle_callback<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(CallbackInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TokenSet>> + Send + 'static,
    {
        self.handle_callback = Some(Arc::new(
            move |input| -> BoxFuture<'static, Result<TokenSet>> { Box::pin(hook(input)) },
        ));
        self
    }

    pub fn refresh_access_token<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(RefreshInput) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<TokenSet>> + Send + 'static,
    {
        self.refresh_access_token = Some(Arc::new(
            move |input| -> BoxFuture<'static, Result<TokenSet>> { Box::pin(hook(input)) },
        ));
        self
    }

    /// Validate and build.
    ///
    /// # Errors
    ///
    /// [`AuthEngineError::MissingHook`] when `getAuthorizationUrl` or
    /// `handleCallback` was not supplied.
    pub fn build(self) -> Result<AuthorizationRegistration> {
        let get_authorization_url = self.get_authorization_url.ok_or(AuthEngineError::MissingHook {
            hook: "getAuthorizationUrl",
        })?;
        let handle_callback = self.handle_callback.ok_or(AuthEngineError::MissingHook {
            hook: "handleCallback",
        })?;

        tracing::debug!(
            provider = %self.id,
            refresh = self.refresh_access_token.is_some(),
            "authorization hooks registered"
        );

        Ok(AuthorizationRegistration {
            id: self.id,
            get_auth_form: self.get_auth_form,
            get_authorization_url,
            handle_callback,
            refresh_access_token: self.refresh_access_token,
        })
    }
}

#[async_trait]
impl AuthorizationProvider for AuthorizationRegistration {
    fn id(&self) -> &str {
        &self.id
    }

    fn auth_form(&self) -> Option<FormDescriptor> {
        self.get_auth_form.as_ref().map(|hook| hook())
    }

    fn authorization_url(&self, req: &AuthorizationRequest) -> Result<AuthorizationUrl> {
        (self.get_authorization_url)(req)
    }

    async fn handle_callback(&self, input: &CallbackInput) -> Result<TokenSet> {
        (self.handle_callback)(input.clone()).await
    }

    fn supports_refresh(&self) -> bool {
        self.refresh_access_token.is_some()
    }

    async fn refresh_access_token(&self, input: &RefreshInput) -> Result<TokenSet> {
        match &self.refresh_access_token {
            Some(hook) => hook(input.clone()).await,
            None => Err(AuthEngineError::RefreshUnsupported {
                provider: self.id.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
