//! Credential lifecycle for linkgate integrations.
//!
//! This crate drives the OAuth 2.0 Authorization Code flow with PKCE
//! (RFC 7636) on behalf of downstream services:
//!
//! - **[`pkce`]** -- verifier/challenge generation (`S256` only).
//! - **[`oauth`]** -- [`OAuthClient`], the shared authorization URL, code
//!   exchange, and refresh machinery, configurable for provider quirks.
//! - **[`provider`]** -- the [`AuthorizationProvider`] contract the host
//!   drives: authorization form, authorization URL, callback, refresh.
//! - **[`registration`]** -- the same contract assembled from closures, with
//!   fail-fast validation of the required hooks.
//! - **[`callback`]** -- redirect parsing and a loopback redirect listener.
//! - **[`token`]** / **[`form`]** / **[`request`]** -- the data model.
//!
//! Nothing here persists tokens or verifiers; the host owns that state and
//! passes it back in on the next call.
//!
//! # Architecture
//!
//! ```text
//! host ── AuthorizationProvider ──┬── OAuthClient ── PkcePair
//!                                 └── provider-specific discovery
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use linkgate_auth_engine::{AuthorizationRequest, OAuthClient, OAuthEndpoints};
//!
//! # fn example() -> linkgate_auth_engine::error::Result<()> {
//! let client = OAuthClient::new(
//!     "example",
//!     OAuthEndpoints::new(
//!         "https://auth.example.com/authorize",
//!         "https://auth.example.com/token",
//!     ),
//! )
//! .with_scopes(["read"]);
//!
//! let out = client.authorization_url(&AuthorizationRequest {
//!     client_id: "my-app".to_string(),
//!     state: "abc123".to_string(),
//!     redirect_uri: "https://host/cb".to_string(),
//!     ..Default::default()
//! })?;
//! println!("visit {}", out.authorization_url);
//! # Ok(())
//! # }
//! ```

pub mod callback;
pub mod error;
pub mod form;
pub mod oauth;
pub mod pkce;
pub mod provider;
pub mod registration;
pub mod request;
pub mod token;

// Re-export key types at the crate root for convenience.
pub use callback::{CallbackServer, extract_authorization_code};
pub use error::{AuthEngineError, ErrorKind, Result};
pub use form::{FormDescriptor, FormField, SelectOption};
pub use oauth::{ClientAuth, OAuthClient, OAuthEndpoints, TokenRequestFormat};
pub use pkce::{PKCE_METHOD, PkcePair};
pub use provider::AuthorizationProvider;
pub use registration::{AuthorizationRegistration, AuthorizationRegistrationBuilder};
pub use request::{AuthorizationRequest, AuthorizationUrl, CallbackInput, RefreshInput};
pub use token::TokenSet;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn re_exports_available() {
        let _: fn() -> OAuthEndpoints = || OAuthEndpoints::new(String::new(), String::new());
        let _: fn() -> TokenSet = || TokenSet::new("t");
    }

    #[test]
    fn providers_are_object_safe() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn AuthorizationProvider>();
        assert_send_sync::<AuthorizationRegistration>();
    }
}
