//! Concrete linkgate integrations.
//!
//! Authorization providers (implement
//! [`AuthorizationProvider`](linkgate_auth_engine::AuthorizationProvider)):
//!
//! - [`StandardProvider`] -- configuration-driven OAuth 2.0, with presets.
//! - [`AtlassianProvider`] -- JSON token requests, rotating refresh tokens,
//!   post-exchange site discovery.
//! - [`ZendeskProvider`] -- per-tenant endpoints from a form field.
//!
//! Event sources (implement [`EventSource`](linkgate_bridge::EventSource)):
//!
//! - [`GitHubWebhookSource`] -- push delivery through repository webhooks.
//! - [`GitHubIssuePoller`] -- pull delivery by polling repository issues.
//!
//! [`settings`] builds any of them from declarative configuration.

pub mod atlassian;
pub mod error;
pub mod github;
pub mod github_poll;
pub mod github_webhook;
pub mod settings;
pub mod standard;
pub mod zendesk;

pub use atlassian::AtlassianProvider;
pub use error::{AdapterError, Result};
pub use github::{GitHubRepo, verify_signature};
pub use github_poll::GitHubIssuePoller;
pub use github_webhook::GitHubWebhookSource;
pub use settings::{EventKind, EventSettings, ProviderKind, ProviderSettings, register_all};
pub use standard::StandardProvider;
pub use zendesk::ZendeskProvider;
