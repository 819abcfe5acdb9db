//! CLI argument definitions for linkgate.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

/// linkgate -- OAuth authorization and event delivery for integrations.
#[derive(Parser)]
#[command(
    name = "linkgate",
    version,
    about = "linkgate -- authorize integrations and drive their event sources",
    long_about = "A development host for linkgate integrations: builds authorization URLs, \
                  completes OAuth code exchanges, refreshes tokens, installs webhooks, \
                  handles deliveries, and polls event sources."
)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(long, short, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered integrations and what they support.
    Providers,

    /// Print an authorization URL (and PKCE verifier) without listening.
    AuthUrl {
        /// Provider id from the configuration.
        provider: String,

        /// State to embed; a fresh one is generated when omitted.
        #[arg(long)]
        state: Option<String>,

        /// Form value required by the provider, as `key=value`.
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Run the full authorization flow through a loopback listener.
    Authorize {
        /// Provider id from the configuration.
        provider: String,

        /// Listener port; defaults to the redirect URI's port.
        #[arg(long)]
        port: Option<u16>,

        /// Seconds to wait for the redirect.
        #[arg(long)]
        timeout: Option<u64>,

        /// Form value required by the provider, as `key=value`.
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Exchange a captured redirect URL for tokens.
    Exchange {
        /// Provider id from the configuration.
        provider: String,

        /// The full redirect URL, including its query string.
        #[arg(long)]
        callback_url: String,

        /// State issued with the authorization URL.
        #[arg(long)]
        state: String,

        /// PKCE verifier returned by `auth-url`.
        #[arg(long)]
        code_verifier: Option<String>,

        /// Form value required by the provider, as `key=value`.
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Renew an access token.
    Refresh {
        /// Provider id from the configuration.
        provider: String,

        #[arg(long)]
        refresh_token: String,

        /// Form value required by the provider, as `key=value`.
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Register the callback URL with an event source.
    Install {
        /// Event source id from the configuration.
        source: String,

        #[arg(long)]
        callback_url: String,

        #[arg(long)]
        callback_id: String,
    },

    /// Handle one delivery read from a file or stdin.
    Handle {
        /// Event source id from the configuration.
        source: String,

        #[arg(long)]
        callback_id: String,

        /// Delivery id; a fresh one is generated when omitted.
        #[arg(long)]
        event_id: Option<String>,

        /// File containing the JSON payload, or `-` for stdin.
        #[arg(long, default_value = "-")]
        payload: PathBuf,

        /// `X-Hub-Signature-256` header to verify against the webhook secret.
        #[arg(long)]
        signature: Option<String>,
    },

    /// Poll an event source once, or on a fixed cadence.
    Poll {
        /// Event source id from the configuration.
        source: String,

        #[arg(long)]
        callback_id: String,

        /// Keep polling every N seconds until interrupted. Defaults to the
        /// source's `poll_interval_secs`.
        #[arg(long, conflicts_with = "once")]
        every: Option<u64>,

        /// Poll a single time even when the source has an interval configured.
        #[arg(long)]
        once: bool,

        /// Forget committed state before polling.
        #[arg(long)]
        reset: bool,
    },
}

/// Parse a `key=value` argument.
fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected key=value, got `{raw}`")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
