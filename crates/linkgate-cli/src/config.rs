//! Host configuration.
//!
//! Loaded from `config/default.toml` (or `--config`), then overlaid with
//! environment variables so secrets can stay out of the file:
//!
//! | variable                          | overrides                         |
//! |-----------------------------------|-----------------------------------|
//! | `LINKGATE_<ID>_CLIENT_ID`         | `providers.<id>.client_id`        |
//! | `LINKGATE_<ID>_CLIENT_SECRET`     | `providers.<id>.client_secret`    |
//! | `LINKGATE_<ID>_TOKEN`             | `events.<id>.token`               |
//! | `LINKGATE_<ID>_WEBHOOK_SECRET`    | `events.<id>.secret`              |
//!
//! `<ID>` is the table id uppercased with `-` replaced by `_`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use linkgate_adapters::{EventSettings, ProviderSettings};
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LinkgateConfig {
    /// JSON file holding committed poll state, keyed by callback id.
    pub state_file: PathBuf,
    pub callback: CallbackSettings,
    pub providers: BTreeMap<String, ProviderSettings>,
    pub events: BTreeMap<String, EventSettings>,
}

impl Default for LinkgateConfig {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(".linkgate/poll-state.json"),
            callback: CallbackSettings::default(),
            providers: BTreeMap::new(),
            events: BTreeMap::new(),
        }
    }
}

/// Loopback listener used by `linkgate authorize`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CallbackSettings {
    /// Port to listen on; defaults to the `redirect_uri` port.
    pub port: Option<u16>,
    pub timeout_secs: u64,
}

impl Default for CallbackSettings {
    fn default() -> Self {
        Self {
            port: None,
            timeout_secs: 300,
        }
    }
}

impl LinkgateConfig {
    /// Read and parse `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };
        Self::parse(&content).with_context(|| format!("invalid config in {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |id: &str, suffix: &str| lookup(&env_key(id, suffix)).filter(|v| !v.is_empty());

        for (id, provider) in &mut self.providers {
            if let Some(value) = var(id, "CLIENT_ID") {
                provider.client_id = value;
            }
            if let Some(value) = var(id, "CLIENT_SECRET") {
                provider.client_secret = value;
            }
        }
        for (id, source) in &mut self.events {
            if let Some(value) = var(id, "TOKEN") {
                source.token = value;
            }
            if let Some(value) = var(id, "WEBHOOK_SECRET") {
                source.secret = Some(value);
            }
        }
    }

    pub fn apply_process_env(&mut self) {
        self.apply_env(|key| std::env::var(key).ok());
    }
}

/// `LINKGATE_<ID>_<SUFFIX>` for a table id.
pub fn env_key(id: &str, suffix: &str) -> String {
    let id: String = id
        .chars()
        .map(|c| match c {
            '-' | '.' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("LINKGATE_{id}_{suffix}")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
