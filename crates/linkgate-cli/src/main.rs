//! CLI entry point for linkgate.
//!
//! This binary provides the `linkgate` command: a small host that loads the
//! configured integrations into a registry and drives the authorization and
//! event-delivery contracts from the command line.

mod cli;
mod config;

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use linkgate_adapters::{ProviderSettings, register_all, verify_signature};
use linkgate_auth_engine::callback::returned_state;
use linkgate_auth_engine::{
    AuthorizationProvider, AuthorizationRequest, CallbackInput, CallbackServer, RefreshInput,
};
use linkgate_bridge::{EventBridge, InboundEvent, InstallContext, JsonFilePollStateStore};
use linkgate_kernel::{IntegrationRegistry, PollScheduler};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;

use crate::cli::{Cli, Commands};
use crate::config::LinkgateConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "info" });

    let host = Host::load(&cli.config)?;

    match cli.command {
        Commands::Providers => cmd_providers(&host),
        Commands::AuthUrl {
            provider,
            state,
            fields,
        } => cmd_auth_url(&host, &provider, state, fields),
        Commands::Authorize {
            provider,
            port,
            timeout,
            fields,
        } => cmd_authorize(&host, &provider, port, timeout, fields).await,
        Commands::Exchange {
            provider,
            callback_url,
            state,
            code_verifier,
            fields,
        } => cmd_exchange(&host, &provider, callback_url, state, code_verifier, fields).await,
        Commands::Refresh {
            provider,
            refresh_token,
            fields,
        } => cmd_refresh(&host, &provider, refresh_token, fields).await,
        Commands::Install {
            source,
            callback_url,
            callback_id,
        } => cmd_install(&host, &source, callback_url, callback_id).await,
        Commands::Handle {
            source,
            callback_id,
            event_id,
            payload,
            signature,
        } => cmd_handle(&host, &source, callback_id, event_id, &payload, signature).await,
        Commands::Poll {
            source,
            callback_id,
            every,
            once,
            reset,
        } => {
            let every = if once { None } else { host.poll_interval(&source, every) };
            cmd_poll(&host, &source, &callback_id, every, reset).await
        }
    }
}

// ---------------------------------------------------------------------------
// Host
// ---------------------------------------------------------------------------

/// Loaded configuration plus the registry built from it.
struct Host {
    config: LinkgateConfig,
    registry: IntegrationRegistry,
}

impl Host {
    fn load(path: &Path) -> Result<Self> {
        let mut config = LinkgateConfig::load(path)?;
        config.apply_process_env();

        let registry = IntegrationRegistry::new();
        let store = Arc::new(JsonFilePollStateStore::new(&config.state_file));
        register_all(&registry, &config.providers, &config.events, store)
            .context("failed to register configured integrations")?;

        info!(
            config = %path.display(),
            providers = config.providers.len(),
            events = config.events.len(),
            "configuration loaded"
        );

        Ok(Self { config, registry })
    }

    fn provider_settings(&self, id: &str) -> Result<&ProviderSettings> {
        self.config
            .providers
            .get(id)
            .with_context(|| format!("no provider `{id}` in configuration"))
    }

    fn bridge(&self, id: &str) -> Result<EventBridge> {
        Ok(self.registry.bridge(id)?)
    }

    /// Poll cadence in seconds: `--every`, else the source's configured
    /// `poll_interval_secs`.
    fn poll_interval(&self, source_id: &str, every: Option<u64>) -> Option<u64> {
        every.or_else(|| {
            self.config
                .events
                .get(source_id)
                .and_then(|settings| settings.poll_interval_secs)
        })
    }
}

// ---------------------------------------------------------------------------
// Subcommand: providers
// ---------------------------------------------------------------------------

fn cmd_providers(host: &Host) -> Result<()> {
    let integrations = host.registry.list();
    if integrations.is_empty() {
        println!("No integrations configured.");
        return Ok(());
    }

    println!(
        "{:<24} {:<6} {:<8} {:<8} {:<8} {:<6}",
        "ID", "AUTH", "REFRESH", "HOOKS", "INSTALL", "POLL"
    );
    for info in integrations {
        println!(
            "{:<24} {:<6} {:<8} {:<8} {:<8} {:<6}",
            info.id,
            yes_no(info.authorization),
            yes_no(info.refresh),
            yes_no(info.callbacks),
            yes_no(info.install),
            yes_no(info.poll),
        );
        if let Ok(provider) = host.registry.authorization(&info.id)
            && let Some(form) = provider.auth_form()
        {
            for field in &form.fields {
                let required = if field.is_required() { "required" } else { "optional" };
                println!("  --field {}=<value>  ({required})", field.key());
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommands: auth-url / authorize / exchange / refresh
// ---------------------------------------------------------------------------

fn cmd_auth_url(
    host: &Host,
    provider_id: &str,
    state: Option<String>,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let settings = host.provider_settings(provider_id)?;
    let provider = host.registry.authorization(provider_id)?;

    let state = state.unwrap_or_else(new_state);
    let out = provider.authorization_url(&AuthorizationRequest {
        fields: fields.into_iter().collect(),
        client_id: settings.client_id.clone(),
        client_secret: settings.client_secret.clone(),
        state: state.clone(),
        redirect_uri: settings.redirect_uri.clone(),
    })?;

    print_json(&serde_json::json!({
        "authorizationUrl": out.authorization_url,
        "codeVerifier": out.code_verifier,
        "state": state,
    }))
}

async fn cmd_authorize(
    host: &Host,
    provider_id: &str,
    port: Option<u16>,
    timeout: Option<u64>,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let settings = host.provider_settings(provider_id)?;
    let provider = host.registry.authorization(provider_id)?;
    let fields: HashMap<String, String> = fields.into_iter().collect();

    let state = new_state();
    let out = provider.authorization_url(&AuthorizationRequest {
        fields: fields.clone(),
        client_id: settings.client_id.clone(),
        client_secret: settings.client_secret.clone(),
        state: state.clone(),
        redirect_uri: settings.redirect_uri.clone(),
    })?;

    let port = match port.or(host.config.callback.port) {
        Some(port) => port,
        None => redirect_port(&settings.redirect_uri)?,
    };
    let timeout = timeout.unwrap_or(host.config.callback.timeout_secs);

    eprintln!("Open this URL in your browser to authorize `{provider_id}`:\n");
    eprintln!("  {}\n", out.authorization_url);

    let callback_url = CallbackServer::capture(port, &settings.redirect_uri, timeout).await?;
    check_state(&callback_url, &state)?;

    let tokens = provider
        .handle_callback(&CallbackInput {
            callback_url,
            state,
            code_verifier: out.code_verifier,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            fields,
        })
        .await?;

    info!(provider = %provider_id, "authorization complete");
    print_json(&tokens)
}

async fn cmd_exchange(
    host: &Host,
    provider_id: &str,
    callback_url: String,
    state: String,
    code_verifier: Option<String>,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let settings = host.provider_settings(provider_id)?;
    let provider = host.registry.authorization(provider_id)?;

    check_state(&callback_url, &state)?;

    let tokens = provider
        .handle_callback(&CallbackInput {
            callback_url,
            state,
            code_verifier,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri.clone(),
            fields: fields.into_iter().collect(),
        })
        .await?;
    print_json(&tokens)
}

async fn cmd_refresh(
    host: &Host,
    provider_id: &str,
    refresh_token: String,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let settings = host.provider_settings(provider_id)?;
    let provider = host.registry.authorization(provider_id)?;

    let tokens = provider
        .refresh_access_token(&RefreshInput {
            refresh_token,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            fields: fields.into_iter().collect(),
        })
        .await?;
    print_json(&tokens)
}

// ---------------------------------------------------------------------------
// Subcommands: install / handle / poll
// ---------------------------------------------------------------------------

async fn cmd_install(
    host: &Host,
    source_id: &str,
    callback_url: String,
    callback_id: String,
) -> Result<()> {
    let bridge = host.bridge(source_id)?;
    let meta = bridge
        .install(&InstallContext {
            callback_url,
            callback_id,
        })
        .await?;
    print_json(&meta)
}

async fn cmd_handle(
    host: &Host,
    source_id: &str,
    callback_id: String,
    event_id: Option<String>,
    payload_path: &Path,
    signature: Option<String>,
) -> Result<()> {
    let bridge = host.bridge(source_id)?;
    let body = read_payload(payload_path)?;

    if let Some(signature) = signature {
        let secret = host
            .config
            .events
            .get(source_id)
            .and_then(|s| s.secret.as_deref())
            .with_context(|| format!("`{source_id}` has no webhook secret to verify against"))?;
        if !verify_signature(secret, &body, &signature) {
            bail!("delivery signature does not match the webhook secret");
        }
    }

    let payload = serde_json::from_slice(&body).context("payload is not valid JSON")?;
    let handled = bridge
        .handle(&InboundEvent {
            callback_id,
            event_id: event_id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            payload,
        })
        .await?;

    match handled {
        Some(event) => print_json(&event),
        None => {
            eprintln!("Delivery is not actionable.");
            Ok(())
        }
    }
}

async fn cmd_poll(
    host: &Host,
    source_id: &str,
    callback_id: &str,
    every: Option<u64>,
    reset: bool,
) -> Result<()> {
    let bridge = host.bridge(source_id)?;
    if reset {
        bridge.reset(callback_id).await?;
    }

    let scheduler = PollScheduler::new();
    let Some(every) = every else {
        let items = scheduler.poll_now(&bridge, callback_id).await?;
        return print_json(&items);
    };

    let (tx, mut rx) = mpsc::channel(16);
    scheduler.schedule(bridge, callback_id, Duration::from_secs(every), tx)?;
    eprintln!("Polling `{source_id}` every {every}s. Press Ctrl-C to stop.");

    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(batch) => print_json(&batch)?,
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
        }
    }

    scheduler.shutdown().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Initialize the tracing subscriber with the given default log level.
fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "-" }
}

fn new_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// The redirect must carry back exactly the state that was issued.
fn check_state(callback_url: &str, expected: &str) -> Result<()> {
    match returned_state(callback_url) {
        Some(state) if state == expected => Ok(()),
        Some(_) => bail!("redirect state does not match the issued state"),
        None => bail!("redirect carries no state parameter"),
    }
}

fn redirect_port(redirect_uri: &str) -> Result<u16> {
    let url = Url::parse(redirect_uri)
        .with_context(|| format!("redirect_uri `{redirect_uri}` is not a URL"))?;
    url.port_or_known_default()
        .with_context(|| format!("redirect_uri `{redirect_uri}` has no port"))
}

fn read_payload(path: &Path) -> Result<Vec<u8>> {
    if path == Path::new("-") {
        let mut body = Vec::new();
        std::io::stdin()
            .read_to_end(&mut body)
            .context("failed to read payload from stdin")?;
        return Ok(body);
    }
    std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
