//! Companion web-view diagnostics, entry point.
//!
//! Loads the settings file, resolves the active endpoint for a given network
//! signal and prints what a session would load.  It can also parse a
//! URL-scheme command or push one external-bus message through a session
//! backed by recording collaborators.
//!
//! # Usage
//!
//! ```text
//! companion-webview [OPTIONS]
//!
//! Options:
//!   --config <PATH>             Settings file [default: companion.toml]
//!   --ssid <SSID>               Current Wi-Fi SSID
//!   --hardware-address <MAC>    Current network hardware address
//!   --override <KIND>           internal | external | remote_relay
//!   --parse-url <URL>           Parse a URL-scheme command and print it
//!   --bus <JSON>                Dispatch one external-bus message
//!   --pretty                    Pretty-print JSON output
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable             | Default          | Description          |
//! |----------------------|------------------|----------------------|
//! | `COMPANION_CONFIG`   | `companion.toml` | Settings file path   |
//! | `COMPANION_SSID`     | (none)           | Current Wi-Fi SSID   |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use companion_core::{resolve, resolver, EndpointKind, MessageKind, NetworkSignal};
use companion_webview::application::handlers::config_get;
use companion_webview::application::{SessionCollaborators, SessionController, UrlCommand};
use companion_webview::infrastructure::mock::{FixedTrustEvaluator, MockContentRuntime, RecordingUi, StaticTokenProvider};
use companion_webview::infrastructure::{load_settings, spawn_session, SettingsFile};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Companion web-view diagnostics.
#[derive(Debug, Parser)]
#[command(name = "companion-webview", about = "Endpoint resolution and bridge diagnostics for the companion web view", version)]
struct Cli {
    /// Path to the TOML settings file.  A missing file means defaults.
    #[arg(long, default_value = "companion.toml", env = "COMPANION_CONFIG")]
    config: PathBuf,

    /// Wi-Fi SSID the device is connected to.
    #[arg(long, env = "COMPANION_SSID")]
    ssid: Option<String>,

    /// Hardware address of the current network.
    #[arg(long)]
    hardware_address: Option<String>,

    /// Force an endpoint instead of the automatic choice.
    #[arg(long = "override")]
    override_kind: Option<String>,

    /// Parse a URL-scheme command (e.g. `homeassistant://call_service/light.turn_on`).
    #[arg(long)]
    parse_url: Option<Url>,

    /// Dispatch one external-bus message through a session.
    #[arg(long)]
    bus: Option<String>,

    /// Pretty-print JSON output.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

impl Cli {
    fn signal(&self) -> NetworkSignal {
        NetworkSignal::new(self.ssid.clone(), self.hardware_address.clone())
    }

    /// Loads the settings file and applies `--override`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if the
    /// override names no endpoint kind.
    fn into_settings(&self) -> anyhow::Result<SettingsFile> {
        let mut settings = load_settings(&self.config)
            .with_context(|| format!("failed to load settings from '{}'", self.config.display()))?;
        if let Some(name) = self.override_kind.as_deref() {
            let kind = EndpointKind::BASES
                .into_iter()
                .find(|k| k.as_str() == name)
                .with_context(|| format!("'{}' is not an overridable endpoint kind", name))?;
            settings.connection.override_kind = Some(kind);
        }
        Ok(settings)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let output = if let Some(url) = cli.parse_url.as_ref() {
        let command = UrlCommand::parse(url).with_context(|| format!("cannot parse '{}'", url))?;
        serde_json::to_value(&command)?
    } else {
        let settings = cli.into_settings()?;
        match cli.bus.as_deref() {
            Some(raw) => dispatch_once(&cli, settings, raw).await?,
            None => describe_resolution(&cli, &settings)?,
        }
    };

    let text = if cli.pretty { serde_json::to_string_pretty(&output)? } else { output.to_string() };
    println!("{}", text);
    Ok(())
}

fn describe_resolution(cli: &Cli, settings: &SettingsFile) -> anyhow::Result<Value> {
    let Some(resolved) = resolve(&settings.connection, &cli.signal()) else {
        bail!("no endpoint configured in '{}'", cli.config.display());
    };
    info!("active endpoint: {} ({})", resolved.active_kind, resolved.active_url);

    let mut value = serde_json::to_value(&resolved)?;
    value["webview_url"] = json!(resolver::webview_url(&resolved, false).as_str());
    value["on_internal_network"] = json!(resolver::is_on_internal_network(&settings.connection, &cli.signal()));
    Ok(value)
}

/// Runs a session against recording collaborators, posts `raw` on the
/// external bus and reports what the page received.
async fn dispatch_once(cli: &Cli, settings: SettingsFile, raw: &str) -> anyhow::Result<Value> {
    let message: Value = serde_json::from_str(raw).context("--bus is not valid JSON")?;

    let runtime = Arc::new(MockContentRuntime::new());
    let ui = Arc::new(RecordingUi::new());
    let session_config = settings.to_session_config();
    let collaborators = SessionCollaborators {
        runtime: runtime.clone(),
        signals: Arc::new(cli.signal()),
        trust: Arc::new(FixedTrustEvaluator::default()),
        tokens: Arc::new(StaticTokenProvider::without_token()),
        ui: ui.clone(),
    };
    let capabilities = session_config.capabilities.clone();
    let (mut controller, outbox) =
        SessionController::new(settings.connection.clone(), session_config, collaborators, settings.restored_url());
    controller.register_handler(MessageKind::ConfigGet, config_get(capabilities));

    let (handle, join) = spawn_session(controller, outbox);
    handle.appear();
    handle.script_message(companion_webview::domain::ScriptMessage::ExternalBus(message));
    handle.teardown();
    let summary = join.await.context("session task failed")?;

    Ok(json!({
        "session": handle.session_id().to_string(),
        "state": summary.state.to_string(),
        "loads": runtime.loads().iter().map(Url::as_str).collect::<Vec<_>>(),
        "bus": runtime.bus_messages(),
        "notices": ui.notices().iter().map(|n| format!("{:?}", n)).collect::<Vec<_>>(),
    }))
}
