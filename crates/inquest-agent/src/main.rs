//! # inquest-agent
//!
//! Inquest server binary. Loads settings, wires the provider and configured
//! toolsets into the engine, and serves HTTP until ctrl-c.

#![deny(unsafe_code)]

mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use inquest_llm::Provider;
use inquest_llm_openai::{OpenAiConfig, OpenAiProvider};
use inquest_server::{InquestServer, metrics};
use inquest_settings::{InquestSettings, load_settings_from_path, settings_path};
use inquest_tools::{ShellProcessRunner, ToolRegistry, build_registry};

/// Inquest investigation server.
#[derive(Parser, Debug)]
#[command(name = "inquest-agent", about = "Inquest investigation server")]
struct Cli {
    /// Path to the settings file (defaults to `~/.inquest/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Host to bind (overrides settings if specified).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Maximum concurrent investigations (overrides settings if specified).
    #[arg(long)]
    max_sessions: Option<usize>,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut InquestSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(max) = self.max_sessions {
            settings.server.max_concurrent_sessions = max;
        }
    }
}

/// Construct the LLM provider from settings and the configured API key env var.
fn build_provider(settings: &InquestSettings) -> Result<Arc<dyn Provider>> {
    let api_key = std::env::var(&settings.provider.api_key_env).with_context(|| {
        format!(
            "API key environment variable {} is not set",
            settings.provider.api_key_env
        )
    })?;
    let config = OpenAiConfig {
        model: settings.provider.default_model.clone(),
        api_key,
        base_url: settings.provider.base_url.clone(),
        timeout_secs: settings.provider.timeout_secs,
    };
    let provider = OpenAiProvider::new(config).context("failed to construct the LLM provider")?;
    Ok(Arc::new(provider))
}

/// Build the tool registry from configured toolsets, all backed by the real
/// shell runner.
fn build_tools(settings: &InquestSettings) -> ToolRegistry {
    let registry = build_registry(&settings.toolsets, Arc::new(ShellProcessRunner));
    tracing::info!(
        tool_count = registry.len(),
        tools = ?registry.names(),
        "tool registry created"
    );
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_file = args.settings.clone().unwrap_or_else(settings_path);
    let mut settings = load_settings_from_path(&settings_file)
        .with_context(|| format!("failed to load settings from {}", settings_file.display()))?;
    args.apply(&mut settings);

    logging::init(&settings.logging);
    tracing::info!(path = %settings_file.display(), "settings loaded");

    let prometheus = metrics::install_recorder();
    let provider = build_provider(&settings)?;
    let registry = build_tools(&settings);

    let server = InquestServer::new(&settings, provider, registry, prometheus);
    let orchestrator = Arc::clone(server.orchestrator());
    let coordinator = Arc::clone(server.shutdown());

    let handle = server.start().await.context("failed to bind server")?;
    tracing::info!(
        port = handle.port,
        model = settings.provider.default_model.as_str(),
        max_sessions = settings.server.max_concurrent_sessions,
        "inquest agent ready"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;

    tracing::info!("shutting down");
    orchestrator.shutdown();
    coordinator.graceful_shutdown(vec![handle.server], None).await;

    tracing::info!("shutdown complete");
    Ok(())
}
