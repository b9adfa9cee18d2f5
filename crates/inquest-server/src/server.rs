//! Router assembly, TCP bind, and server lifecycle.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use inquest_llm::{Provider, RetryConfig};
use inquest_runtime::{Investigator, InvestigatorConfig, Orchestrator, ToolDispatcher};
use inquest_settings::InquestSettings;
use inquest_tools::ToolRegistry;

use crate::health::{self, HealthResponse};
use crate::investigate;
use crate::metrics;
use crate::shutdown::ShutdownCoordinator;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The investigation engine shared by every session.
    pub investigator: Arc<Investigator>,
    /// Admission control and cancellation for running investigations.
    pub orchestrator: Arc<Orchestrator>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Renders the `/metrics` endpoint.
    pub prometheus: PrometheusHandle,
    /// When the server started.
    pub start_time: Instant,
    /// Model used when a request does not name one.
    pub default_model: String,
    /// Per-session event backlog capacity.
    pub event_backlog: usize,
}

/// The Inquest HTTP server.
pub struct InquestServer {
    host: String,
    port: u16,
    state: AppState,
}

impl InquestServer {
    /// Assemble a server from settings plus the provider and tool registry
    /// the binary wired up.
    #[must_use]
    pub fn new(
        settings: &InquestSettings,
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
        prometheus: PrometheusHandle,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(
            Arc::new(registry),
            settings.engine.tool_concurrency,
            settings.engine.working_directory.clone(),
        );
        let config = InvestigatorConfig {
            max_steps: settings.engine.max_steps,
            tool_result_max_tokens: settings.context.tool_result_max_tokens,
            preserve_fraction: settings.context.preserve_fraction,
            max_output_tokens: settings.context.max_output_tokens,
            retry: RetryConfig {
                max_retries: settings.retry.max_retries,
                base_delay_ms: settings.retry.base_delay_ms,
                max_delay_ms: settings.retry.max_delay_ms,
                jitter_factor: settings.retry.jitter_factor,
            },
        };
        let state = AppState {
            investigator: Arc::new(Investigator::new(provider, dispatcher, config)),
            orchestrator: Arc::new(Orchestrator::new(settings.server.max_concurrent_sessions)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            prometheus,
            start_time: Instant::now(),
            default_model: settings.provider.default_model.clone(),
            event_backlog: settings.engine.event_backlog,
        };
        Self {
            host: settings.server.host.clone(),
            port: settings.server.port,
            state,
        }
    }

    /// Build the Axum router with all routes and layers.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Orchestrator, for the binary's shutdown path.
    #[must_use]
    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.state.orchestrator
    }

    /// Shutdown coordinator.
    #[must_use]
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.state.shutdown
    }

    /// Bind the listener and serve until the shutdown token fires.
    pub async fn start(self) -> std::io::Result<ServerHandle> {
        let listener = TcpListener::bind((self.host.as_str(), self.port)).await?;
        let port = listener.local_addr()?.port();
        let token = self.state.shutdown.token();
        let app = build_router(self.state);

        let server = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(err) = axum::serve(listener, app)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(error = %err, "server exited with error");
            }
        });

        info!(port, "inquest server listening");
        Ok(ServerHandle { port, server })
    }
}

/// Handle to a running server.
pub struct ServerHandle {
    /// Port actually bound (relevant when configured with port 0).
    pub port: u16,
    /// The serve task; completes after graceful shutdown.
    pub server: JoinHandle<()>,
}

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/investigate", post(investigate::investigate))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// GET /health
#[allow(clippy::unused_async)]
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let active = state.orchestrator.active_count();
    Json(health::health_check(state.start_time, active))
}

/// GET /metrics
#[allow(clippy::unused_async)]
async fn metrics_handler(State(state): State<AppState>) -> String {
    metrics::render(&state.prometheus)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
