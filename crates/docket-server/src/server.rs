use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::get;
use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use docket_core::settings::{DocketSettings, ServerSettings};
use docket_engine::PipelineOrchestrator;
use docket_telemetry::MetricsRecorder;

use crate::handlers;
use crate::rate_limit::{RateLimitConfig, RateLimitStore};

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
        }
    }
}

impl ServerConfig {
    pub fn from_settings(server: &ServerSettings) -> Self {
        Self {
            host: server.host.clone(),
            port: server.port,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub rate_limiter: Arc<RateLimitStore>,
    pub metrics: Arc<MetricsRecorder>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        orchestrator: PipelineOrchestrator,
        rate_limiter: RateLimitStore,
        metrics: Arc<MetricsRecorder>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            rate_limiter: Arc::new(rate_limiter),
            metrics,
            start_time: Instant::now(),
        }
    }

    /// Everything a running service needs, built from loaded settings.
    pub fn from_settings(settings: &DocketSettings, metrics: Arc<MetricsRecorder>) -> Self {
        let orchestrator = PipelineOrchestrator::from_settings(settings, metrics.clone());
        let rate_limiter = RateLimitStore::new(RateLimitConfig::from_settings(&settings.rate_limit))
            .with_metrics(metrics.clone());
        Self::new(orchestrator, rate_limiter, metrics)
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/pipeline",
            get(handlers::describe_pipeline).post(handlers::submit_pipeline),
        )
        .route("/api/demo", get(handlers::demo))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Bind, start serving and start the rate-limit sweeper.
pub async fn start(config: ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let shutdown = CancellationToken::new();
    let sweeper = state.rate_limiter.spawn_sweeper(shutdown.clone());
    let mode = state.orchestrator.mode();

    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    let addr = listener.local_addr()?;

    tracing::info!(%addr, mode = mode.as_str(), "docket server started");

    let signal = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, router)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        addr,
        shutdown,
        server,
        sweeper,
    })
}

/// Handle returned by `start()`. Owns the background tasks.
pub struct ServerHandle {
    pub addr: SocketAddr,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    sweeper: JoinHandle<()>,
}

impl ServerHandle {
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Stop accepting connections, drain in-flight requests and stop the sweeper.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.server.await;
        let _ = self.sweeper.await;
        tracing::info!("docket server stopped");
    }

    /// Wait until the server exits on its own or `signal` resolves.
    pub async fn run_until<F>(self, signal: F)
    where
        F: std::future::Future<Output = ()>,
    {
        let token = self.shutdown.clone();
        tokio::select! {
            _ = signal => {}
            _ = token.cancelled() => {}
        }
        self.shutdown().await;
    }
}
