//! `SyncServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{any, get};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use syncdoc_store::DocumentStore;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::health::{self, HealthResponse};
use crate::http;
use crate::metrics;
use crate::session::SyncHub;
use crate::shutdown::ShutdownCoordinator;
use crate::transport::{split_socket, TransportWriter};

/// Text sent to a WebSocket whose requested name is taken, just before close.
pub const NAME_IN_USE_REPLY: &str = "Name already in use";

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session hub and document store.
    pub hub: Arc<SyncHub>,
    /// Shutdown coordinator.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// When the server started.
    pub start_time: Instant,
    /// Prometheus handle for `/metrics`, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    /// Largest accepted WebSocket message.
    pub max_message_size: usize,
}

/// The shared-document server.
pub struct SyncServer {
    config: ServerConfig,
    hub: Arc<SyncHub>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl SyncServer {
    /// Create a server over `store`.
    pub fn new(config: ServerConfig, store: Arc<DocumentStore>) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let hub = Arc::new(SyncHub::new(
            store,
            config.session.clone(),
            Arc::clone(&shutdown),
        ));
        Self {
            config,
            hub,
            shutdown,
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: Arc::clone(&self.hub),
            shutdown: Arc::clone(&self.shutdown),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
            max_message_size: self.config.max_message_size,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .route("/ws", get(ws_handler))
            .route("/ws/{*name}", get(ws_named_handler))
            .route("/publish", any(http::missing_path))
            .route("/publish/{*path}", any(http::publish))
            .route("/notify", any(http::missing_path))
            .route("/notify/{*path}", any(http::notify))
            .route("/sharedobject", any(http::missing_path))
            .route("/sharedobject/{*path}", any(http::shared_object))
            .fallback(fallback_handler)
            .layer(DefaultBodyLimit::max(self.config.max_message_size))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serve task.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local_addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        info!(%local_addr, "syncdoc server listening");
        let handle = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(%error, "server terminated with error");
            }
        });
        Ok((local_addr, handle))
    }

    /// Session hub.
    pub fn hub(&self) -> &Arc<SyncHub> {
        &self.hub
    }

    /// Get the shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Get the server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.hub.registry().len(),
        state.hub.store().len(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => metrics::render(handle).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

/// GET /ws
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    upgrade(ws, state, None)
}

/// GET /ws/{name}
async fn ws_named_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    upgrade(ws, state, Some(name))
}

/// Unrouted requests. `/ws/` carries an empty name, which the wildcard
/// route never matches; it gets a generated name like `/ws`.
async fn fallback_handler(
    uri: Uri,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<AppState>,
) -> Response {
    match ws {
        Ok(ws) if uri.path() == "/ws/" => upgrade(ws, state, None),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

fn upgrade(ws: WebSocketUpgrade, state: AppState, name: Option<String>) -> Response {
    let limit = state.max_message_size;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_socket(socket, state, name))
}

async fn handle_socket(socket: WebSocket, state: AppState, name: Option<String>) {
    let (reader, mut writer) = split_socket(socket);
    match state.hub.open_session(name.as_deref()) {
        Ok(session) => state.hub.run_session(session, reader, writer).await,
        Err(err) => {
            warn!(error = %err, "rejecting websocket");
            if let Err(error) = writer.send_text(NAME_IN_USE_REPLY).await {
                warn!(%error, "failed to send rejection");
            }
            writer.close().await;
        }
    }
}
