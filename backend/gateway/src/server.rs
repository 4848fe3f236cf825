//! Main HTTP Gateway Server.
//!
//! Routes GraphQL requests, the schema SDL, GraphiQL and health checks.

use anyhow::Result;
use axum::{routing::get, Router};
use pagegraph_core::{DocumentSource, Schema};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

use crate::graphql_api;
use crate::health_api;
use crate::playground;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across routes.
#[derive(Clone)]
pub struct GatewayState {
    pub schema: Arc<Schema>,
    pub source: Arc<dyn DocumentSource>,
    /// Upper bound on one whole query, fetches included.
    pub request_timeout: Duration,
    pub pretty: bool,
    pub started_at: Instant,
}

impl GatewayState {
    pub fn new(source: Arc<dyn DocumentSource>) -> Self {
        Self {
            schema: Arc::new(Schema::build()),
            source,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            pretty: true,
            started_at: Instant::now(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }
}

pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(playground::graphiql))
        .route(
            "/graphql",
            get(graphql_api::graphql_get).post(graphql_api::graphql_post),
        )
        .route("/schema", get(graphql_api::schema_sdl))
        .route("/api/health", get(health_api::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Starts the main Axum HTTP server for the gateway.
#[instrument(skip(state))]
pub async fn start_server(addr: SocketAddr, state: GatewayState) -> Result<()> {
    let app = build_router(state);

    info!("Gateway HTTP server listening on {}", addr);
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
