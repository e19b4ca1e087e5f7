//! `BusServer`: Axum HTTP + WebSocket front end for a [`StateBus`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::response::Json;
use axum::routing::get;
use statebus_core::SubscriptionRouter;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::bus::StateBus;
use crate::config::ServerConfig;
use crate::errors::ServerError;
use crate::health::{self, HealthResponse};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::handler::ws_handler;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// The bus every connection reads from and writes to.
    pub bus: Arc<StateBus>,
    /// Shutdown coordinator; connections hold child tokens.
    pub shutdown: Arc<ShutdownCoordinator>,
    /// Transport settings.
    pub config: Arc<ServerConfig>,
    /// When the server started.
    pub start_time: Instant,
}

/// The state bus server.
pub struct BusServer {
    config: Arc<ServerConfig>,
    bus: Arc<StateBus>,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl BusServer {
    /// Create a server around a fresh bus with the given subscribers.
    pub fn new(config: ServerConfig, subscribers: SubscriptionRouter) -> Self {
        Self {
            config: Arc::new(config),
            bus: Arc::new(StateBus::new(subscribers)),
            shutdown: Arc::new(ShutdownCoordinator::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router: `/health` plus the WebSocket endpoint.
    pub fn router(&self) -> Router {
        let state = AppState {
            bus: Arc::clone(&self.bus),
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::clone(&self.config),
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route(&self.config.ws_path, get(ws_handler))
            .with_state(state)
    }

    /// Bind the configured address and serve until shutdown.
    ///
    /// Returns the bound address (useful with port `0`) and the serving task.
    pub async fn listen(&self) -> Result<(SocketAddr, JoinHandle<()>), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let app = self.router();
        let token = self.shutdown.token();
        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "server terminated");
            }
        });

        info!(%local_addr, ws_path = %self.config.ws_path, "listening");
        Ok((local_addr, handle))
    }

    /// The bus, for in-process reads and writes.
    pub fn bus(&self) -> &Arc<StateBus> {
        &self.bus
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.bus.connection_count(),
        state.bus.entry_count(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_server() -> BusServer {
        BusServer::new(ServerConfig::default(), SubscriptionRouter::new())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.oneshot(req).await.unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or_default())
    }

    #[tokio::test]
    async fn health_reports_counters() {
        let server = make_server();
        let _ = server.bus().set_as("ui", "visible", &true).unwrap();

        let (status, body) = get_json(server.router(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["connections"], 0);
        assert_eq!(body["entries"], 1);
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn plain_get_on_ws_path_is_rejected() {
        let server = make_server();
        let (status, _) = get_json(server.router(), "/").await;
        assert!(status.is_client_error());
        assert_ne!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn custom_ws_path_replaces_root() {
        let config = ServerConfig {
            ws_path: "/bus".into(),
            ..ServerConfig::default()
        };
        let server = BusServer::new(config, SubscriptionRouter::new());

        let (root, _) = get_json(server.router(), "/").await;
        assert_eq!(root, StatusCode::NOT_FOUND);
        let (bus, _) = get_json(server.router(), "/bus").await;
        assert_ne!(bus, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let (status, _) = get_json(make_server().router(), "/nonexistent").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn listen_binds_ephemeral_port_and_stops_on_shutdown() {
        let server = make_server();
        let (addr, handle) = server.listen().await.unwrap();
        assert_ne!(addr.port(), 0);

        server.shutdown().shutdown();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn listen_on_taken_port_is_bind_error() {
        let holder = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = holder.local_addr().unwrap().port();
        let config = ServerConfig {
            port,
            ..ServerConfig::default()
        };
        let server = BusServer::new(config, SubscriptionRouter::new());
        let err = server.listen().await.unwrap_err();
        assert!(matches!(err, ServerError::Bind { .. }));
    }
}
