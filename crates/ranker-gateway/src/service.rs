//! Gateway service: wiring and server lifecycle.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use thiserror::Error;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::config::{ConfigError, GatewayConfig};
use crate::coordinator::Coordinator;
use crate::rooms::RoomRegistry;
use crate::{http, ws};

/// Shared handles threaded through every request handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub verifier: Arc<TokenVerifier>,
    pub config: Arc<GatewayConfig>,
}

/// Service-level errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("server bind error: {0}")]
    Bind(std::io::Error),

    #[error("server error: {0}")]
    Serve(std::io::Error),
}

/// Triggers graceful shutdown of a running [`GatewayService`] from another
/// task.
pub struct ShutdownHandle(Option<oneshot::Sender<()>>);

impl ShutdownHandle {
    pub fn trigger(mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

/// The gateway server: HTTP boundary plus the WebSocket room service.
pub struct GatewayService {
    config: GatewayConfig,
    state: AppState,
    shutdown_tx: Option<oneshot::Sender<()>>,
    shutdown_rx: Option<oneshot::Receiver<()>>,
}

impl GatewayService {
    pub fn new(config: GatewayConfig) -> Result<Self, ServiceError> {
        config.validate()?;

        let rooms = Arc::new(RoomRegistry::new(config.rooms.channel_capacity));
        let coordinator = Arc::new(Coordinator::new(rooms, config.polls.clone()));
        let verifier = Arc::new(TokenVerifier::new(
            config.auth.jwt_secret.as_bytes(),
            config.auth.token_ttl(),
        ));

        let state = AppState {
            coordinator,
            verifier,
            config: Arc::new(config.clone()),
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        Ok(Self {
            config,
            state,
            shutdown_tx: Some(shutdown_tx),
            shutdown_rx: Some(shutdown_rx),
        })
    }

    /// Detach the shutdown trigger so another task can stop the server.
    pub fn shutdown_handle(&mut self) -> ShutdownHandle {
        ShutdownHandle(self.shutdown_tx.take())
    }

    /// Coordinator handle, mainly for tests and embedding.
    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.state.coordinator)
    }

    /// Build the full router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/polls", post(http::create_poll))
            .route("/polls/join", post(http::join_poll))
            .route("/polls/rejoin", post(http::rejoin_poll))
            .route("/ws", get(ws::ws_handler))
            .route("/health", get(http::health))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Bind and serve until shutdown is requested.
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        let shutdown_rx = self.shutdown_rx.take();

        let housekeeping = self.state.coordinator.spawn_housekeeping();

        let addr = self.config.bind_addr();
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(ServiceError::Bind)?;
        info!(addr = %addr, "Gateway listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                match shutdown_rx {
                    Some(rx) => {
                        let _ = rx.await;
                    }
                    None => std::future::pending().await,
                }
            })
            .await
            .map_err(ServiceError::Serve)?;

        housekeeping.abort();
        info!("Gateway stopped");
        Ok(())
    }
}
