//! # Ranker Server Runtime
//!
//! Entry point for the Ranker polling server.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG` controls the filter)
//! 2. Load configuration defaults and apply environment overrides
//! 3. Validate configuration
//! 4. Start the gateway (HTTP boundary + WebSocket rooms + housekeeping)
//! 5. Serve until Ctrl+C, then shut down gracefully

use anyhow::{Context, Result};
use ranker_gateway::{GatewayConfig, GatewayService};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Load configuration from defaults and environment.
fn load_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();

    if let Ok(secret) = std::env::var("RANKER_JWT_SECRET") {
        config.auth.jwt_secret = secret;
    } else {
        warn!("RANKER_JWT_SECRET not set; using development secret");
    }

    if let Ok(port) = std::env::var("RANKER_HTTP_PORT") {
        match port.parse() {
            Ok(p) => config.http.port = p,
            Err(_) => warn!("RANKER_HTTP_PORT is not a valid port, keeping default"),
        }
    }

    if let Ok(ttl) = std::env::var("RANKER_TOKEN_TTL_SECS") {
        if let Ok(secs) = ttl.parse() {
            config.auth.token_ttl_secs = secs;
        }
    }

    if let Ok(idle) = std::env::var("RANKER_POLL_IDLE_TIMEOUT_SECS") {
        if let Ok(secs) = idle.parse() {
            config.polls.idle_timeout_secs = secs;
        }
    }

    config
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = load_config();
    let addr = config.bind_addr();

    let mut service = GatewayService::new(config).context("failed to build gateway service")?;
    let shutdown = service.shutdown_handle();

    info!("===================================");
    info!("  Ranker Server v{}", env!("CARGO_PKG_VERSION"));
    info!("  Listening on {addr}");
    info!("===================================");

    let mut server = tokio::spawn(async move { service.start().await });

    tokio::select! {
        result = &mut server => {
            result.context("server task failed")?.context("gateway server failed")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C received, shutting down");
            shutdown.trigger();
            server
                .await
                .context("server task failed")?
                .context("gateway server failed")?;
        }
    }

    info!("Shutdown complete");
    Ok(())
}
