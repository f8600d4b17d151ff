//! HTTP server for the identification and translation proxies.
//!
//! # Security
//!
//! - Localhost only by default
//! - Optional API key on the proxy routes (`apikey` or `X-API-Key` header)
//! - Upstream credentials never leave the server
//!
//! # Usage
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8787"
//! swagger_ui = true
//! cors_origins = ["*"]
//! ```
//!
//! Generate an API key:
//! ```bash
//! herbgarden api-key generate
//! ```

mod auth;
mod handlers;
mod routes;
pub mod state;

pub use auth::{generate_api_key, hash_api_key};
pub use routes::create_router;
pub use state::ApiState;

use crate::config::ServerConfig;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Start the proxy server.
pub async fn serve(state: ApiState, config: &ServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = config
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", config.bind, e))?;

    let listener = TcpListener::bind(addr).await?;
    serve_on(listener, state, config).await
}

/// Serve on an already bound listener.
pub async fn serve_on(
    listener: TcpListener,
    state: ApiState,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    let router = create_router(state, config);

    info!("Starting proxy server on {}", addr);
    if config.swagger_ui {
        info!("Swagger UI available at http://{}/swagger-ui/", addr);
    }
    if config.api_key_hash.is_none() {
        info!("No API key configured, proxy routes are open");
    }

    axum::serve(listener, router).await.map_err(|e| {
        error!("Proxy server error: {}", e);
        anyhow::anyhow!("Proxy server error: {}", e)
    })
}
