//! Server-rendered dashboard: axum router, handlers and askama pages.

pub mod handlers;
pub mod router;
pub mod state;
pub mod templates;

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tracing::info;

use crate::error::DashError;

pub use router::create_router;
pub use state::AppState;

/// Binds `addr` and serves until Ctrl+C.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), DashError> {
    let app = create_router(state);
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| DashError::Server(format!("failed to bind {addr}: {err}")))?;

    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| DashError::Server(err.to_string()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    info!("Shutting down gracefully...");
}
