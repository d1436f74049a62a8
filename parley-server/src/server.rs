use crate::relay::{RelayConfig, RelayService, ws_handler};
use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use std::future::Future;
use tokio::net::TcpListener;
use tracing::info;

pub fn router(relay: RelayService) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(relay)
}

/// Bind the configured address and relay until `shutdown` resolves.
pub async fn serve<F>(config: RelayConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.listen_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind relay to {}", addr))?;

    serve_on(listener, RelayService::new(config), shutdown).await
}

pub async fn serve_on<F>(listener: TcpListener, relay: RelayService, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    match relay.config().max_peers {
        Some(limit) => info!(
            "Signalling server started on {} (at most {} clients)",
            addr, limit
        ),
        None => info!("Signalling server started on {} (unbounded)", addr),
    }

    axum::serve(listener, router(relay))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Relay server failed")?;

    info!("Signalling server stopped");
    Ok(())
}
