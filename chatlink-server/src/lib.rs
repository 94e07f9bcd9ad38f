pub mod api;
pub mod config;
pub mod coordinator;
pub mod notifier;
pub mod store;
#[cfg(test)]
mod testing;

use std::net::TcpListener;

pub use api::{router, AppError, Result, State};

/// Serves the HTTP API on an already-bound listener until the server fails.
pub async fn serve(listener: TcpListener, state: State) -> anyhow::Result<()> {
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::Server::from_tcp(listener)?
        .serve(router(state).into_make_service())
        .await?;
    Ok(())
}
