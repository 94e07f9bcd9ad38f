use std::net::TcpListener;
use std::sync::Arc;

use anyhow::Context;
use chatlink_server::config::Config;
use chatlink_server::notifier::ChannelRegistry;
use chatlink_server::store::SledAccountStore;
use chatlink_server::State;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "chatlink_server=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(path = %config.db_path.display(), "opening account store");
    let store = SledAccountStore::open(&config.db_path)
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let registry = Arc::new(ChannelRegistry::new(config.event_capacity));
    let state = State::new(Arc::new(store), registry);

    let listener = TcpListener::bind(config.addr())?;
    chatlink_server::serve(listener, state).await
}
