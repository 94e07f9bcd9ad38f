use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{ensure, Context};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_EVENT_CAPACITY: usize = 16;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    /// Buffered events per live channel before slow listeners start lagging.
    pub event_capacity: usize,
}

impl Config {
    /// First positional argument is the port, as is `CHATLINK_PORT`.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_sources(env::args().skip(1), |key| env::var(key).ok())
    }

    pub fn from_sources(
        args: impl IntoIterator<Item = String>,
        var: impl Fn(&str) -> Option<String>,
    ) -> anyhow::Result<Self> {
        let port = match args.into_iter().next().or_else(|| var("CHATLINK_PORT")) {
            Some(port) => port
                .parse()
                .with_context(|| format!("invalid port {port:?}"))?,
            None => DEFAULT_PORT,
        };
        let db_path = var("CHATLINK_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(String::from("sled") + &port.to_string()));
        let event_capacity = match var("CHATLINK_EVENT_CAPACITY") {
            Some(capacity) => {
                let capacity: usize = capacity
                    .parse()
                    .with_context(|| format!("invalid CHATLINK_EVENT_CAPACITY {capacity:?}"))?;
                ensure!(capacity > 0, "CHATLINK_EVENT_CAPACITY must be positive");
                capacity
            }
            None => DEFAULT_EVENT_CAPACITY,
        };
        Ok(Self { port, db_path, event_capacity })
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], self.port))
    }
}
