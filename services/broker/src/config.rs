use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_PANEL_TIMEOUT: Duration = Duration::from_millis(10_000);
const MIN_PANEL_TIMEOUT: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    /// Directory holding `servers.json` and `loads.json`.
    pub data_dir: PathBuf,
    /// Deadline for a single panel request, and for one node's load query.
    pub panel_timeout: Duration,
    pub brand: String,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = match var("HYPERBRIDGE_LISTEN_ADDR") {
            Some(addr) => addr
                .parse()
                .with_context(|| format!("invalid HYPERBRIDGE_LISTEN_ADDR: {addr}"))?,
            None => {
                let port = match var("PORT") {
                    Some(port) => port
                        .parse::<u16>()
                        .with_context(|| format!("invalid PORT: {port}"))?,
                    None => DEFAULT_PORT,
                };
                SocketAddr::from(([0, 0, 0, 0], port))
            }
        };

        let data_dir = var("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data"));

        let panel_timeout = match var("HYPERBRIDGE_PANEL_TIMEOUT_MS") {
            Some(ms) => Duration::from_millis(
                ms.parse()
                    .with_context(|| format!("invalid HYPERBRIDGE_PANEL_TIMEOUT_MS: {ms}"))?,
            )
            .max(MIN_PANEL_TIMEOUT),
            None => DEFAULT_PANEL_TIMEOUT,
        };

        let brand = var("HYPERBRIDGE_BRAND")
            .filter(|b| !b.trim().is_empty())
            .unwrap_or_else(|| "HyperVPN".to_string());

        let log_level = var("HYPERBRIDGE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            listen_addr,
            data_dir,
            panel_timeout,
            brand,
            log_level,
        })
    }

    pub fn servers_path(&self) -> PathBuf {
        self.data_dir.join("servers.json")
    }

    pub fn loads_path(&self) -> PathBuf {
        self.data_dir.join("loads.json")
    }
}
