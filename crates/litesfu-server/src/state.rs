use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use crate::sfu::SessionManager;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";
const DEFAULT_STUN_SERVER: &str = "stun:stun.l.google.com:19302";

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: String,
    pub stun_servers: Vec<String>,
    /// Directory holding join.html and publish.html
    pub template_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        // A missing .env file is fine; the environment still applies
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }

        let bind_address = bind_address_from(
            std::env::var("BIND_ADDRESS").ok(),
            std::env::var("LISTENINGADDR").ok(),
        )?;

        let stun_servers = std::env::var("STUN_SERVERS")
            .map(|s| parse_list(&s))
            .unwrap_or_else(|_| vec![DEFAULT_STUN_SERVER.to_string()]);

        let template_dir = std::env::var("TEMPLATE_DIR")
            .unwrap_or_else(|_| "./template".to_string())
            .into();
        let static_dir = std::env::var("STATIC_DIR")
            .unwrap_or_else(|_| "./static".to_string())
            .into();

        Ok(Config {
            bind_address,
            stun_servers,
            template_dir,
            static_dir,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            stun_servers: vec![DEFAULT_STUN_SERVER.to_string()],
            template_dir: "./template".into(),
            static_dir: "./static".into(),
        }
    }
}

/// Resolve the listen address. `BIND_ADDRESS` wins; `LISTENINGADDR` is a bare port.
pub fn bind_address_from(
    bind_address: Option<String>,
    listening_port: Option<String>,
) -> anyhow::Result<String> {
    if let Some(address) = bind_address.filter(|s| !s.trim().is_empty()) {
        return Ok(address.trim().to_string());
    }

    match listening_port.filter(|s| !s.trim().is_empty()) {
        Some(port) => {
            let port: u16 = port
                .trim()
                .trim_start_matches(':')
                .parse()
                .with_context(|| format!("LISTENINGADDR must be a port number, got {port:?}"))?;
            Ok(format!("0.0.0.0:{port}"))
        }
        None => Ok(DEFAULT_BIND_ADDRESS.to_string()),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let sessions = Arc::new(SessionManager::new(&config.stun_servers)?);
        Ok(Self { config, sessions })
    }
}
