use anyhow::{Context, Result};
use std::collections::HashMap;
use std::env;

pub const ENV_HOST: &str = "ROUTE_DRAWING_HOST";
pub const ENV_PORT: &str = "ROUTE_DRAWING_PORT";
pub const ENV_SUPPORT_DIR: &str = "ROUTE_DRAWING_SUPPORT_DIR";
pub const ENV_LOG_DIR: &str = "ROUTE_DRAWING_LOG_DIR";
pub const ENV_SERVER_URL: &str = "ROUTE_DRAWING_SERVER_URL";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DrawingConfig {
    /// Where the drawing server listens.
    pub host: String,
    pub port: u16,
    /// Directory holding `drawings.db`.
    pub support_dir: String,
    pub log_dir: String,
    /// Server the client side talks to.
    pub server_url: String,
}

impl Default for DrawingConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3000,
            support_dir: ".".to_string(),
            log_dir: "./logs".to_string(),
            server_url: "http://localhost:3000".to_string(),
        }
    }
}

impl DrawingConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars().collect())
    }

    /// Unset or blank variables keep their default.
    pub fn from_vars(vars: HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        let get = |key: &str| {
            vars.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
        };

        if let Some(host) = get(ENV_HOST) {
            config.host = host.to_string();
        }
        if let Some(port) = get(ENV_PORT) {
            config.port = port
                .parse()
                .with_context(|| format!("{} must be a port number, got {:?}", ENV_PORT, port))?;
        }
        if let Some(support_dir) = get(ENV_SUPPORT_DIR) {
            config.support_dir = support_dir.to_string();
        }
        if let Some(log_dir) = get(ENV_LOG_DIR) {
            config.log_dir = log_dir.to_string();
        }
        match get(ENV_SERVER_URL) {
            Some(server_url) => config.server_url = server_url.to_string(),
            // follow the server address unless told otherwise
            None => config.server_url = format!("http://{}:{}", config.host, config.port),
        }
        Ok(config)
    }
}
