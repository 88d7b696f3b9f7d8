//! mockboshd.toml configuration.
//!
//! Every key is optional; missing keys take the built-in defaults.
//!
//! ```toml
//! port = 25555
//! bind = "127.0.0.1"
//! username = "admin"
//! password = "admin"
//! speed = 10.0
//! debug = false
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    pub bind: String,
    pub username: String,
    pub password: String,
    /// Simulation speed multiplier; task delays are divided by it.
    pub speed: f64,
    pub debug: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 25555,
            bind: "0.0.0.0".to_string(),
            username: "admin".to_string(),
            password: "admin".to_string(),
            speed: 1.0,
            debug: false,
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Socket address to listen on.
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self
            .bind
            .parse()
            .with_context(|| format!("invalid bind address '{}'", self.bind))?;
        Ok(SocketAddr::new(ip, self.port))
    }
}
