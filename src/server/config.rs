// Server configuration

use anyhow::Context;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP address to bind to; when neither this nor `unixsocket` is set the
    /// server falls back to 0.0.0.0
    pub bind: Option<String>,
    /// TCP port; 0 picks an ephemeral port
    pub port: u16,
    /// Optional unix domain socket path
    pub unixsocket: Option<String>,
    /// Run in the background (parsed for config compatibility)
    pub daemonize: bool,
    /// Maximum number of concurrent clients
    pub max_clients: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: None,
            port: 6379,
            unixsocket: None,
            daemonize: false,
            max_clients: 10000,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = Some(bind.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_unixsocket(mut self, path: impl Into<String>) -> Self {
        self.unixsocket = Some(path.into());
        self
    }

    pub fn with_max_clients(mut self, max_clients: usize) -> Self {
        self.max_clients = max_clients;
        self
    }

    /// Load settings from a `key value` properties file. Unknown keys are
    /// ignored so standard config files keep working.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {path}"))?;
        let mut config = Self::default();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once(char::is_whitespace) else {
                continue;
            };
            let value = value.trim();
            match key.to_lowercase().as_str() {
                "port" => {
                    config.port = value
                        .parse()
                        .with_context(|| format!("invalid port: {value}"))?;
                }
                "bind" => config.bind = Some(value.to_string()),
                "unixsocket" => config.unixsocket = Some(value.to_string()),
                "daemonize" => config.daemonize = value.eq_ignore_ascii_case("yes"),
                "maxclients" => {
                    config.max_clients = value
                        .parse()
                        .with_context(|| format!("invalid maxclients: {value}"))?;
                }
                other => debug!("ignoring config key {}", other),
            }
        }
        Ok(config)
    }
}
