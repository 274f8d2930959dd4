//! Server configuration.

use crate::error::{ServerError, ServerResult};
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// How mounted static files are served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Files are re-read on every request so edits show up immediately.
    Local,
    /// Files are read once at mount time and served from memory.
    #[default]
    Production,
}

impl FromStr for RunMode {
    type Err = ServerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "local" | "development" | "dev" => Ok(RunMode::Local),
            "production" | "prod" => Ok(RunMode::Production),
            other => Err(ServerError::ConfigError(format!("unknown run mode: {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The address to bind to.
    pub addr: SocketAddr,
    /// The maximum number of connections served at once; further accepts wait.
    pub max_connections: usize,
    pub run_mode: RunMode,
    /// Refuse to start when route registration recorded any issue.
    pub strict_routes: bool,
    /// Largest accepted request body in bytes; larger bodies get a 413.
    pub max_body_size: usize,
    /// Byte budget for the request line plus all header lines; past it the
    /// request gets a 431.
    pub max_header_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_connections: 256,
            run_mode: RunMode::default(),
            strict_routes: false,
            max_body_size: 10 * 1024 * 1024,
            max_header_size: 16 * 1024,
        }
    }
}

impl ServerConfig {
    /// Reads `HOST`, `PORT`, `RUN_MODE`, `STRICT_ROUTES`, `MAX_BODY_SIZE` and
    /// `MAX_HEADER_SIZE`, falling back to the defaults for unset variables.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ServerResult<Self> {
        let mut config = Self::default();
        if let Some(host) = lookup("HOST") {
            let ip: IpAddr = host
                .parse()
                .map_err(|_| ServerError::ConfigError(format!("invalid HOST: {host}")))?;
            config.addr.set_ip(ip);
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .parse()
                .map_err(|_| ServerError::ConfigError(format!("invalid PORT: {port}")))?;
            config.addr.set_port(port);
        }
        if let Some(mode) = lookup("RUN_MODE") {
            config.run_mode = mode.parse()?;
        }
        if let Some(strict) = lookup("STRICT_ROUTES") {
            config.strict_routes = matches!(strict.as_str(), "1" | "true" | "yes");
        }
        if let Some(size) = lookup("MAX_BODY_SIZE") {
            config.max_body_size = size
                .parse()
                .map_err(|_| ServerError::ConfigError(format!("invalid MAX_BODY_SIZE: {size}")))?;
        }
        if let Some(size) = lookup("MAX_HEADER_SIZE") {
            config.max_header_size = size
                .parse()
                .map_err(|_| ServerError::ConfigError(format!("invalid MAX_HEADER_SIZE: {size}")))?;
        }
        Ok(config)
    }
}
