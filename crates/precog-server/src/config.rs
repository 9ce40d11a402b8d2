//! Server configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::error::ServerError;
use crate::guard::DEFAULT_BODY_LIMIT;

/// Playground server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind, `host:port`
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Largest request body the guard buffers, in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,
}

fn default_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            body_limit: default_body_limit(),
            log_json: false,
        }
    }
}

impl ServerConfig {
    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_body_limit(mut self, limit: usize) -> Self {
        self.body_limit = limit;
        self
    }

    pub fn with_log_json(mut self, log_json: bool) -> Self {
        self.log_json = log_json;
        self
    }

    /// Parsed bind address
    pub fn socket_addr(&self) -> Result<SocketAddr, ServerError> {
        self.addr
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid address {:?}: {}", self.addr, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.addr, "127.0.0.1:3000");
        assert_eq!(config.body_limit, DEFAULT_BODY_LIMIT);
        assert_eq!(config.socket_addr().unwrap().port(), 3000);
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ServerConfig = serde_json::from_str(r#"{"addr": "0.0.0.0:8080"}"#).unwrap();
        assert_eq!(config.addr, "0.0.0.0:8080");
        assert!(!config.log_json);
    }

    #[test]
    fn test_invalid_addr() {
        let config = ServerConfig::default().with_addr("nowhere");
        assert!(matches!(config.socket_addr(), Err(ServerError::Config(_))));
    }
}
