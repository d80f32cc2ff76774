//! Server configuration.

use std::net::SocketAddr;

/// Default frame size limit, 2 MiB.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 2 * 1024 * 1024;

/// Configuration for the herdb server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest frame body accepted; bigger frames close the connection.
    pub max_frame_size: usize,
    /// Token clients must present before GET or PUT (if set).
    pub auth_token: Option<Vec<u8>>,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            auth_token: None,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the maximum frame size.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Requires clients to authenticate with `token`.
    pub fn with_auth(mut self, token: impl Into<Vec<u8>>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Returns true if clients must authenticate.
    pub fn require_auth(&self) -> bool {
        self.auth_token.is_some()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8888)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8888);
        assert_eq!(config.max_connections, 1024);
        assert!(!config.require_auth());
    }

    #[test]
    fn config_builder() {
        let config = ServerConfig::new("0.0.0.0:9000".parse().unwrap())
            .with_max_connections(16)
            .with_max_frame_size(4096)
            .with_auth("secret");

        assert_eq!(config.max_connections, 16);
        assert_eq!(config.max_frame_size, 4096);
        assert!(config.require_auth());
        assert_eq!(config.auth_token, Some(b"secret".to_vec()));
    }
}
