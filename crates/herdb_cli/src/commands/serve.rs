//! Serve command implementation.

use herdb_core::Store;
use herdb_server::{HerdbServer, ServerConfig};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Builds the server configuration from command-line flags.
pub fn server_config(addr: SocketAddr, token: Option<String>, max_connections: usize) -> ServerConfig {
    let config = ServerConfig::new(addr).with_max_connections(max_connections);
    match token {
        Some(token) => config.with_auth(token),
        None => config,
    }
}

/// Runs the serve command until Ctrl-C, then commits the store.
pub fn run(
    path: &Path,
    addr: SocketAddr,
    token: Option<String>,
    max_connections: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = Arc::new(Store::open(path)?);
    let server = HerdbServer::new(server_config(addr, token, max_connections), Arc::clone(&store));

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        let listener = server.bind().await?;
        server
            .serve(listener, async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    warn!(error = %err, "failed to listen for Ctrl-C");
                    std::future::pending::<()>().await;
                }
                info!("shutting down");
            })
            .await
    })?;
    // Blocking store calls still in flight hold a handle until they finish.
    drop(runtime);

    match Arc::try_unwrap(store) {
        Ok(store) => store.commit()?,
        Err(_) => warn!("store still in use, index not committed; it will be rebuilt on next open"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_enables_auth() {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        assert!(!server_config(addr, None, 8).require_auth());

        let config = server_config(addr, Some("secret".to_string()), 8);
        assert!(config.require_auth());
        assert_eq!(config.max_connections, 8);
    }
}
