//! TCP server.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{HandlerContext, RequestHandler};
use crate::protocol::{read_frame, write_frame, Request, Response};
use herdb_core::Store;
use std::future::Future;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// The herdb network server.
///
/// Each accepted connection runs in its own task; store calls are moved
/// onto the blocking pool so a segment resize never stalls the runtime.
///
/// # Example
///
/// ```no_run
/// use herdb_core::{Config, Store};
/// use herdb_server::{HerdbServer, ServerConfig};
/// use std::sync::Arc;
///
/// # async fn run() -> herdb_server::ServerResult<()> {
/// let store = Arc::new(Store::open_in_memory(Config::default())?);
/// let server = HerdbServer::new(ServerConfig::default(), store);
/// server.run().await
/// # }
/// ```
pub struct HerdbServer {
    handler: RequestHandler,
    connections: Arc<Semaphore>,
}

impl HerdbServer {
    /// Creates a server for `store`.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        let connections = Arc::new(Semaphore::new(config.max_connections));
        let context = Arc::new(HandlerContext::new(config, store));
        Self {
            handler: RequestHandler::new(context),
            connections,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.handler.context().config
    }

    /// Binds the configured address.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn bind(&self) -> ServerResult<TcpListener> {
        Ok(TcpListener::bind(self.config().bind_addr).await?)
    }

    /// Binds the configured address and serves until the process exits.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the address cannot be bound.
    pub async fn run(self) -> ServerResult<()> {
        let listener = self.bind().await?;
        self.serve(listener, std::future::pending()).await
    }

    /// Serves connections from `listener` until `shutdown` completes.
    ///
    /// Open connections are aborted on shutdown.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the listener's address cannot be read.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()>,
    {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            auth = self.config().require_auth(),
            max_connections = self.config().max_connections,
            "herdb server listening"
        );

        tokio::pin!(shutdown);
        let mut tasks = JoinSet::new();
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(err) = joined {
                        if err.is_panic() {
                            error!(error = %err, "connection task panicked");
                        }
                    }
                }
                accepted = listener.accept() => {
                    let (socket, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            continue;
                        }
                    };
                    let Ok(permit) = Arc::clone(&self.connections).try_acquire_owned() else {
                        warn!(%peer, "connection limit reached, closing");
                        continue;
                    };
                    let handler = self.handler.clone();
                    tasks.spawn(async move {
                        debug!(%peer, "connection opened");
                        match handle_connection(socket, handler).await {
                            Ok(()) => debug!(%peer, "connection closed"),
                            Err(err) => warn!(%peer, error = %err, "connection closed with error"),
                        }
                        drop(permit);
                    });
                }
            }
        }

        tasks.shutdown().await;
        info!(%addr, "herdb server stopped");
        Ok(())
    }
}

async fn handle_connection(mut socket: TcpStream, handler: RequestHandler) -> ServerResult<()> {
    socket.set_nodelay(true)?;
    let max = handler.context().config.max_frame_size;
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut session = handler.context().new_session();

    while let Some(body) = read_frame(&mut reader, max).await? {
        let response = match Request::decode(body) {
            Ok(request @ Request::Auth(_)) => handler.handle(&mut session, request),
            Ok(request) => {
                let handler = handler.clone();
                let mut next = session;
                let (next, response) = tokio::task::spawn_blocking(move || {
                    let response = handler.handle(&mut next, request);
                    (next, response)
                })
                .await
                .map_err(|err| ServerError::Internal(err.to_string()))?;
                session = next;
                response
            }
            Err(err) => Response::Error(err.to_string()),
        };
        write_frame(&mut writer, &response.encode()).await?;
    }
    Ok(())
}
