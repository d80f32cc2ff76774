//! Request handling.
//!
//! Handlers are synchronous: they call straight into the store and are
//! run on the blocking pool by the server.

use crate::config::ServerConfig;
use crate::protocol::{Request, Response};
use bytes::Bytes;
use herdb_core::Store;
use std::sync::Arc;
use tracing::{debug, warn};

/// Per-connection state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// Whether the connection presented a valid token.
    pub authenticated: bool,
}

/// Shared state for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// The store being served.
    pub store: Arc<Store>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        Self { config, store }
    }

    /// Returns a fresh session for a new connection.
    pub fn new_session(&self) -> Session {
        Session {
            authenticated: !self.config.require_auth(),
        }
    }
}

/// Handler for client requests.
#[derive(Clone)]
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Returns the shared context.
    pub fn context(&self) -> &HandlerContext {
        &self.context
    }

    /// Handles one request, updating `session` on authentication.
    pub fn handle(&self, session: &mut Session, request: Request) -> Response {
        match request {
            Request::Auth(token) => self.handle_auth(session, &token),
            _ if !session.authenticated => {
                warn!("rejected request from unauthenticated connection");
                Response::Unauthorized
            }
            Request::Get(key) => self.handle_get(&key),
            Request::Put { key, value } => self.handle_put(&key, &value),
        }
    }

    fn handle_auth(&self, session: &mut Session, token: &[u8]) -> Response {
        match &self.context.config.auth_token {
            None => {
                session.authenticated = true;
                Response::Ok(Bytes::new())
            }
            Some(expected) if expected.as_slice() == token => {
                debug!("connection authenticated");
                session.authenticated = true;
                Response::Ok(Bytes::new())
            }
            Some(_) => {
                warn!("authentication failed");
                session.authenticated = false;
                Response::Unauthorized
            }
        }
    }

    fn handle_get(&self, key: &[u8]) -> Response {
        match self.context.store.get(key) {
            Ok(Some(value)) => Response::Ok(Bytes::from(value)),
            Ok(None) => Response::NotFound,
            Err(err) => {
                warn!(error = %err, "get failed");
                Response::Error(err.to_string())
            }
        }
    }

    fn handle_put(&self, key: &[u8], value: &[u8]) -> Response {
        match self.context.store.put(key, value) {
            Ok(()) => Response::Ok(Bytes::new()),
            Err(err) => {
                warn!(error = %err, "put failed");
                Response::Error(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdb_core::Config;

    fn handler(config: ServerConfig) -> RequestHandler {
        let store = Store::open_in_memory(Config::new().segments(2).initial_capacity(16)).unwrap();
        RequestHandler::new(Arc::new(HandlerContext::new(config, Arc::new(store))))
    }

    fn put(key: &'static [u8], value: &'static [u8]) -> Request {
        Request::Put {
            key: Bytes::from_static(key),
            value: Bytes::from_static(value),
        }
    }

    #[test]
    fn put_then_get() {
        let handler = handler(ServerConfig::default());
        let mut session = handler.context().new_session();
        assert!(session.authenticated);

        assert_eq!(handler.handle(&mut session, put(b"k", b"v")), Response::Ok(Bytes::new()));
        assert_eq!(
            handler.handle(&mut session, Request::Get(Bytes::from_static(b"k"))),
            Response::Ok(Bytes::from_static(b"v"))
        );
        assert_eq!(
            handler.handle(&mut session, Request::Get(Bytes::from_static(b"missing"))),
            Response::NotFound
        );
    }

    #[test]
    fn store_errors_become_error_responses() {
        let handler = handler(ServerConfig::default());
        let mut session = handler.context().new_session();
        assert!(matches!(
            handler.handle(&mut session, put(b"", b"v")),
            Response::Error(_)
        ));
    }

    #[test]
    fn auth_is_required_when_configured() {
        let handler = handler(ServerConfig::default().with_auth("secret"));
        let mut session = handler.context().new_session();
        assert!(!session.authenticated);

        assert_eq!(handler.handle(&mut session, put(b"k", b"v")), Response::Unauthorized);
        assert_eq!(
            handler.handle(&mut session, Request::Auth(Bytes::from_static(b"wrong"))),
            Response::Unauthorized
        );
        assert_eq!(
            handler.handle(&mut session, Request::Auth(Bytes::from_static(b"secret"))),
            Response::Ok(Bytes::new())
        );
        assert!(session.authenticated);
        assert_eq!(handler.handle(&mut session, put(b"k", b"v")), Response::Ok(Bytes::new()));
    }

    #[test]
    fn auth_without_token_is_accepted() {
        let handler = handler(ServerConfig::default());
        let mut session = Session::default();
        assert_eq!(
            handler.handle(&mut session, Request::Auth(Bytes::from_static(b"anything"))),
            Response::Ok(Bytes::new())
        );
        assert!(session.authenticated);
    }
}
