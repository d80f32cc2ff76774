//! # herdb Server
//!
//! Network access to a herdb store.
//!
//! This crate provides:
//! - A length-prefixed binary protocol (GET, PUT, AUTH)
//! - A tokio TCP server with a task per connection
//! - Optional shared-token authentication
//! - An async client
//!
//! # Protocol
//!
//! Every message is `len:u32 | body`. See [`protocol`] for the body
//! layouts. When the server has a token configured, a connection must send
//! AUTH with that token before any GET or PUT; until then it is answered
//! with UNAUTHORIZED. A frame larger than `max_frame_size` closes the
//! connection.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod client;
mod config;
mod error;
mod handler;
pub mod protocol;
mod server;

pub use client::HerdbClient;
pub use config::{ServerConfig, DEFAULT_MAX_FRAME_SIZE};
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler, Session};
pub use protocol::{Request, Response};
pub use server::HerdbServer;
