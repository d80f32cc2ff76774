//! Async client for the herdb server.

use crate::config::DEFAULT_MAX_FRAME_SIZE;
use crate::error::{ServerError, ServerResult};
use crate::protocol::{read_frame, write_frame, Request, Response};
use bytes::Bytes;
use tokio::net::{TcpStream, ToSocketAddrs};

/// A single connection to a herdb server.
///
/// Requests are sent one at a time; each call waits for its response.
pub struct HerdbClient {
    stream: TcpStream,
    max_frame_size: usize,
}

impl HerdbClient {
    /// Connects to `addr`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the connection fails.
    pub async fn connect(addr: impl ToSocketAddrs) -> ServerResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        })
    }

    /// Sets the largest response frame accepted.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Authenticates the connection.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized` if the server rejects `token`.
    pub async fn auth(&mut self, token: &[u8]) -> ServerResult<()> {
        match self.call(Request::Auth(Bytes::copy_from_slice(token))).await? {
            Response::Ok(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    /// Fetches the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `Remote` for a server-side failure, or an
    /// I/O error.
    pub async fn get(&mut self, key: &[u8]) -> ServerResult<Option<Vec<u8>>> {
        match self.call(Request::Get(Bytes::copy_from_slice(key))).await? {
            Response::Ok(value) => Ok(Some(value.to_vec())),
            Response::NotFound => Ok(None),
            other => Err(unexpected(other)),
        }
    }

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Unauthorized`, `Remote` for a server-side failure, or an
    /// I/O error.
    pub async fn put(&mut self, key: &[u8], value: &[u8]) -> ServerResult<()> {
        let request = Request::Put {
            key: Bytes::copy_from_slice(key),
            value: Bytes::copy_from_slice(value),
        };
        match self.call(request).await? {
            Response::Ok(_) => Ok(()),
            other => Err(unexpected(other)),
        }
    }

    async fn call(&mut self, request: Request) -> ServerResult<Response> {
        write_frame(&mut self.stream, &request.encode()).await?;
        match read_frame(&mut self.stream, self.max_frame_size).await? {
            Some(body) => Response::decode(body),
            None => Err(ServerError::ConnectionClosed),
        }
    }
}

fn unexpected(response: Response) -> ServerError {
    match response {
        Response::Unauthorized => ServerError::Unauthorized,
        Response::Error(message) => ServerError::Remote(message),
        Response::NotFound => ServerError::invalid_request("unexpected NOT_FOUND"),
        Response::Ok(_) => ServerError::invalid_request("unexpected OK"),
    }
}
