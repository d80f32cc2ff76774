//! Wire protocol.
//!
//! Every message is a frame: `len:u32 | body`, big-endian. A request body
//! starts with an opcode, a response body with a status byte:
//!
//! ```text
//! AUTH  0x01 | token
//! GET   0x02 | key
//! PUT   0x03 | key_len:u32 | key | value
//!
//! OK            0x00 | payload
//! NOT_FOUND     0x01
//! ERROR         0x02 | message (UTF-8)
//! UNAUTHORIZED  0x03
//! ```

use crate::error::{ServerError, ServerResult};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::ErrorKind;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Request opcodes.
pub mod op {
    /// Present the auth token.
    pub const AUTH: u8 = 1;
    /// Look up a key.
    pub const GET: u8 = 2;
    /// Store a key.
    pub const PUT: u8 = 3;
}

/// Response status codes.
pub mod status {
    /// Success, with an optional payload.
    pub const OK: u8 = 0;
    /// The key is absent.
    pub const NOT_FOUND: u8 = 1;
    /// The request failed; payload is a message.
    pub const ERROR: u8 = 2;
    /// Authentication failed or is required.
    pub const UNAUTHORIZED: u8 = 3;
}

/// A client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Authenticate the connection.
    Auth(Bytes),
    /// Fetch the value of a key.
    Get(Bytes),
    /// Store a value.
    Put {
        /// Key bytes.
        key: Bytes,
        /// Value bytes.
        value: Bytes,
    },
}

impl Request {
    /// Encodes the request body.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Request::Auth(token) => {
                buf.put_u8(op::AUTH);
                buf.put_slice(token);
            }
            Request::Get(key) => {
                buf.put_u8(op::GET);
                buf.put_slice(key);
            }
            Request::Put { key, value } => {
                buf.reserve(5 + key.len() + value.len());
                buf.put_u8(op::PUT);
                buf.put_u32(key.len() as u32);
                buf.put_slice(key);
                buf.put_slice(value);
            }
        }
        buf.freeze()
    }

    /// Decodes a request body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty body, unknown opcode, or a
    /// key length that runs past the body.
    pub fn decode(mut body: Bytes) -> ServerResult<Self> {
        if !body.has_remaining() {
            return Err(ServerError::invalid_request("empty request"));
        }
        match body.get_u8() {
            op::AUTH => Ok(Request::Auth(body)),
            op::GET => Ok(Request::Get(body)),
            op::PUT => {
                if body.remaining() < 4 {
                    return Err(ServerError::invalid_request("truncated put"));
                }
                let key_len = body.get_u32() as usize;
                if key_len > body.remaining() {
                    return Err(ServerError::invalid_request(format!(
                        "key length {key_len} exceeds body of {} bytes",
                        body.remaining()
                    )));
                }
                let key = body.split_to(key_len);
                Ok(Request::Put { key, value: body })
            }
            other => Err(ServerError::invalid_request(format!("unknown opcode {other}"))),
        }
    }
}

/// A server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Success; carries the value for GET, empty otherwise.
    Ok(Bytes),
    /// The key is absent.
    NotFound,
    /// The request failed.
    Error(String),
    /// Authentication failed or is required.
    Unauthorized,
}

impl Response {
    /// Encodes the response body.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        match self {
            Response::Ok(payload) => {
                buf.put_u8(status::OK);
                buf.put_slice(payload);
            }
            Response::NotFound => buf.put_u8(status::NOT_FOUND),
            Response::Error(message) => {
                buf.put_u8(status::ERROR);
                buf.put_slice(message.as_bytes());
            }
            Response::Unauthorized => buf.put_u8(status::UNAUTHORIZED),
        }
        buf.freeze()
    }

    /// Decodes a response body.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` for an empty body or unknown status.
    pub fn decode(mut body: Bytes) -> ServerResult<Self> {
        if !body.has_remaining() {
            return Err(ServerError::invalid_request("empty response"));
        }
        match body.get_u8() {
            status::OK => Ok(Response::Ok(body)),
            status::NOT_FOUND => Ok(Response::NotFound),
            status::ERROR => Ok(Response::Error(String::from_utf8_lossy(&body).into_owned())),
            status::UNAUTHORIZED => Ok(Response::Unauthorized),
            other => Err(ServerError::invalid_request(format!("unknown status {other}"))),
        }
    }
}

/// Reads one frame body.
///
/// Returns `None` if the peer closed the connection before a new frame
/// started.
///
/// # Errors
///
/// Returns `FrameTooLarge` if the declared length exceeds `max`, or an I/O
/// error if the stream ends inside a frame.
pub async fn read_frame<R>(reader: &mut R, max: usize) -> ServerResult<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > max {
        return Err(ServerError::FrameTooLarge { size: len, max });
    }
    let mut body = BytesMut::zeroed(len);
    reader.read_exact(&mut body).await?;
    Ok(Some(body.freeze()))
}

/// Writes one frame and flushes it.
///
/// # Errors
///
/// Returns `FrameTooLarge` if `body` does not fit the length prefix, or an
/// I/O error.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> ServerResult<()>
where
    W: AsyncWrite + Unpin,
{
    let len = u32::try_from(body.len()).map_err(|_| ServerError::FrameTooLarge {
        size: body.len(),
        max: u32::MAX as usize,
    })?;
    let mut frame = BytesMut::with_capacity(4 + body.len());
    frame.put_u32(len);
    frame.put_slice(body);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_layout() {
        let body = Request::Put {
            key: Bytes::from_static(b"ab"),
            value: Bytes::from_static(b"xyz"),
        }
        .encode();
        assert_eq!(&body[..], &[3, 0, 0, 0, 2, b'a', b'b', b'x', b'y', b'z']);
    }

    #[test]
    fn requests_decode() {
        for request in [
            Request::Auth(Bytes::from_static(b"token")),
            Request::Get(Bytes::from_static(b"key")),
            Request::Put {
                key: Bytes::from_static(b"key"),
                value: Bytes::new(),
            },
        ] {
            assert_eq!(Request::decode(request.encode()).unwrap(), request);
        }
    }

    #[test]
    fn malformed_requests() {
        assert!(Request::decode(Bytes::new()).is_err());
        assert!(Request::decode(Bytes::from_static(&[9, 1, 2])).is_err());
        assert!(Request::decode(Bytes::from_static(&[3, 0, 0])).is_err());
        assert!(Request::decode(Bytes::from_static(&[3, 0, 0, 0, 9, b'k'])).is_err());
    }

    #[test]
    fn responses_decode() {
        for response in [
            Response::Ok(Bytes::from_static(b"value")),
            Response::Ok(Bytes::new()),
            Response::NotFound,
            Response::Error("boom".to_string()),
            Response::Unauthorized,
        ] {
            assert_eq!(Response::decode(response.encode()).unwrap(), response);
        }
        assert!(Response::decode(Bytes::from_static(&[42])).is_err());
    }

    #[tokio::test]
    async fn frames_over_a_pipe() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, b"hello").await.unwrap();
        write_frame(&mut a, b"").await.unwrap();
        drop(a);

        assert_eq!(read_frame(&mut b, 16).await.unwrap().unwrap(), &b"hello"[..]);
        assert_eq!(read_frame(&mut b, 16).await.unwrap().unwrap(), &b""[..]);
        assert!(read_frame(&mut b, 16).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let (mut a, mut b) = tokio::io::duplex(64);
        write_frame(&mut a, &[0u8; 32]).await.unwrap();
        assert!(matches!(
            read_frame(&mut b, 16).await,
            Err(ServerError::FrameTooLarge { size: 32, max: 16 })
        ));
    }

    #[tokio::test]
    async fn truncated_frame_is_an_error() {
        let (mut a, mut b) = tokio::io::duplex(64);
        a.write_all(&[0, 0, 0, 10, 1, 2]).await.unwrap();
        drop(a);
        assert!(matches!(read_frame(&mut b, 16).await, Err(ServerError::Io(_))));
    }
}
