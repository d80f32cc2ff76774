//! # herdb Codec
//!
//! Tagged encoding of primitive values for herdb keys and values.
//!
//! The storage engine itself only sees opaque byte strings. This crate
//! gives callers a stable way to turn ints, longs, shorts, booleans,
//! floats, int arrays and text into those bytes and back.
//!
//! ## Format
//!
//! One tag byte, then the payload:
//!
//! | Tag   | Type      | Payload                         |
//! |-------|-----------|---------------------------------|
//! | `1`   | int       | `i32` big-endian                |
//! | `2`   | long      | `i64` big-endian                |
//! | `3`   | short     | `i16` big-endian                |
//! | `4`   | bool      | one byte, `0` or `1`            |
//! | `5`   | float     | `f32` big-endian                |
//! | `101` | int array | `u32` count, then `i32` items   |
//! | `255` | text      | UTF-8 bytes to end of buffer    |
//!
//! ## Usage
//!
//! ```
//! use herdb_codec::{Decode, Encode, Value};
//!
//! let bytes = 42i32.encode().unwrap();
//! assert_eq!(i32::decode(&bytes).unwrap(), 42);
//!
//! let value = Value::decode(&"hello".encode().unwrap()).unwrap();
//! assert_eq!(value, Value::Text("hello".to_string()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod error;
mod value;

pub use decoder::{from_bytes, TaggedDecoder};
pub use encoder::{to_bytes, TaggedEncoder};
pub use error::{CodecError, CodecResult};
pub use value::{tag, Value};

/// Trait for types that can be encoded to tagged bytes.
pub trait Encode {
    /// Encode this value to tagged bytes.
    fn encode(&self) -> CodecResult<Vec<u8>>;
}

/// Trait for types that can be decoded from tagged bytes.
pub trait Decode: Sized {
    /// Decode this value from tagged bytes.
    fn decode(bytes: &[u8]) -> CodecResult<Self>;
}

impl Encode for Value {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_bytes(self)
    }
}

impl Decode for Value {
    fn decode(bytes: &[u8]) -> CodecResult<Self> {
        from_bytes(bytes)
    }
}

impl Encode for str {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.len() + 1);
        bytes.push(tag::TEXT);
        bytes.extend_from_slice(self.as_bytes());
        Ok(bytes)
    }
}

impl Encode for [i32] {
    fn encode(&self) -> CodecResult<Vec<u8>> {
        to_bytes(&Value::IntArray(self.to_vec()))
    }
}

macro_rules! impl_primitive {
    ($ty:ty, $variant:ident, $name:literal) => {
        impl Encode for $ty {
            fn encode(&self) -> CodecResult<Vec<u8>> {
                to_bytes(&Value::$variant(self.to_owned()))
            }
        }

        impl Decode for $ty {
            fn decode(bytes: &[u8]) -> CodecResult<Self> {
                match from_bytes(bytes)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(CodecError::TypeMismatch {
                        expected: $name,
                        found: other.type_name(),
                    }),
                }
            }
        }
    };
}

impl_primitive!(i32, Int, "int");
impl_primitive!(i64, Long, "long");
impl_primitive!(i16, Short, "short");
impl_primitive!(bool, Bool, "bool");
impl_primitive!(f32, Float, "float");
impl_primitive!(Vec<i32>, IntArray, "int array");
impl_primitive!(String, Text, "text");
