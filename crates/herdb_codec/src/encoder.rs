//! Tagged value encoder.

use crate::error::{CodecError, CodecResult};
use crate::value::Value;
use bytes::BufMut;

/// Encode a value to its tagged byte form.
///
/// # Errors
///
/// Returns an error if an int array has more than `u32::MAX` elements.
pub fn to_bytes(value: &Value) -> CodecResult<Vec<u8>> {
    let mut encoder = TaggedEncoder::with_capacity(value.encoded_len());
    encoder.encode(value)?;
    Ok(encoder.into_bytes())
}

/// An encoder producing `tag | payload` bytes.
///
/// Integers and floats are written big-endian; text is written raw and
/// runs to the end of the buffer, so a value is always the whole buffer.
#[derive(Debug, Default)]
pub struct TaggedEncoder {
    buffer: Vec<u8>,
}

impl TaggedEncoder {
    /// Create a new encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new encoder with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Encode a value.
    pub fn encode(&mut self, value: &Value) -> CodecResult<()> {
        self.buffer.put_u8(value.tag());
        match value {
            Value::Int(n) => self.buffer.put_i32(*n),
            Value::Long(n) => self.buffer.put_i64(*n),
            Value::Short(n) => self.buffer.put_i16(*n),
            Value::Bool(b) => self.buffer.put_u8(u8::from(*b)),
            Value::Float(f) => self.buffer.put_f32(*f),
            Value::IntArray(items) => {
                let count = u32::try_from(items.len()).map_err(|_| {
                    CodecError::encoding_failed(format!(
                        "int array of {} elements exceeds u32",
                        items.len()
                    ))
                })?;
                self.buffer.put_u32(count);
                for item in items {
                    self.buffer.put_i32(*item);
                }
            }
            Value::Text(s) => self.buffer.put_slice(s.as_bytes()),
        }
        Ok(())
    }

    /// Consume this encoder and return the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get a reference to the encoded bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::tag;

    #[test]
    fn int_is_big_endian() {
        let bytes = to_bytes(&Value::Int(0x0102_0304)).unwrap();
        assert_eq!(bytes, vec![tag::INT, 1, 2, 3, 4]);
    }

    #[test]
    fn negative_short() {
        let bytes = to_bytes(&Value::Short(-1)).unwrap();
        assert_eq!(bytes, vec![tag::SHORT, 0xff, 0xff]);
    }

    #[test]
    fn bool_payload() {
        assert_eq!(to_bytes(&Value::Bool(true)).unwrap(), vec![tag::BOOL, 1]);
        assert_eq!(to_bytes(&Value::Bool(false)).unwrap(), vec![tag::BOOL, 0]);
    }

    #[test]
    fn int_array_has_count_prefix() {
        let bytes = to_bytes(&Value::IntArray(vec![1, -1])).unwrap();
        assert_eq!(
            bytes,
            vec![tag::INT_ARRAY, 0, 0, 0, 2, 0, 0, 0, 1, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn text_is_raw_utf8() {
        let bytes = to_bytes(&Value::from("hé")).unwrap();
        assert_eq!(bytes[0], tag::TEXT);
        assert_eq!(&bytes[1..], "hé".as_bytes());
    }

    #[test]
    fn encoder_reuse_appends() {
        let mut encoder = TaggedEncoder::new();
        encoder.encode(&Value::Bool(true)).unwrap();
        assert_eq!(encoder.as_bytes(), &[tag::BOOL, 1]);
    }
}
