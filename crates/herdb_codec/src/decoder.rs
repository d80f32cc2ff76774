//! Tagged value decoder.

use crate::error::{CodecError, CodecResult};
use crate::value::{tag, Value};
use bytes::Buf;

/// Decode a value from its tagged byte form.
///
/// # Errors
///
/// Returns an error if the tag is unknown, the payload is truncated, or
/// bytes remain after a fixed-width value.
pub fn from_bytes(bytes: &[u8]) -> CodecResult<Value> {
    let mut decoder = TaggedDecoder::new(bytes);
    let value = decoder.decode()?;
    if !decoder.is_empty() {
        return Err(CodecError::TrailingBytes {
            remaining: decoder.remaining(),
        });
    }
    Ok(value)
}

/// A decoder for `tag | payload` bytes.
pub struct TaggedDecoder<'a> {
    data: &'a [u8],
}

impl<'a> TaggedDecoder<'a> {
    /// Create a new decoder for the given bytes.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Decode the next value.
    pub fn decode(&mut self) -> CodecResult<Value> {
        self.need(1)?;
        let tag = self.data.get_u8();
        match tag {
            tag::INT => {
                self.need(4)?;
                Ok(Value::Int(self.data.get_i32()))
            }
            tag::LONG => {
                self.need(8)?;
                Ok(Value::Long(self.data.get_i64()))
            }
            tag::SHORT => {
                self.need(2)?;
                Ok(Value::Short(self.data.get_i16()))
            }
            tag::BOOL => {
                self.need(1)?;
                match self.data.get_u8() {
                    0 => Ok(Value::Bool(false)),
                    1 => Ok(Value::Bool(true)),
                    byte => Err(CodecError::InvalidBool { byte }),
                }
            }
            tag::FLOAT => {
                self.need(4)?;
                Ok(Value::Float(self.data.get_f32()))
            }
            tag::INT_ARRAY => self.decode_int_array(),
            tag::TEXT => {
                let text = std::str::from_utf8(self.data)
                    .map_err(|_| CodecError::InvalidUtf8)?
                    .to_string();
                self.data.advance(self.data.len());
                Ok(Value::Text(text))
            }
            tag => Err(CodecError::UnknownTag { tag }),
        }
    }

    fn decode_int_array(&mut self) -> CodecResult<Value> {
        self.need(4)?;
        let count = self.data.get_u32() as usize;
        // Check against the input before allocating.
        let bytes = count.checked_mul(4).ok_or(CodecError::UnexpectedEof)?;
        self.need(bytes)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(self.data.get_i32());
        }
        Ok(Value::IntArray(items))
    }

    fn need(&self, n: usize) -> CodecResult<()> {
        if self.data.remaining() < n {
            Err(CodecError::UnexpectedEof)
        } else {
            Ok(())
        }
    }

    /// Check if all bytes have been consumed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of unread bytes.
    pub fn remaining(&self) -> usize {
        self.data.remaining()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_int() {
        assert_eq!(from_bytes(&[tag::INT, 0, 0, 1, 0]).unwrap(), Value::Int(256));
    }

    #[test]
    fn decode_truncated_long() {
        assert_eq!(
            from_bytes(&[tag::LONG, 0, 0, 0]),
            Err(CodecError::UnexpectedEof)
        );
    }

    #[test]
    fn decode_empty_input() {
        assert_eq!(from_bytes(&[]), Err(CodecError::UnexpectedEof));
    }

    #[test]
    fn decode_unknown_tag() {
        assert_eq!(from_bytes(&[42]), Err(CodecError::UnknownTag { tag: 42 }));
    }

    #[test]
    fn decode_trailing_bytes() {
        assert_eq!(
            from_bytes(&[tag::BOOL, 1, 9]),
            Err(CodecError::TrailingBytes { remaining: 1 })
        );
    }

    #[test]
    fn decode_invalid_bool() {
        assert_eq!(
            from_bytes(&[tag::BOOL, 2]),
            Err(CodecError::InvalidBool { byte: 2 })
        );
    }

    #[test]
    fn decode_empty_text() {
        assert_eq!(from_bytes(&[tag::TEXT]).unwrap(), Value::Text(String::new()));
    }

    #[test]
    fn decode_invalid_utf8() {
        assert_eq!(
            from_bytes(&[tag::TEXT, 0xff, 0xfe]),
            Err(CodecError::InvalidUtf8)
        );
    }

    #[test]
    fn decode_int_array_count_exceeds_input() {
        let bytes = [tag::INT_ARRAY, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 1];
        assert_eq!(from_bytes(&bytes), Err(CodecError::UnexpectedEof));
    }
}
