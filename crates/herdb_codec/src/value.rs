//! Dynamic typed value.

/// Tag bytes written in front of every encoded value.
pub mod tag {
    /// 32-bit signed integer.
    pub const INT: u8 = 1;
    /// 64-bit signed integer.
    pub const LONG: u8 = 2;
    /// 16-bit signed integer.
    pub const SHORT: u8 = 3;
    /// Boolean, one payload byte.
    pub const BOOL: u8 = 4;
    /// IEEE 754 single precision float.
    pub const FLOAT: u8 = 5;
    /// Length-prefixed array of 32-bit signed integers.
    pub const INT_ARRAY: u8 = 101;
    /// UTF-8 text filling the rest of the buffer.
    pub const TEXT: u8 = 255;
}

/// A primitive value that can be stored as a key or value.
///
/// Every value encodes as one tag byte followed by a big-endian payload,
/// so two values of different types never produce the same bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),
    /// 64-bit signed integer.
    Long(i64),
    /// 16-bit signed integer.
    Short(i16),
    /// Boolean.
    Bool(bool),
    /// Single precision float.
    Float(f32),
    /// Array of 32-bit signed integers.
    IntArray(Vec<i32>),
    /// UTF-8 text.
    Text(String),
}

impl Value {
    /// Returns the tag byte for this value.
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Value::Int(_) => tag::INT,
            Value::Long(_) => tag::LONG,
            Value::Short(_) => tag::SHORT,
            Value::Bool(_) => tag::BOOL,
            Value::Float(_) => tag::FLOAT,
            Value::IntArray(_) => tag::INT_ARRAY,
            Value::Text(_) => tag::TEXT,
        }
    }

    /// Returns a short type name, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Short(_) => "short",
            Value::Bool(_) => "bool",
            Value::Float(_) => "float",
            Value::IntArray(_) => "int array",
            Value::Text(_) => "text",
        }
    }

    /// Returns the encoded size in bytes, including the tag.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Value::Int(_) | Value::Float(_) => 4,
            Value::Long(_) => 8,
            Value::Short(_) => 2,
            Value::Bool(_) => 1,
            Value::IntArray(items) => 4 + items.len() * 4,
            Value::Text(s) => s.len(),
        }
    }

    /// Returns the value as an `i32`, if it is an int.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the value as an `i64`, widening ints and shorts.
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(n) => Some(*n),
            Value::Int(n) => Some(i64::from(*n)),
            Value::Short(n) => Some(i64::from(*n)),
            _ => None,
        }
    }

    /// Returns the value as a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as a string slice.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as an int slice.
    pub fn as_int_array(&self) -> Option<&[i32]> {
        match self {
            Value::IntArray(items) => Some(items),
            _ => None,
        }
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Long(n)
    }
}

impl From<i16> for Value {
    fn from(n: i16) -> Self {
        Value::Short(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f)
    }
}

impl From<Vec<i32>> for Value {
    fn from(items: Vec<i32>) -> Self {
        Value::IntArray(items)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
