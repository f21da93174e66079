// ABOUTME: The RESP3 value model. A tagged, recursively defined sum type
// ABOUTME: Decoded values carry raw bytes; decoding to text is the caller's concern

use bytes::Bytes;
use num_bigint::BigInt;

/// A single decoded RESP3 value.
///
/// All string-valued variants carry raw bytes. `Map`/`Set`/`Array`/`Push`
/// preserve the order the server sent their children in.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    SimpleString(Bytes),
    SimpleError { code: Bytes, message: Bytes },
    Integer(i64),
    BlobString(Bytes),
    BlobError { code: Bytes, message: Bytes },
    VerbatimString { format: [u8; 3], data: Bytes },
    BigNumber(BigInt),
    Double(f64),
    Boolean(bool),
    Null,
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    /// A server-initiated push. Decoded identically to `Array` and
    /// distinguished only by its `>` tag. By convention the first element is
    /// the push kind (see [`Value::push_kind`]) and the rest is event data.
    Push(Vec<Value>),
}

impl Value {
    /// The raw bytes backing a string-valued variant, if this is one.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::SimpleString(b) | Value::BlobString(b) => Some(b),
            Value::VerbatimString { data, .. } => Some(data),
            _ => None,
        }
    }

    /// The push kind (e.g. `subscribe`, `message`) of a `Push` value's first
    /// element, if this is a `Push` carrying at least one element whose
    /// first element is itself a string-valued variant.
    pub fn push_kind(&self) -> Option<&[u8]> {
        match self {
            Value::Push(items) => items.first().and_then(Value::as_bytes),
            _ => None,
        }
    }

    pub fn is_push(&self) -> bool {
        matches!(self, Value::Push(_))
    }
}
