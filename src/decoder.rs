// ABOUTME: Resumable RESP3 decoder. Turns fed bytes into complete RESP3 values
// ABOUTME: Uses a shadow-cursor/attempt-and-commit discipline: parse against a Cursor view,
// ABOUTME: commit (advance the buffer) only once a whole value has decoded

use crate::buffer::ByteBuffer;
use crate::value::Value;
use bytes::Bytes;
use num_bigint::BigInt;
use std::io::Cursor;
use thiserror::Error;

/// Fatal decode failures. `Incomplete` is not one of these: it is
/// represented by `get_object` returning `Ok(None)`, so it can never be
/// confused with `Ok(Some(Value::Null))`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unknown RESP3 type tag {0:#04x}")]
    UnknownTag(u8),
    #[error("malformed length header: {0}")]
    InvalidLength(String),
    #[error("negative length in {0} header")]
    NegativeLength(&'static str),
    #[error("malformed integer line: {0}")]
    InvalidInteger(String),
    #[error("malformed double line: {0}")]
    InvalidDouble(String),
    #[error("malformed big number line: {0}")]
    InvalidBigNumber(String),
    #[error("malformed boolean line: expected 't' or 'f', got {0:?}")]
    InvalidBoolean(Vec<u8>),
    #[error("malformed verbatim string: missing format/':' separator")]
    InvalidVerbatimFormat,
    #[error("blob payload not terminated by CRLF")]
    MissingTrailingCrlf,
    #[error("non-UTF8 bytes in {0}")]
    InvalidUtf8(&'static str),
}

/// A resumable streaming RESP3 parser, one per physical connection.
///
/// `feed` appends bytes; `get_object` consumes as many buffered bytes as
/// needed to produce the next complete value, returning `Ok(None)`
/// ("Incomplete") if the buffer runs out mid-value. Incomplete progress is
/// never lost: the parse is re-attempted from the head of the buffer on the
/// next call (the buffer itself is untouched until a full value commits), so
/// feeding the exact missing suffix and calling again reproduces what
/// feeding the whole message at once would have produced.
#[derive(Debug, Default)]
pub struct Resp3Decoder {
    buf: ByteBuffer,
}

impl Resp3Decoder {
    pub fn new() -> Self {
        Self { buf: ByteBuffer::new() }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.append(bytes);
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn raw_buffer_mut(&mut self) -> &mut bytes::BytesMut {
        self.buf.raw_mut()
    }

    /// Consumes exactly the bytes comprising the next complete value (tag
    /// byte, content, and trailing CRLFs) and returns it; all remaining
    /// buffered bytes are left untouched for the next call. Returns
    /// `Ok(None)` if the buffer does not yet hold a full value.
    pub fn get_object(&mut self) -> Result<Option<Value>, DecodeError> {
        let data = self.buf.as_slice();
        let mut cursor = Cursor::new(data);
        match parse_value(&mut cursor) {
            Ok(Some(value)) => {
                let consumed = cursor.position() as usize;
                self.buf
                    .consume(consumed)
                    .expect("cursor never advances past buffered data");
                Ok(Some(value))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn parse_value(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    let tag = match read_byte(cur) {
        Some(b) => b,
        None => return Ok(None),
    };

    match tag {
        b'+' => Ok(read_line(cur)?.map(|line| Value::SimpleString(to_bytes(line)))),
        b'-' => Ok(parse_error_line(cur)?.map(|(code, message)| Value::SimpleError { code, message })),
        b':' => parse_integer_line(cur).map(|opt| opt.map(Value::Integer)),
        b'$' => parse_blob(cur).map(|opt| opt.map(Value::BlobString)),
        b'!' => parse_blob_error(cur),
        b'=' => parse_verbatim(cur),
        b'(' => parse_big_number(cur),
        b',' => parse_double(cur),
        b'#' => parse_boolean(cur),
        b'_' => Ok(read_line(cur)?.map(|_| Value::Null)),
        b'*' => parse_n_children(cur, "array")?.map_or(Ok(None), |n| {
            parse_children(cur, n).map(|opt| opt.map(Value::Array))
        }),
        b'~' => parse_n_children(cur, "set")?.map_or(Ok(None), |n| {
            parse_children(cur, n).map(|opt| opt.map(Value::Set))
        }),
        b'>' => parse_n_children(cur, "push")?.map_or(Ok(None), |n| {
            parse_children(cur, n).map(|opt| opt.map(Value::Push))
        }),
        b'%' => parse_map(cur),
        other => Err(DecodeError::UnknownTag(other)),
    }
}

fn parse_error_line(cur: &mut Cursor<&[u8]>) -> Result<Option<(Bytes, Bytes)>, DecodeError> {
    Ok(read_line(cur)?.map(|line| split_code_message(line)))
}

fn parse_blob_error(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    match parse_blob(cur)? {
        Some(payload) => {
            let (code, message) = split_code_message(&payload);
            Ok(Some(Value::BlobError { code, message }))
        }
        None => Ok(None),
    }
}

fn parse_verbatim(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    match parse_blob(cur)? {
        Some(payload) => {
            if payload.len() < 4 || payload[3] != b':' {
                return Err(DecodeError::InvalidVerbatimFormat);
            }
            let mut format = [0u8; 3];
            format.copy_from_slice(&payload[0..3]);
            let data = payload.slice(4..);
            Ok(Some(Value::VerbatimString { format, data }))
        }
        None => Ok(None),
    }
}

fn parse_big_number(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    match read_line(cur)? {
        Some(line) => {
            let text = std::str::from_utf8(line)
                .map_err(|_| DecodeError::InvalidBigNumber("non-UTF8 big number".into()))?;
            let n = BigInt::parse_bytes(text.as_bytes(), 10)
                .ok_or_else(|| DecodeError::InvalidBigNumber(text.to_string()))?;
            Ok(Some(Value::BigNumber(n)))
        }
        None => Ok(None),
    }
}

fn parse_double(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    match read_line(cur)? {
        Some(line) => {
            let text = std::str::from_utf8(line)
                .map_err(|_| DecodeError::InvalidDouble("non-UTF8 double".into()))?;
            let n: f64 = text
                .parse()
                .map_err(|_| DecodeError::InvalidDouble(text.to_string()))?;
            Ok(Some(Value::Double(n)))
        }
        None => Ok(None),
    }
}

fn parse_boolean(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    match read_line(cur)? {
        Some(line) => match line {
            b"t" => Ok(Some(Value::Boolean(true))),
            b"f" => Ok(Some(Value::Boolean(false))),
            other => Err(DecodeError::InvalidBoolean(other.to_vec())),
        },
        None => Ok(None),
    }
}

fn parse_integer_line(cur: &mut Cursor<&[u8]>) -> Result<Option<i64>, DecodeError> {
    match read_line(cur)? {
        Some(line) => {
            let text = std::str::from_utf8(line)
                .map_err(|_| DecodeError::InvalidInteger("non-UTF8 integer".into()))?;
            text.parse::<i64>()
                .map(Some)
                .map_err(|_| DecodeError::InvalidInteger(text.to_string()))
        }
        None => Ok(None),
    }
}

/// Reads a length header line. Negative lengths are rejected as a protocol
/// error: RESP3 has no negative-length null encoding, unlike RESP2's `-1`
/// bulk string convention.
fn parse_length(cur: &mut Cursor<&[u8]>, what: &'static str) -> Result<Option<i64>, DecodeError> {
    match read_line(cur)? {
        Some(line) => {
            let text = std::str::from_utf8(line)
                .map_err(|_| DecodeError::InvalidLength(format!("non-UTF8 {what} length")))?;
            let n: i64 = text
                .parse()
                .map_err(|_| DecodeError::InvalidLength(text.to_string()))?;
            if n < 0 {
                return Err(DecodeError::NegativeLength(what));
            }
            Ok(Some(n))
        }
        None => Ok(None),
    }
}

fn parse_n_children(cur: &mut Cursor<&[u8]>, what: &'static str) -> Result<Option<usize>, DecodeError> {
    Ok(parse_length(cur, what)?.map(|n| n as usize))
}

fn parse_children(cur: &mut Cursor<&[u8]>, n: usize) -> Result<Option<Vec<Value>>, DecodeError> {
    // `n` comes straight off the wire's length header and is not yet backed
    // by any confirmed bytes, so this grows one push at a time instead of
    // preallocating: a malformed header claiming billions of elements must
    // surface as incomplete/protocol-error input, not an allocation abort.
    let mut items = Vec::new();
    for _ in 0..n {
        match parse_value(cur)? {
            Some(v) => items.push(v),
            None => return Ok(None),
        }
    }
    Ok(Some(items))
}

fn parse_map(cur: &mut Cursor<&[u8]>) -> Result<Option<Value>, DecodeError> {
    let n = match parse_length(cur, "map")? {
        Some(n) => n as usize,
        None => return Ok(None),
    };
    match parse_children(cur, n * 2)? {
        Some(flat) => {
            let mut pairs = Vec::new();
            let mut it = flat.into_iter();
            while let (Some(k), Some(v)) = (it.next(), it.next()) {
                pairs.push((k, v));
            }
            Ok(Some(Value::Map(pairs)))
        }
        None => Ok(None),
    }
}

fn parse_blob(cur: &mut Cursor<&[u8]>) -> Result<Option<Bytes>, DecodeError> {
    let len = match parse_length(cur, "blob")? {
        Some(n) => n as usize,
        None => return Ok(None),
    };
    let payload = match read_exact(cur, len) {
        Some(p) => p,
        None => return Ok(None),
    };
    let payload = to_bytes(payload);
    match read_exact(cur, 2) {
        Some(b"\r\n") => Ok(Some(payload)),
        Some(_) => Err(DecodeError::MissingTrailingCrlf),
        None => Ok(None),
    }
}

fn split_code_message(line: &[u8]) -> (Bytes, Bytes) {
    match line.iter().position(|&b| b == b' ') {
        Some(idx) => (to_bytes(&line[..idx]), to_bytes(&line[idx + 1..])),
        None => (to_bytes(line), Bytes::new()),
    }
}

fn to_bytes(data: &[u8]) -> Bytes {
    Bytes::copy_from_slice(data)
}

fn read_byte(cur: &mut Cursor<&[u8]>) -> Option<u8> {
    let pos = cur.position() as usize;
    let data = cur.get_ref();
    if pos >= data.len() {
        return None;
    }
    cur.set_position((pos + 1) as u64);
    Some(data[pos])
}

fn read_exact<'a>(cur: &mut Cursor<&'a [u8]>, n: usize) -> Option<&'a [u8]> {
    let pos = cur.position() as usize;
    let data = cur.get_ref();
    if data.len() - pos < n {
        return None;
    }
    cur.set_position((pos + n) as u64);
    Some(&data[pos..pos + n])
}

/// Reads from the current position up to (exclusive) the first CRLF,
/// consuming the CRLF itself. Returns `Ok(None)` if no CRLF is present yet.
fn read_line<'a>(cur: &mut Cursor<&'a [u8]>) -> Result<Option<&'a [u8]>, DecodeError> {
    let pos = cur.position() as usize;
    let data = cur.get_ref();
    let rest = &data[pos..];
    match rest.windows(2).position(|w| w == b"\r\n") {
        Some(idx) => {
            cur.set_position((pos + idx + 2) as u64);
            Ok(Some(&rest[..idx]))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Value {
        let mut decoder = Resp3Decoder::new();
        decoder.feed(input);
        decoder.get_object().unwrap().expect("expected a complete value")
    }

    #[test]
    fn simple_string() {
        assert_eq!(decode_all(b"+PONG\r\n"), Value::SimpleString(Bytes::from_static(b"PONG")));
    }

    #[test]
    fn simple_error_split_on_first_space() {
        let v = decode_all(b"-ERR unknown command 'NOT'\r\n");
        match v {
            Value::SimpleError { code, message } => {
                assert_eq!(code, Bytes::from_static(b"ERR"));
                assert_eq!(message, Bytes::from_static(b"unknown command 'NOT'"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn integer() {
        assert_eq!(decode_all(b":-42\r\n"), Value::Integer(-42));
    }

    #[test]
    fn blob_string() {
        assert_eq!(decode_all(b"$5\r\nhello\r\n"), Value::BlobString(Bytes::from_static(b"hello")));
    }

    #[test]
    fn blob_string_empty() {
        assert_eq!(decode_all(b"$0\r\n\r\n"), Value::BlobString(Bytes::new()));
    }

    #[test]
    fn null() {
        assert_eq!(decode_all(b"_\r\n"), Value::Null);
    }

    #[test]
    fn boolean_true_false() {
        assert_eq!(decode_all(b"#t\r\n"), Value::Boolean(true));
        assert_eq!(decode_all(b"#f\r\n"), Value::Boolean(false));
    }

    #[test]
    fn boolean_invalid_is_protocol_error() {
        let mut decoder = Resp3Decoder::new();
        decoder.feed(b"#x\r\n");
        assert!(matches!(decoder.get_object(), Err(DecodeError::InvalidBoolean(_))));
    }

    #[test]
    fn double_values() {
        assert_eq!(decode_all(b",1.2\r\n"), Value::Double(1.2));
        assert_eq!(decode_all(b",inf\r\n"), Value::Double(f64::INFINITY));
        assert_eq!(decode_all(b",-inf\r\n"), Value::Double(f64::NEG_INFINITY));
        assert!(matches!(decode_all(b",nan\r\n"), Value::Double(n) if n.is_nan()));
    }

    #[test]
    fn big_number() {
        assert_eq!(
            decode_all(b"(3492890328409238509324850943850943825024385\r\n"),
            Value::BigNumber(BigInt::parse_bytes(b"3492890328409238509324850943850943825024385", 10).unwrap())
        );
    }

    #[test]
    fn verbatim_string() {
        let v = decode_all(b"=15\r\ntxt:Some string\r\n");
        match v {
            Value::VerbatimString { format, data } => {
                assert_eq!(&format, b"txt");
                assert_eq!(data, Bytes::from_static(b"Some string"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn array_of_mixed_values() {
        let v = decode_all(b"*2\r\n:1\r\n+two\r\n");
        assert_eq!(
            v,
            Value::Array(vec![Value::Integer(1), Value::SimpleString(Bytes::from_static(b"two"))])
        );
    }

    #[test]
    fn empty_array() {
        assert_eq!(decode_all(b"*0\r\n"), Value::Array(vec![]));
    }

    #[test]
    fn set_tag() {
        assert_eq!(
            decode_all(b"~2\r\n:1\r\n:2\r\n"),
            Value::Set(vec![Value::Integer(1), Value::Integer(2)])
        );
    }

    #[test]
    fn map_preserves_order_and_pairs_keys_with_values() {
        let v = decode_all(b"%2\r\n+a\r\n:1\r\n+b\r\n:2\r\n");
        assert_eq!(
            v,
            Value::Map(vec![
                (Value::SimpleString(Bytes::from_static(b"a")), Value::Integer(1)),
                (Value::SimpleString(Bytes::from_static(b"b")), Value::Integer(2)),
            ])
        );
    }

    #[test]
    fn push_is_distinguished_only_by_tag() {
        let v = decode_all(b">2\r\n+subscribe\r\n:1\r\n");
        assert_eq!(v.push_kind(), Some(b"subscribe".as_slice()));
        match v {
            Value::Push(items) => assert_eq!(items.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn nested_map_in_array() {
        let v = decode_all(b"*1\r\n%1\r\n+k\r\n:7\r\n");
        assert_eq!(
            v,
            Value::Array(vec![Value::Map(vec![(
                Value::SimpleString(Bytes::from_static(b"k")),
                Value::Integer(7)
            )])])
        );
    }

    #[test]
    fn negative_length_is_rejected() {
        let mut decoder = Resp3Decoder::new();
        decoder.feed(b"$-1\r\n");
        assert!(matches!(decoder.get_object(), Err(DecodeError::NegativeLength("blob"))));
    }

    #[test]
    fn unknown_tag_is_protocol_error() {
        let mut decoder = Resp3Decoder::new();
        decoder.feed(b"?garbage\r\n");
        assert!(matches!(decoder.get_object(), Err(DecodeError::UnknownTag(b'?'))));
    }

    #[test]
    fn huge_array_length_header_yields_incomplete_not_an_allocation_abort() {
        // A corrupted or hostile length header must not be taken as a hint
        // to preallocate; with only the header bytes fed, this must report
        // Incomplete (more children needed) rather than trying to reserve
        // billions of Value slots up front.
        let mut decoder = Resp3Decoder::new();
        decoder.feed(b"*4000000000\r\n:1\r\n");
        assert_eq!(decoder.get_object().unwrap(), None);
    }

    #[test]
    fn incomplete_then_resumes_byte_at_a_time() {
        let message = b"*2\r\n$5\r\nhello\r\n:9\r\n";
        let mut decoder = Resp3Decoder::new();
        for &byte in &message[..message.len() - 1] {
            decoder.feed(&[byte]);
            assert_eq!(decoder.get_object().unwrap(), None);
        }
        decoder.feed(&message[message.len() - 1..]);
        let v = decoder.get_object().unwrap().unwrap();
        assert_eq!(
            v,
            Value::Array(vec![Value::BlobString(Bytes::from_static(b"hello")), Value::Integer(9)])
        );
    }

    #[test]
    fn buffer_conservation_leaves_remainder_untouched() {
        let mut decoder = Resp3Decoder::new();
        decoder.feed(b"+PONG\r\n:7\r\n");
        let v = decoder.get_object().unwrap().unwrap();
        assert_eq!(v, Value::SimpleString(Bytes::from_static(b"PONG")));
        assert_eq!(decoder.get_object().unwrap().unwrap(), Value::Integer(7));
        assert!(decoder.is_empty());
    }

    #[test]
    fn whole_message_vs_trickled_chunks_agree() {
        let message: &[u8] = b"%7\r\n$6\r\nserver\r\n$5\r\nredis\r\n$7\r\nversion\r\n$5\r\n6.0.5\r\n$5\r\nproto\r\n:3\r\n$2\r\nid\r\n:628\r\n$4\r\nmode\r\n$10\r\nstandalone\r\n$4\r\nrole\r\n$6\r\nmaster\r\n$7\r\nmodules\r\n*0\r\n";

        let mut bulk = Resp3Decoder::new();
        bulk.feed(message);
        let whole = bulk.get_object().unwrap().unwrap();

        let mut trickled = Resp3Decoder::new();
        let mut last = None;
        for &byte in message {
            trickled.feed(&[byte]);
            last = trickled.get_object().unwrap();
        }
        assert_eq!(Some(whole), last);
    }
}
