// Protocol module - reply model, frame decoder and reply encoder

use bytes::Bytes;
use std::io::Cursor;
use thiserror::Error;

pub mod parser;
pub mod serializer;

pub use parser::{CommandFrame, RespParser};
pub use serializer::RespSerializer;

/// A reply tree, built by command handlers and serialized by [`RespSerializer`].
///
/// `Unset` is the cleared-slot sentinel: a handler that leaves the slot in this
/// state produces no bytes on the wire. `Double` is an internal variant that
/// serializes as a bulk string after formatting.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Cleared slot; never serialized.
    Unset,
    /// Null bulk string: $-1\r\n
    Nil,
    /// Status token: +OK\r\n
    SimpleString(String),
    /// Error: -ERR unknown command\r\n
    Error(String),
    /// Integer: :1000\r\n
    Integer(i64),
    /// Bulk string: $6\r\nfoobar\r\n
    BulkString(Bytes),
    /// Formatted to at most 9 fractional digits, then emitted as a bulk string
    Double(f64),
    /// Array: *2\r\n... (elements may be Nil)
    Array(Vec<Reply>),
}

impl Reply {
    pub fn status(s: impl Into<String>) -> Reply {
        Reply::SimpleString(s.into())
    }

    pub fn error(s: impl Into<String>) -> Reply {
        Reply::Error(s.into())
    }

    pub fn integer(v: i64) -> Reply {
        Reply::Integer(v)
    }

    pub fn bulk(data: impl Into<Bytes>) -> Reply {
        Reply::BulkString(data.into())
    }

    pub fn double(v: f64) -> Reply {
        Reply::Double(v)
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, Reply::Unset)
    }

    /// Reset the slot to the cleared state.
    pub fn clear(&mut self) {
        *self = Reply::Unset;
    }
}

/// Format a double the way it crosses the RESP boundary: at most nine
/// significant digits in the `%.9g` layout, trailing zeros trimmed, exponent
/// notation for magnitudes outside the fixed range.
pub fn format_double(v: f64) -> String {
    if v.is_nan() {
        return "nan".to_string();
    }
    if v.is_infinite() {
        return if v > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if v == 0.0 {
        return "0".to_string();
    }

    // Round to nine significant digits through scientific notation, then lay
    // the digits out by the %g rule.
    let sci = format!("{v:.8e}");
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let mut digits: String = mantissa.chars().filter(|c| c.is_ascii_digit()).collect();
    while digits.len() > 1 && digits.ends_with('0') {
        digits.pop();
    }

    let mut out = String::new();
    if mantissa.starts_with('-') {
        out.push('-');
    }
    if !(-4..9).contains(&exponent) {
        out.push_str(&digits[..1]);
        if digits.len() > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        out.push(if exponent >= 0 { '+' } else { '-' });
        let magnitude = exponent.unsigned_abs();
        if magnitude < 10 {
            out.push('0');
        }
        out.push_str(&magnitude.to_string());
    } else if exponent >= 0 {
        let int_len = exponent as usize + 1;
        if digits.len() <= int_len {
            out.push_str(&digits);
            out.push_str(&"0".repeat(int_len - digits.len()));
        } else {
            out.push_str(&digits[..int_len]);
            out.push('.');
            out.push_str(&digits[int_len..]);
        }
    } else {
        out.push_str("0.");
        out.push_str(&"0".repeat((-exponent - 1) as usize));
        out.push_str(&digits);
    }
    out
}

#[derive(Error, Debug)]
pub enum RespError {
    #[error("Incomplete data")]
    Incomplete,

    #[error("Invalid protocol: {0}")]
    InvalidProtocol(String),

    #[error("Invalid integer: {0}")]
    InvalidInteger(String),

    #[error("Invalid bulk string length")]
    InvalidBulkStringLength,

    #[error("Invalid multi bulk length")]
    InvalidMultiBulkLength,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RespError>;

/// Helper function to find CRLF in buffer
pub(crate) fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

/// Helper function to read a line from cursor
pub(crate) fn read_line<'a>(cursor: &mut Cursor<&'a [u8]>) -> Result<&'a [u8]> {
    let start = cursor.position() as usize;
    let slice = &cursor.get_ref()[start..];

    let end = find_crlf(slice).ok_or(RespError::Incomplete)?;

    cursor.set_position((start + end + 2) as u64);
    Ok(&slice[..end])
}

/// Helper function to parse integer from bytes
pub(crate) fn parse_integer(buf: &[u8]) -> Result<i64> {
    let s = std::str::from_utf8(buf)
        .map_err(|_| RespError::InvalidInteger("Invalid UTF-8".to_string()))?;
    s.parse::<i64>()
        .map_err(|_| RespError::InvalidInteger(s.to_string()))
}
