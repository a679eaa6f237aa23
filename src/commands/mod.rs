// Commands module - handler table, dispatcher and per-family handlers

use crate::protocol::Reply;
use crate::storage::Value;
use bytes::Bytes;

pub mod bitmap;
pub mod dispatcher;
pub mod hash;
pub mod key;
pub mod server_cmds;
pub mod set;
pub mod string;
pub mod zset;

pub use dispatcher::{CommandDispatcher, ConnContext, HandlerFlow};

// Canonical error strings; these are byte-exact for client compatibility.
pub(crate) const MSG_NOT_INTEGER: &str = "ERR value is not an integer or out of range";
pub(crate) const MSG_NOT_FLOAT: &str = "ERR value is not a float or out of range";
pub(crate) const MSG_NOT_BIT: &str = "ERR bit is not an integer or out of range";
pub(crate) const MSG_SYNTAX: &str = "ERR syntax error";
pub(crate) const MSG_WRONG_TYPE: &str =
    "WRONGTYPE Operation against a key holding the wrong kind of value";

/// Lowercase a raw argument for keyword comparison.
pub(crate) fn lowercase(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_lowercase()
}

// Argument parse vocabulary. All of these reject empty input, surrounding
// whitespace, out-of-range values and any non-decimal prefix other than a
// single leading minus sign.

pub(crate) fn to_i64(raw: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(raw).ok()?;
    if s.is_empty() || s.starts_with('+') {
        return None;
    }
    s.parse().ok()
}

pub(crate) fn to_i32(raw: &[u8]) -> Option<i32> {
    let s = std::str::from_utf8(raw).ok()?;
    if s.is_empty() || s.starts_with('+') {
        return None;
    }
    s.parse().ok()
}

pub(crate) fn to_u32(raw: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(raw).ok()?;
    if s.is_empty() || s.starts_with('+') {
        return None;
    }
    s.parse().ok()
}

/// Floats additionally accept `inf`; NaN is rejected.
pub(crate) fn to_f64(raw: &[u8]) -> Option<f64> {
    let s = std::str::from_utf8(raw).ok()?;
    if s.is_empty() {
        return None;
    }
    let v: f64 = s.parse().ok()?;
    if v.is_nan() {
        return None;
    }
    Some(v)
}

/// Aggregate store results as a reply array; `Empty` values become Nil.
pub(crate) fn values_reply(values: Vec<Value>) -> Reply {
    Reply::Array(values.into_iter().map(Reply::from).collect())
}

pub(crate) fn blobs_reply(items: Vec<Bytes>) -> Reply {
    Reply::Array(items.into_iter().map(Reply::BulkString).collect())
}
