// Storage module - the abstract store the dispatcher consumes

use crate::protocol::Reply;
use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Current timestamp in milliseconds
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The type a key carries inside one database. A key holds at most one of
/// these at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Kv,
    HashField,
    SetElement,
    ZSetElementScore,
    ListMeta,
    TableMeta,
    None,
}

impl KeyType {
    /// The name the TYPE command reports.
    pub fn type_name(&self) -> &'static str {
        match self {
            KeyType::Kv => "string",
            KeyType::HashField => "hash",
            KeyType::SetElement => "set",
            KeyType::ZSetElementScore => "zset",
            KeyType::ListMeta => "list",
            KeyType::TableMeta => "table",
            KeyType::None => "none",
        }
    }
}

/// Logical value carrier returned from the store.
///
/// Values are canonically stringified whenever they cross the RESP boundary
/// as a bulk string.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Empty,
    Int(i64),
    Double(f64),
    Bytes(Bytes),
}

impl Value {
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Value::Empty => Bytes::new(),
            Value::Int(i) => Bytes::from(i.to_string()),
            Value::Double(d) => Bytes::from(crate::protocol::format_double(*d)),
            Value::Bytes(b) => b.clone(),
        }
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Reply {
        match value {
            Value::Empty => Reply::Nil,
            Value::Int(i) => Reply::bulk(i.to_string()),
            Value::Double(d) => Reply::Double(d),
            Value::Bytes(b) => Reply::BulkString(b),
        }
    }
}

/// Typed form of the engine's negative-sentinel return convention: lookups
/// and numeric conversions report absence and type mismatches through these
/// variants so handlers can emit RESP errors uniformly.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("key or field not found")]
    NotFound,

    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("value is not an integer or out of range")]
    NotInteger,

    #[error("value is not a float or out of range")]
    NotFloat,
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Precondition flag for SET: the tri-valued NX/XX option.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    /// Set only if the key does not exist (NX)
    IfAbsent,
    /// No precondition
    Any,
    /// Set only if the key already exists (XX)
    IfPresent,
}

/// BITOP operator keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    And,
    Or,
    Xor,
    Not,
}

impl BitOp {
    pub fn parse(raw: &[u8]) -> Option<BitOp> {
        if raw.eq_ignore_ascii_case(b"and") {
            Some(BitOp::And)
        } else if raw.eq_ignore_ascii_case(b"or") {
            Some(BitOp::Or)
        } else if raw.eq_ignore_ascii_case(b"xor") {
            Some(BitOp::Xor)
        } else if raw.eq_ignore_ascii_case(b"not") {
            Some(BitOp::Not)
        } else {
            None
        }
    }
}

/// The ordered key-value engine behind the command layer.
///
/// Every operation addresses one logical database named by a short byte
/// string. Implementations provide their own internal synchronization; the
/// command layer never holds state across calls other than the
/// `multi`/`exec`/`discard` bracket.
pub trait Store: Send + Sync {
    // -- keyspace ---------------------------------------------------------

    fn key_type(&self, db: &[u8], key: &[u8]) -> KeyType;
    fn exists(&self, db: &[u8], key: &[u8]) -> bool;
    /// Delete keys; returns how many were actually removed.
    fn del(&self, db: &[u8], keys: &[Bytes]) -> i64;
    /// Set an absolute expiry in milliseconds; false if the key is absent.
    fn expire_at(&self, db: &[u8], key: &[u8], at_ms: u64) -> bool;
    /// Drop any expiry; true if one was removed.
    fn persist(&self, db: &[u8], key: &[u8]) -> bool;

    // -- strings ----------------------------------------------------------

    fn get(&self, db: &[u8], key: &[u8]) -> StoreResult<Bytes>;
    fn set(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<()>;
    /// SET with optional expiry (seconds or milliseconds; zero means none)
    /// and precondition. Returns false when the precondition is unmet.
    fn set_with_options(
        &self,
        db: &[u8],
        key: &[u8],
        value: &[u8],
        ex_secs: u64,
        px_millis: u64,
        condition: SetCondition,
    ) -> StoreResult<bool>;
    fn set_ex(&self, db: &[u8], key: &[u8], value: &[u8], secs: u32) -> StoreResult<()>;
    fn pset_ex(&self, db: &[u8], key: &[u8], value: &[u8], millis: u32) -> StoreResult<()>;
    fn set_nx(&self, db: &[u8], key: &[u8], value: &[u8]) -> i64;
    fn set_range(&self, db: &[u8], key: &[u8], offset: i32, value: &[u8]) -> StoreResult<i64>;
    fn append(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<i64>;
    fn strlen(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    fn get_range(&self, db: &[u8], key: &[u8], start: i32, end: i32) -> StoreResult<Bytes>;
    fn get_set(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<Bytes>;
    fn mget(&self, db: &[u8], keys: &[Bytes]) -> Vec<Value>;
    fn mset(&self, db: &[u8], pairs: &[(Bytes, Bytes)]);
    /// Set all pairs only if none of the keys exist; returns 1 when applied.
    fn mset_nx(&self, db: &[u8], pairs: &[(Bytes, Bytes)]) -> i64;
    fn incr(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    fn decr(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    fn incr_by(&self, db: &[u8], key: &[u8], delta: i64) -> StoreResult<i64>;
    fn decr_by(&self, db: &[u8], key: &[u8], delta: i64) -> StoreResult<i64>;
    fn incr_by_float(&self, db: &[u8], key: &[u8], delta: f64) -> StoreResult<f64>;

    // -- bit operations ---------------------------------------------------

    fn get_bit(&self, db: &[u8], key: &[u8], offset: i32) -> StoreResult<i64>;
    /// Set the bit at `offset`; returns the previous bit value.
    fn set_bit(&self, db: &[u8], key: &[u8], offset: i32, value: bool) -> StoreResult<i64>;
    fn bit_count(&self, db: &[u8], key: &[u8], start: i32, end: i32) -> StoreResult<i64>;
    /// Combine sources into `dest`; returns the length of the stored result.
    fn bit_op(&self, db: &[u8], op: BitOp, dest: &[u8], sources: &[Bytes]) -> StoreResult<i64>;

    // -- hashes -----------------------------------------------------------

    /// Returns true when the field was newly created.
    fn hset(&self, db: &[u8], key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<bool>;
    fn hset_nx(&self, db: &[u8], key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64>;
    fn hget(&self, db: &[u8], key: &[u8], field: &[u8]) -> StoreResult<Bytes>;
    fn hmset(&self, db: &[u8], key: &[u8], pairs: &[(Bytes, Bytes)]) -> StoreResult<()>;
    fn hmget(&self, db: &[u8], key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Value>>;
    fn hgetall(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<(Bytes, Value)>>;
    fn hkeys(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Bytes>>;
    fn hvals(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Bytes>>;
    fn hlen(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    fn hexists(&self, db: &[u8], key: &[u8], field: &[u8]) -> StoreResult<i64>;
    fn hdel(&self, db: &[u8], key: &[u8], fields: &[Bytes]) -> StoreResult<i64>;
    fn hincr_by(&self, db: &[u8], key: &[u8], field: &[u8], delta: i64) -> StoreResult<i64>;
    fn hincr_by_float(&self, db: &[u8], key: &[u8], field: &[u8], delta: f64) -> StoreResult<f64>;

    // -- sets -------------------------------------------------------------

    fn sadd(&self, db: &[u8], key: &[u8], members: &[Bytes]) -> StoreResult<i64>;
    fn scard(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    fn sis_member(&self, db: &[u8], key: &[u8], member: &[u8]) -> StoreResult<i64>;
    fn smembers(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Value>>;
    fn smove(&self, db: &[u8], src: &[u8], dst: &[u8], member: &[u8]) -> StoreResult<i64>;
    fn spop(&self, db: &[u8], key: &[u8]) -> StoreResult<Bytes>;
    /// `count >= 0` returns up to `count` distinct members; a negative count
    /// allows repeats.
    fn srand_member(&self, db: &[u8], key: &[u8], count: i32) -> StoreResult<Vec<Value>>;
    fn srem(&self, db: &[u8], key: &[u8], members: &[Bytes]) -> StoreResult<i64>;
    fn sdiff(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>>;
    fn sdiff_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64>;
    fn sinter(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>>;
    fn sinter_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64>;
    fn sunion(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>>;
    fn sunion_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64>;

    // -- sorted sets ------------------------------------------------------

    /// Returns true when the member was newly added.
    fn zadd(&self, db: &[u8], key: &[u8], score: f64, member: &[u8]) -> StoreResult<bool>;
    fn zcard(&self, db: &[u8], key: &[u8]) -> StoreResult<i64>;
    /// `min`/`max` accept `-inf`, `+inf` and the `(` exclusive prefix.
    fn zcount(&self, db: &[u8], key: &[u8], min: &[u8], max: &[u8]) -> StoreResult<i64>;
    fn zincr_by(&self, db: &[u8], key: &[u8], delta: f64, member: &[u8]) -> StoreResult<f64>;
    /// Members ordered by score; with `with_scores` the result alternates
    /// member and score.
    fn zrange(
        &self,
        db: &[u8],
        key: &[u8],
        start: i32,
        stop: i32,
        with_scores: bool,
    ) -> StoreResult<Vec<Value>>;
    fn zscore(&self, db: &[u8], key: &[u8], member: &[u8]) -> StoreResult<f64>;

    // -- batch bracketing -------------------------------------------------

    /// Open a staging bracket for the calling worker; mutations it issues
    /// before `exec` commit together in issue order. Brackets opened by other
    /// workers on the same database stay independent.
    fn multi(&self, db: &[u8]);
    fn exec(&self, db: &[u8]);
    /// Drop the calling worker's staged mutations.
    fn discard(&self, db: &[u8]);
}
