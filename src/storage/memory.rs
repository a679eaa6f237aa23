// In-memory ordered engine

use super::{now_ms, BitOp, KeyType, SetCondition, Store, StoreError, StoreResult, Value};
use bytes::Bytes;
use dashmap::DashMap;
use ordered_float::OrderedFloat;
use rand::seq::IteratorRandom;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, ThreadId};

/// Ordered in-memory engine. Databases are created on demand and identified
/// by a short byte string; each one is an ordered byte-keyed namespace with a
/// lazily-checked expiry table.
pub struct MemoryStore {
    databases: DashMap<Bytes, Arc<MemoryDb>>,
}

#[derive(Default)]
struct MemoryDb {
    map: RwLock<Namespace>,
    /// Open multi/exec brackets, keyed by the worker thread that opened them.
    /// A bracket opens and closes inside one synchronous handler call, so it
    /// never leaves its thread and concurrent brackets stay independent.
    brackets: Mutex<HashMap<ThreadId, Vec<StagedWrite>>>,
}

impl MemoryDb {
    fn read(&self) -> RwLockReadGuard<'_, Namespace> {
        self.map.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Namespace> {
        self.map.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn brackets(&self) -> MutexGuard<'_, HashMap<ThreadId, Vec<StagedWrite>>> {
        self.brackets.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct Namespace {
    records: BTreeMap<Bytes, Record>,
    /// Absolute expiry timestamps in milliseconds
    expires: HashMap<Bytes, u64>,
}

enum Record {
    String(Bytes),
    Hash(BTreeMap<Bytes, Bytes>),
    Set(BTreeSet<Bytes>),
    ZSet(ZSet),
}

/// Score-ordered index plus a member index for O(log n) range walks and
/// O(1) score lookups.
#[derive(Default)]
struct ZSet {
    scores: BTreeMap<(OrderedFloat<f64>, Bytes), ()>,
    members: HashMap<Bytes, f64>,
}

impl ZSet {
    /// Insert or update a member; returns true when it is new.
    fn insert(&mut self, member: Bytes, score: f64) -> bool {
        match self.members.insert(member.clone(), score) {
            Some(old) => {
                self.scores.remove(&(OrderedFloat(old), member.clone()));
                self.scores.insert((OrderedFloat(score), member), ());
                false
            }
            None => {
                self.scores.insert((OrderedFloat(score), member), ());
                true
            }
        }
    }

    fn len(&self) -> usize {
        self.members.len()
    }
}

/// One mutation staged between `multi` and `exec`.
enum StagedWrite {
    ZAdd {
        key: Bytes,
        score: f64,
        member: Bytes,
    },
}

impl Namespace {
    fn is_expired(&self, key: &[u8]) -> bool {
        self.expires.get(key).is_some_and(|&at| now_ms() >= at)
    }

    /// Look up a record, treating expired keys as absent.
    fn live(&self, key: &[u8]) -> Option<&Record> {
        if self.is_expired(key) {
            return None;
        }
        self.records.get(key)
    }

    /// Drop a key that has passed its expiry so mutators see a fresh slot.
    fn prune(&mut self, key: &[u8]) {
        if self.is_expired(key) {
            self.records.remove(key);
            self.expires.remove(key);
        }
    }

    fn remove(&mut self, key: &[u8]) -> bool {
        self.expires.remove(key);
        self.records.remove(key).is_some()
    }

    fn insert_string(&mut self, key: &[u8], value: &[u8]) {
        self.records.insert(
            Bytes::copy_from_slice(key),
            Record::String(Bytes::copy_from_slice(value)),
        );
    }

    fn string(&self, key: &[u8]) -> StoreResult<Option<&Bytes>> {
        match self.live(key) {
            None => Ok(None),
            Some(Record::String(b)) => Ok(Some(b)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn hash(&self, key: &[u8]) -> StoreResult<Option<&BTreeMap<Bytes, Bytes>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Record::Hash(h)) => Ok(Some(h)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn set(&self, key: &[u8]) -> StoreResult<Option<&BTreeSet<Bytes>>> {
        match self.live(key) {
            None => Ok(None),
            Some(Record::Set(s)) => Ok(Some(s)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn zset(&self, key: &[u8]) -> StoreResult<Option<&ZSet>> {
        match self.live(key) {
            None => Ok(None),
            Some(Record::ZSet(z)) => Ok(Some(z)),
            Some(_) => Err(StoreError::WrongType),
        }
    }

    fn hash_entry(&mut self, key: &[u8]) -> StoreResult<&mut BTreeMap<Bytes, Bytes>> {
        self.prune(key);
        let record = self
            .records
            .entry(Bytes::copy_from_slice(key))
            .or_insert_with(|| Record::Hash(BTreeMap::new()));
        match record {
            Record::Hash(h) => Ok(h),
            _ => Err(StoreError::WrongType),
        }
    }

    fn set_entry(&mut self, key: &[u8]) -> StoreResult<&mut BTreeSet<Bytes>> {
        self.prune(key);
        let record = self
            .records
            .entry(Bytes::copy_from_slice(key))
            .or_insert_with(|| Record::Set(BTreeSet::new()));
        match record {
            Record::Set(s) => Ok(s),
            _ => Err(StoreError::WrongType),
        }
    }

    fn zset_entry(&mut self, key: &[u8]) -> StoreResult<&mut ZSet> {
        self.prune(key);
        let record = self
            .records
            .entry(Bytes::copy_from_slice(key))
            .or_insert_with(|| Record::ZSet(ZSet::default()));
        match record {
            Record::ZSet(z) => Ok(z),
            _ => Err(StoreError::WrongType),
        }
    }

    /// Clone a set value; a missing key reads as the empty set.
    fn set_snapshot(&self, key: &[u8]) -> StoreResult<BTreeSet<Bytes>> {
        Ok(self.set(key)?.cloned().unwrap_or_default())
    }
}

fn parse_stored_i64(raw: &[u8]) -> StoreResult<i64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(StoreError::NotInteger)
}

fn parse_stored_f64(raw: &[u8]) -> StoreResult<f64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or(StoreError::NotFloat)
}

/// Resolve possibly-negative inclusive range endpoints against a length.
fn normalize_range(len: usize, start: i32, end: i32) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }
    let len = len as i64;
    let mut start = start as i64;
    let mut end = end as i64;
    if start < 0 {
        start += len;
    }
    if end < 0 {
        end += len;
    }
    if start < 0 {
        start = 0;
    }
    if end >= len {
        end = len - 1;
    }
    if start > end || start >= len || end < 0 {
        return None;
    }
    Some((start as usize, end as usize))
}

/// One endpoint of a score range: `-inf`, `+inf`, a float, or `(float` for an
/// exclusive bound.
fn parse_score_bound(raw: &[u8]) -> StoreResult<(f64, bool)> {
    let s = std::str::from_utf8(raw).map_err(|_| StoreError::NotFloat)?;
    let (s, exclusive) = match s.strip_prefix('(') {
        Some(rest) => (rest, true),
        None => (s, false),
    };
    let value = if s.eq_ignore_ascii_case("-inf") {
        f64::NEG_INFINITY
    } else if s.eq_ignore_ascii_case("inf") || s.eq_ignore_ascii_case("+inf") {
        f64::INFINITY
    } else {
        let v: f64 = s.parse().map_err(|_| StoreError::NotFloat)?;
        if v.is_nan() {
            return Err(StoreError::NotFloat);
        }
        v
    };
    Ok((value, exclusive))
}

fn score_in_bounds(score: f64, min: (f64, bool), max: (f64, bool)) -> bool {
    let above = if min.1 { score > min.0 } else { score >= min.0 };
    let below = if max.1 { score < max.0 } else { score <= max.0 };
    above && below
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            databases: DashMap::new(),
        }
    }

    fn database(&self, id: &[u8]) -> Arc<MemoryDb> {
        if let Some(db) = self.databases.get(id) {
            return db.value().clone();
        }
        self.databases
            .entry(Bytes::copy_from_slice(id))
            .or_default()
            .value()
            .clone()
    }

    fn apply_int_delta(&self, db: &[u8], key: &[u8], delta: i64) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let current = match ns.string(key)? {
            Some(b) => parse_stored_i64(b)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(StoreError::NotInteger)?;
        ns.insert_string(key, next.to_string().as_bytes());
        Ok(next)
    }

    fn apply_zadd(ns: &mut Namespace, key: &[u8], score: f64, member: &[u8]) -> StoreResult<bool> {
        let zset = ns.zset_entry(key)?;
        Ok(zset.insert(Bytes::copy_from_slice(member), score))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    // -- keyspace ---------------------------------------------------------

    fn key_type(&self, db: &[u8], key: &[u8]) -> KeyType {
        let db = self.database(db);
        let ns = db.read();
        match ns.live(key) {
            Some(Record::String(_)) => KeyType::Kv,
            Some(Record::Hash(_)) => KeyType::HashField,
            Some(Record::Set(_)) => KeyType::SetElement,
            Some(Record::ZSet(_)) => KeyType::ZSetElementScore,
            None => KeyType::None,
        }
    }

    fn exists(&self, db: &[u8], key: &[u8]) -> bool {
        let db = self.database(db);
        let ns = db.read();
        ns.live(key).is_some()
    }

    fn del(&self, db: &[u8], keys: &[Bytes]) -> i64 {
        let db = self.database(db);
        let mut ns = db.write();
        let mut removed = 0;
        for key in keys {
            ns.prune(key);
            if ns.remove(key) {
                removed += 1;
            }
        }
        removed
    }

    fn expire_at(&self, db: &[u8], key: &[u8], at_ms: u64) -> bool {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        if !ns.records.contains_key(key) {
            return false;
        }
        ns.expires.insert(Bytes::copy_from_slice(key), at_ms);
        true
    }

    fn persist(&self, db: &[u8], key: &[u8]) -> bool {
        let db = self.database(db);
        let mut ns = db.write();
        if ns.is_expired(key) {
            ns.prune(key);
            return false;
        }
        ns.expires.remove(key).is_some()
    }

    // -- strings ----------------------------------------------------------

    fn get(&self, db: &[u8], key: &[u8]) -> StoreResult<Bytes> {
        let db = self.database(db);
        let ns = db.read();
        ns.string(key)?.cloned().ok_or(StoreError::NotFound)
    }

    fn set(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<()> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.insert_string(key, value);
        ns.expires.remove(key);
        Ok(())
    }

    fn set_with_options(
        &self,
        db: &[u8],
        key: &[u8],
        value: &[u8],
        ex_secs: u64,
        px_millis: u64,
        condition: SetCondition,
    ) -> StoreResult<bool> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let exists = ns.records.contains_key(key);
        match condition {
            SetCondition::IfAbsent if exists => return Ok(false),
            SetCondition::IfPresent if !exists => return Ok(false),
            _ => {}
        }
        ns.insert_string(key, value);
        let ttl_ms = if px_millis > 0 {
            px_millis
        } else {
            ex_secs.saturating_mul(1000)
        };
        if ttl_ms > 0 {
            ns.expires
                .insert(Bytes::copy_from_slice(key), now_ms().saturating_add(ttl_ms));
        } else {
            ns.expires.remove(key);
        }
        Ok(true)
    }

    fn set_ex(&self, db: &[u8], key: &[u8], value: &[u8], secs: u32) -> StoreResult<()> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.insert_string(key, value);
        ns.expires
            .insert(Bytes::copy_from_slice(key), now_ms() + u64::from(secs) * 1000);
        Ok(())
    }

    fn pset_ex(&self, db: &[u8], key: &[u8], value: &[u8], millis: u32) -> StoreResult<()> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.insert_string(key, value);
        ns.expires
            .insert(Bytes::copy_from_slice(key), now_ms() + u64::from(millis));
        Ok(())
    }

    fn set_nx(&self, db: &[u8], key: &[u8], value: &[u8]) -> i64 {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        if ns.records.contains_key(key) {
            return 0;
        }
        ns.insert_string(key, value);
        1
    }

    fn set_range(&self, db: &[u8], key: &[u8], offset: i32, value: &[u8]) -> StoreResult<i64> {
        if offset < 0 {
            return Err(StoreError::NotInteger);
        }
        let offset = offset as usize;
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut data = ns.string(key)?.map(|b| b.to_vec()).unwrap_or_default();
        if data.len() < offset + value.len() {
            data.resize(offset + value.len(), 0);
        }
        data[offset..offset + value.len()].copy_from_slice(value);
        let len = data.len() as i64;
        ns.records
            .insert(Bytes::copy_from_slice(key), Record::String(data.into()));
        Ok(len)
    }

    fn append(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut data = ns.string(key)?.map(|b| b.to_vec()).unwrap_or_default();
        data.extend_from_slice(value);
        let len = data.len() as i64;
        ns.records
            .insert(Bytes::copy_from_slice(key), Record::String(data.into()));
        Ok(len)
    }

    fn strlen(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.string(key)?.map_or(0, |b| b.len() as i64))
    }

    fn get_range(&self, db: &[u8], key: &[u8], start: i32, end: i32) -> StoreResult<Bytes> {
        let db = self.database(db);
        let ns = db.read();
        let Some(data) = ns.string(key)? else {
            return Ok(Bytes::new());
        };
        match normalize_range(data.len(), start, end) {
            Some((s, e)) => Ok(data.slice(s..=e)),
            None => Ok(Bytes::new()),
        }
    }

    fn get_set(&self, db: &[u8], key: &[u8], value: &[u8]) -> StoreResult<Bytes> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let old = ns.string(key)?.cloned();
        ns.insert_string(key, value);
        ns.expires.remove(key);
        old.ok_or(StoreError::NotFound)
    }

    fn mget(&self, db: &[u8], keys: &[Bytes]) -> Vec<Value> {
        let db = self.database(db);
        let ns = db.read();
        keys.iter()
            .map(|key| match ns.string(key) {
                Ok(Some(b)) => Value::Bytes(b.clone()),
                _ => Value::Empty,
            })
            .collect()
    }

    fn mset(&self, db: &[u8], pairs: &[(Bytes, Bytes)]) {
        let db = self.database(db);
        let mut ns = db.write();
        for (key, value) in pairs {
            ns.insert_string(key, value);
            ns.expires.remove(&key[..]);
        }
    }

    fn mset_nx(&self, db: &[u8], pairs: &[(Bytes, Bytes)]) -> i64 {
        let db = self.database(db);
        let mut ns = db.write();
        for (key, _) in pairs {
            ns.prune(key);
        }
        if pairs.iter().any(|(key, _)| ns.records.contains_key(&key[..])) {
            return 0;
        }
        for (key, value) in pairs {
            ns.insert_string(key, value);
        }
        1
    }

    fn incr(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        self.apply_int_delta(db, key, 1)
    }

    fn decr(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        self.apply_int_delta(db, key, -1)
    }

    fn incr_by(&self, db: &[u8], key: &[u8], delta: i64) -> StoreResult<i64> {
        self.apply_int_delta(db, key, delta)
    }

    fn decr_by(&self, db: &[u8], key: &[u8], delta: i64) -> StoreResult<i64> {
        let delta = delta.checked_neg().ok_or(StoreError::NotInteger)?;
        self.apply_int_delta(db, key, delta)
    }

    fn incr_by_float(&self, db: &[u8], key: &[u8], delta: f64) -> StoreResult<f64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let current = match ns.string(key)? {
            Some(b) => parse_stored_f64(b)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(StoreError::NotFloat);
        }
        ns.insert_string(key, crate::protocol::format_double(next).as_bytes());
        Ok(next)
    }

    // -- bit operations ---------------------------------------------------

    fn get_bit(&self, db: &[u8], key: &[u8], offset: i32) -> StoreResult<i64> {
        if offset < 0 {
            return Err(StoreError::NotInteger);
        }
        let db = self.database(db);
        let ns = db.read();
        let Some(data) = ns.string(key)? else {
            return Ok(0);
        };
        let byte = offset as usize / 8;
        if byte >= data.len() {
            return Ok(0);
        }
        Ok(i64::from((data[byte] >> (7 - offset as usize % 8)) & 1))
    }

    fn set_bit(&self, db: &[u8], key: &[u8], offset: i32, value: bool) -> StoreResult<i64> {
        if offset < 0 {
            return Err(StoreError::NotInteger);
        }
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut data = ns.string(key)?.map(|b| b.to_vec()).unwrap_or_default();
        let byte = offset as usize / 8;
        let shift = 7 - offset as usize % 8;
        if byte >= data.len() {
            data.resize(byte + 1, 0);
        }
        let old = i64::from((data[byte] >> shift) & 1);
        if value {
            data[byte] |= 1 << shift;
        } else {
            data[byte] &= !(1 << shift);
        }
        ns.records
            .insert(Bytes::copy_from_slice(key), Record::String(data.into()));
        Ok(old)
    }

    fn bit_count(&self, db: &[u8], key: &[u8], start: i32, end: i32) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        let Some(data) = ns.string(key)? else {
            return Ok(0);
        };
        match normalize_range(data.len(), start, end) {
            Some((s, e)) => Ok(data[s..=e]
                .iter()
                .map(|b| i64::from(b.count_ones() as u8))
                .sum()),
            None => Ok(0),
        }
    }

    fn bit_op(&self, db: &[u8], op: BitOp, dest: &[u8], sources: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let mut blobs = Vec::with_capacity(sources.len());
        for key in sources {
            blobs.push(ns.string(key)?.cloned().unwrap_or_default());
        }

        let result: Vec<u8> = match op {
            BitOp::Not => blobs
                .first()
                .map(|b| b.iter().map(|byte| !byte).collect())
                .unwrap_or_default(),
            _ => {
                let len = blobs.iter().map(|b| b.len()).max().unwrap_or(0);
                (0..len)
                    .map(|i| {
                        let mut bytes = blobs
                            .iter()
                            .map(|b| b.get(i).copied().unwrap_or(0));
                        let first = bytes.next().unwrap_or(0);
                        bytes.fold(first, |acc, b| match op {
                            BitOp::And => acc & b,
                            BitOp::Or => acc | b,
                            BitOp::Xor => acc ^ b,
                            BitOp::Not => acc,
                        })
                    })
                    .collect()
            }
        };

        let len = result.len() as i64;
        ns.remove(dest);
        if !result.is_empty() {
            ns.records
                .insert(Bytes::copy_from_slice(dest), Record::String(result.into()));
        }
        Ok(len)
    }

    // -- hashes -----------------------------------------------------------

    fn hset(&self, db: &[u8], key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<bool> {
        let db = self.database(db);
        let mut ns = db.write();
        let hash = ns.hash_entry(key)?;
        let previous = hash.insert(
            Bytes::copy_from_slice(field),
            Bytes::copy_from_slice(value),
        );
        Ok(previous.is_none())
    }

    fn hset_nx(&self, db: &[u8], key: &[u8], field: &[u8], value: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let hash = ns.hash_entry(key)?;
        if hash.contains_key(field) {
            return Ok(0);
        }
        hash.insert(
            Bytes::copy_from_slice(field),
            Bytes::copy_from_slice(value),
        );
        Ok(1)
    }

    fn hget(&self, db: &[u8], key: &[u8], field: &[u8]) -> StoreResult<Bytes> {
        let db = self.database(db);
        let ns = db.read();
        ns.hash(key)?
            .and_then(|h| h.get(field).cloned())
            .ok_or(StoreError::NotFound)
    }

    fn hmset(&self, db: &[u8], key: &[u8], pairs: &[(Bytes, Bytes)]) -> StoreResult<()> {
        let db = self.database(db);
        let mut ns = db.write();
        let hash = ns.hash_entry(key)?;
        for (field, value) in pairs {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    fn hmget(&self, db: &[u8], key: &[u8], fields: &[Bytes]) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        let hash = ns.hash(key)?;
        Ok(fields
            .iter()
            .map(|field| match hash.and_then(|h| h.get(&field[..])) {
                Some(v) => Value::Bytes(v.clone()),
                None => Value::Empty,
            })
            .collect())
    }

    fn hgetall(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<(Bytes, Value)>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns
            .hash(key)?
            .map(|h| {
                h.iter()
                    .map(|(f, v)| (f.clone(), Value::Bytes(v.clone())))
                    .collect()
            })
            .unwrap_or_default())
    }

    fn hkeys(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Bytes>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns
            .hash(key)?
            .map(|h| h.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn hvals(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Bytes>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns
            .hash(key)?
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default())
    }

    fn hlen(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.hash(key)?.map_or(0, |h| h.len() as i64))
    }

    fn hexists(&self, db: &[u8], key: &[u8], field: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns
            .hash(key)?
            .is_some_and(|h| h.contains_key(field)) as i64)
    }

    fn hdel(&self, db: &[u8], key: &[u8], fields: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut removed = 0;
        let emptied = match ns.records.get_mut(key) {
            None => return Ok(0),
            Some(Record::Hash(h)) => {
                for field in fields {
                    if h.remove(&field[..]).is_some() {
                        removed += 1;
                    }
                }
                h.is_empty()
            }
            Some(_) => return Err(StoreError::WrongType),
        };
        if emptied {
            ns.remove(key);
        }
        Ok(removed)
    }

    fn hincr_by(&self, db: &[u8], key: &[u8], field: &[u8], delta: i64) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let hash = ns.hash_entry(key)?;
        let current = match hash.get(field) {
            Some(v) => parse_stored_i64(v)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or(StoreError::NotInteger)?;
        hash.insert(
            Bytes::copy_from_slice(field),
            Bytes::from(next.to_string()),
        );
        Ok(next)
    }

    fn hincr_by_float(&self, db: &[u8], key: &[u8], field: &[u8], delta: f64) -> StoreResult<f64> {
        let db = self.database(db);
        let mut ns = db.write();
        let hash = ns.hash_entry(key)?;
        let current = match hash.get(field) {
            Some(v) => parse_stored_f64(v)?,
            None => 0.0,
        };
        let next = current + delta;
        if !next.is_finite() {
            return Err(StoreError::NotFloat);
        }
        hash.insert(
            Bytes::copy_from_slice(field),
            Bytes::from(crate::protocol::format_double(next)),
        );
        Ok(next)
    }

    // -- sets -------------------------------------------------------------

    fn sadd(&self, db: &[u8], key: &[u8], members: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let set = ns.set_entry(key)?;
        let mut added = 0;
        for member in members {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        Ok(added)
    }

    fn scard(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.set(key)?.map_or(0, |s| s.len() as i64))
    }

    fn sis_member(&self, db: &[u8], key: &[u8], member: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.set(key)?.is_some_and(|s| s.contains(member)) as i64)
    }

    fn smembers(&self, db: &[u8], key: &[u8]) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns
            .set(key)?
            .map(|s| s.iter().map(|m| Value::Bytes(m.clone())).collect())
            .unwrap_or_default())
    }

    fn smove(&self, db: &[u8], src: &[u8], dst: &[u8], member: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(src);
        ns.prune(dst);
        // Both ends must be sets (or absent) before anything moves.
        if !ns.set(src)?.is_some_and(|s| s.contains(member)) {
            ns.set(dst)?;
            return Ok(0);
        }
        ns.set(dst)?;
        let emptied = match ns.records.get_mut(src) {
            Some(Record::Set(s)) => {
                s.remove(member);
                s.is_empty()
            }
            _ => false,
        };
        if emptied {
            ns.remove(src);
        }
        let dst_set = ns.set_entry(dst)?;
        dst_set.insert(Bytes::copy_from_slice(member));
        Ok(1)
    }

    fn spop(&self, db: &[u8], key: &[u8]) -> StoreResult<Bytes> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut rng = rand::thread_rng();
        let picked = ns
            .set(key)?
            .and_then(|s| s.iter().choose(&mut rng).cloned())
            .ok_or(StoreError::NotFound)?;
        let emptied = match ns.records.get_mut(key) {
            Some(Record::Set(s)) => {
                s.remove(&picked);
                s.is_empty()
            }
            _ => false,
        };
        if emptied {
            ns.remove(key);
        }
        Ok(picked)
    }

    fn srand_member(&self, db: &[u8], key: &[u8], count: i32) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        let Some(set) = ns.set(key)? else {
            return Ok(Vec::new());
        };
        let mut rng = rand::thread_rng();
        let picked: Vec<Bytes> = if count >= 0 {
            set.iter()
                .choose_multiple(&mut rng, count as usize)
                .into_iter()
                .cloned()
                .collect()
        } else {
            (0..count.unsigned_abs())
                .filter_map(|_| set.iter().choose(&mut rng).cloned())
                .collect()
        };
        Ok(picked.into_iter().map(Value::Bytes).collect())
    }

    fn srem(&self, db: &[u8], key: &[u8], members: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        ns.prune(key);
        let mut removed = 0;
        let emptied = match ns.records.get_mut(key) {
            None => return Ok(0),
            Some(Record::Set(s)) => {
                for member in members {
                    if s.remove(&member[..]) {
                        removed += 1;
                    }
                }
                s.is_empty()
            }
            Some(_) => return Err(StoreError::WrongType),
        };
        if emptied {
            ns.remove(key);
        }
        Ok(removed)
    }

    fn sdiff(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(set_algebra(&ns, keys, SetOp::Diff)?
            .into_iter()
            .map(Value::Bytes)
            .collect())
    }

    fn sdiff_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let result = set_algebra(&ns, keys, SetOp::Diff)?;
        store_set(&mut ns, dest, result)
    }

    fn sinter(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(set_algebra(&ns, keys, SetOp::Inter)?
            .into_iter()
            .map(Value::Bytes)
            .collect())
    }

    fn sinter_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let result = set_algebra(&ns, keys, SetOp::Inter)?;
        store_set(&mut ns, dest, result)
    }

    fn sunion(&self, db: &[u8], keys: &[Bytes]) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        Ok(set_algebra(&ns, keys, SetOp::Union)?
            .into_iter()
            .map(Value::Bytes)
            .collect())
    }

    fn sunion_store(&self, db: &[u8], dest: &[u8], keys: &[Bytes]) -> StoreResult<i64> {
        let db = self.database(db);
        let mut ns = db.write();
        let result = set_algebra(&ns, keys, SetOp::Union)?;
        store_set(&mut ns, dest, result)
    }

    // -- sorted sets ------------------------------------------------------

    fn zadd(&self, db: &[u8], key: &[u8], score: f64, member: &[u8]) -> StoreResult<bool> {
        let db = self.database(db);
        let mut brackets = db.brackets();
        if let Some(staged) = brackets.get_mut(&thread::current().id()) {
            let ns = db.read();
            let in_store = match ns.zset(key)? {
                Some(z) => z.members.contains_key(member),
                None => false,
            };
            let in_batch = staged.iter().any(|op| {
                let StagedWrite::ZAdd {
                    key: k, member: m, ..
                } = op;
                k == key && m == member
            });
            staged.push(StagedWrite::ZAdd {
                key: Bytes::copy_from_slice(key),
                score,
                member: Bytes::copy_from_slice(member),
            });
            Ok(!in_store && !in_batch)
        } else {
            drop(brackets);
            let mut ns = db.write();
            Self::apply_zadd(&mut ns, key, score, member)
        }
    }

    fn zcard(&self, db: &[u8], key: &[u8]) -> StoreResult<i64> {
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.zset(key)?.map_or(0, |z| z.len() as i64))
    }

    fn zcount(&self, db: &[u8], key: &[u8], min: &[u8], max: &[u8]) -> StoreResult<i64> {
        let min = parse_score_bound(min)?;
        let max = parse_score_bound(max)?;
        let db = self.database(db);
        let ns = db.read();
        Ok(ns.zset(key)?.map_or(0, |z| {
            z.members
                .values()
                .filter(|&&score| score_in_bounds(score, min, max))
                .count() as i64
        }))
    }

    fn zincr_by(&self, db: &[u8], key: &[u8], delta: f64, member: &[u8]) -> StoreResult<f64> {
        let db = self.database(db);
        let mut ns = db.write();
        let zset = ns.zset_entry(key)?;
        let current = zset.members.get(member).copied().unwrap_or(0.0);
        let next = current + delta;
        if !next.is_finite() {
            return Err(StoreError::NotFloat);
        }
        zset.insert(Bytes::copy_from_slice(member), next);
        Ok(next)
    }

    fn zrange(
        &self,
        db: &[u8],
        key: &[u8],
        start: i32,
        stop: i32,
        with_scores: bool,
    ) -> StoreResult<Vec<Value>> {
        let db = self.database(db);
        let ns = db.read();
        let Some(zset) = ns.zset(key)? else {
            return Ok(Vec::new());
        };
        let Some((s, e)) = normalize_range(zset.len(), start, stop) else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for ((score, member), _) in zset.scores.iter().skip(s).take(e - s + 1) {
            out.push(Value::Bytes(member.clone()));
            if with_scores {
                out.push(Value::Double(score.into_inner()));
            }
        }
        Ok(out)
    }

    fn zscore(&self, db: &[u8], key: &[u8], member: &[u8]) -> StoreResult<f64> {
        let db = self.database(db);
        let ns = db.read();
        ns.zset(key)?
            .and_then(|z| z.members.get(member).copied())
            .ok_or(StoreError::NotFound)
    }

    // -- batch bracketing -------------------------------------------------

    fn multi(&self, db: &[u8]) {
        let db = self.database(db);
        db.brackets().insert(thread::current().id(), Vec::new());
    }

    fn exec(&self, db: &[u8]) {
        let db = self.database(db);
        let Some(staged) = db.brackets().remove(&thread::current().id()) else {
            return;
        };
        let mut ns = db.write();
        for op in staged {
            match op {
                StagedWrite::ZAdd { key, score, member } => {
                    // Type conflicts were reported when the write was staged.
                    let _ = Self::apply_zadd(&mut ns, &key, score, &member);
                }
            }
        }
    }

    fn discard(&self, db: &[u8]) {
        let db = self.database(db);
        db.brackets().remove(&thread::current().id());
    }
}

enum SetOp {
    Diff,
    Inter,
    Union,
}

fn set_algebra(ns: &Namespace, keys: &[Bytes], op: SetOp) -> StoreResult<BTreeSet<Bytes>> {
    let Some((first, rest)) = keys.split_first() else {
        return Ok(BTreeSet::new());
    };
    let mut result = ns.set_snapshot(first)?;
    for key in rest {
        let other = ns.set_snapshot(key)?;
        result = match op {
            SetOp::Diff => result.difference(&other).cloned().collect(),
            SetOp::Inter => result.intersection(&other).cloned().collect(),
            SetOp::Union => result.union(&other).cloned().collect(),
        };
    }
    Ok(result)
}

fn store_set(ns: &mut Namespace, dest: &[u8], result: BTreeSet<Bytes>) -> StoreResult<i64> {
    let len = result.len() as i64;
    ns.remove(dest);
    if !result.is_empty() {
        ns.records
            .insert(Bytes::copy_from_slice(dest), Record::Set(result));
    }
    Ok(len)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: &[u8] = b"0";

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn test_set_get_del() {
        let store = MemoryStore::new();
        store.set(DB, b"key", b"value").unwrap();
        assert_eq!(store.get(DB, b"key").unwrap(), b("value"));
        assert!(store.exists(DB, b"key"));

        assert_eq!(store.del(DB, &[b("key"), b("missing")]), 1);
        assert!(!store.exists(DB, b"key"));
        assert_eq!(store.get(DB, b"key"), Err(StoreError::NotFound));
    }

    #[test]
    fn test_databases_are_isolated() {
        let store = MemoryStore::new();
        store.set(b"0", b"key", b"zero").unwrap();
        store.set(b"1", b"key", b"one").unwrap();
        assert_eq!(store.get(b"0", b"key").unwrap(), b("zero"));
        assert_eq!(store.get(b"1", b"key").unwrap(), b("one"));
    }

    #[test]
    fn test_key_types() {
        let store = MemoryStore::new();
        store.set(DB, b"s", b"v").unwrap();
        store.hset(DB, b"h", b"f", b"v").unwrap();
        store.sadd(DB, b"set", &[b("a")]).unwrap();
        store.zadd(DB, b"z", 1.0, b"a").unwrap();

        assert_eq!(store.key_type(DB, b"s"), KeyType::Kv);
        assert_eq!(store.key_type(DB, b"h"), KeyType::HashField);
        assert_eq!(store.key_type(DB, b"set"), KeyType::SetElement);
        assert_eq!(store.key_type(DB, b"z"), KeyType::ZSetElementScore);
        assert_eq!(store.key_type(DB, b"missing"), KeyType::None);
    }

    #[test]
    fn test_wrong_type_reporting() {
        let store = MemoryStore::new();
        store.hset(DB, b"h", b"f", b"v").unwrap();
        assert_eq!(store.get(DB, b"h"), Err(StoreError::WrongType));
        assert_eq!(store.sadd(DB, b"h", &[b("a")]), Err(StoreError::WrongType));
        assert_eq!(store.zcard(DB, b"h"), Err(StoreError::WrongType));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let store = MemoryStore::new();
        store.set(DB, b"key", b"value").unwrap();
        // An expiry already in the past hides the key on the next access.
        assert!(store.expire_at(DB, b"key", 1));
        assert!(!store.exists(DB, b"key"));
        assert_eq!(store.get(DB, b"key"), Err(StoreError::NotFound));

        assert!(!store.expire_at(DB, b"missing", now_ms() + 10_000));
    }

    #[test]
    fn test_persist() {
        let store = MemoryStore::new();
        store.set(DB, b"key", b"value").unwrap();
        assert!(store.expire_at(DB, b"key", now_ms() + 60_000));
        assert!(store.persist(DB, b"key"));
        assert!(!store.persist(DB, b"key"));
        assert!(store.exists(DB, b"key"));
    }

    #[test]
    fn test_plain_set_clears_expiry() {
        let store = MemoryStore::new();
        store.set(DB, b"key", b"value").unwrap();
        assert!(store.expire_at(DB, b"key", now_ms() + 60_000));
        store.set(DB, b"key", b"fresh").unwrap();
        assert!(!store.persist(DB, b"key"));
    }

    #[test]
    fn test_set_conditions() {
        let store = MemoryStore::new();
        assert!(!store
            .set_with_options(DB, b"key", b"v", 0, 0, SetCondition::IfPresent)
            .unwrap());
        assert!(store
            .set_with_options(DB, b"key", b"v", 0, 0, SetCondition::IfAbsent)
            .unwrap());
        assert!(!store
            .set_with_options(DB, b"key", b"w", 0, 0, SetCondition::IfAbsent)
            .unwrap());
        assert_eq!(store.get(DB, b"key").unwrap(), b("v"));
        assert!(store
            .set_with_options(DB, b"key", b"w", 0, 0, SetCondition::IfPresent)
            .unwrap());
        assert_eq!(store.get(DB, b"key").unwrap(), b("w"));
    }

    #[test]
    fn test_append_and_ranges() {
        let store = MemoryStore::new();
        assert_eq!(store.append(DB, b"key", b"Hello").unwrap(), 5);
        assert_eq!(store.append(DB, b"key", b" World").unwrap(), 11);
        assert_eq!(store.strlen(DB, b"key").unwrap(), 11);

        assert_eq!(store.get_range(DB, b"key", 0, 4).unwrap(), b("Hello"));
        assert_eq!(store.get_range(DB, b"key", -5, -1).unwrap(), b("World"));
        assert_eq!(store.get_range(DB, b"key", 9, 2).unwrap(), Bytes::new());
        assert_eq!(store.get_range(DB, b"missing", 0, -1).unwrap(), Bytes::new());

        assert_eq!(store.set_range(DB, b"key", 6, b"Redis").unwrap(), 11);
        assert_eq!(store.get(DB, b"key").unwrap(), b("Hello Redis"));
        // Writing past the end zero-pads
        assert_eq!(store.set_range(DB, b"pad", 3, b"x").unwrap(), 4);
        assert_eq!(
            store.get(DB, b"pad").unwrap(),
            Bytes::from_static(b"\x00\x00\x00x")
        );
    }

    #[test]
    fn test_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.incr(DB, b"n").unwrap(), 1);
        assert_eq!(store.incr(DB, b"n").unwrap(), 2);
        assert_eq!(store.decr(DB, b"n").unwrap(), 1);
        assert_eq!(store.incr_by(DB, b"n", 10).unwrap(), 11);
        assert_eq!(store.decr_by(DB, b"n", 5).unwrap(), 6);

        store.set(DB, b"n", b"notnum").unwrap();
        assert_eq!(store.incr(DB, b"n"), Err(StoreError::NotInteger));

        store.set(DB, b"big", i64::MAX.to_string().as_bytes()).unwrap();
        assert_eq!(store.incr(DB, b"big"), Err(StoreError::NotInteger));
    }

    #[test]
    fn test_incr_by_float() {
        let store = MemoryStore::new();
        assert_eq!(store.incr_by_float(DB, b"x", 10.5).unwrap(), 10.5);
        assert_eq!(store.incr_by_float(DB, b"x", 0.1).unwrap(), 10.6);
        assert_eq!(store.get(DB, b"x").unwrap(), b("10.6"));

        store.set(DB, b"x", b"notnum").unwrap();
        assert_eq!(store.incr_by_float(DB, b"x", 1.0), Err(StoreError::NotFloat));
    }

    #[test]
    fn test_mset_mget_msetnx() {
        let store = MemoryStore::new();
        store.mset(DB, &[(b("k1"), b("v1")), (b("k2"), b("v2"))]);
        assert_eq!(
            store.mget(DB, &[b("k1"), b("missing"), b("k2")]),
            vec![
                Value::Bytes(b("v1")),
                Value::Empty,
                Value::Bytes(b("v2"))
            ]
        );

        assert_eq!(store.mset_nx(DB, &[(b("k1"), b("x")), (b("k3"), b("x"))]), 0);
        assert!(!store.exists(DB, b"k3"));
        assert_eq!(store.mset_nx(DB, &[(b("k3"), b("x")), (b("k4"), b("y"))]), 1);
        assert!(store.exists(DB, b"k4"));
    }

    #[test]
    fn test_bits() {
        let store = MemoryStore::new();
        assert_eq!(store.set_bit(DB, b"bits", 7, true).unwrap(), 0);
        assert_eq!(store.get_bit(DB, b"bits", 7).unwrap(), 1);
        assert_eq!(store.get_bit(DB, b"bits", 6).unwrap(), 0);
        assert_eq!(store.get_bit(DB, b"bits", 100).unwrap(), 0);
        // The old bit comes back on overwrite
        assert_eq!(store.set_bit(DB, b"bits", 7, false).unwrap(), 1);
        assert_eq!(store.get_bit(DB, b"bits", 7).unwrap(), 0);

        assert_eq!(store.set_bit(DB, b"bits", -1, true), Err(StoreError::NotInteger));
    }

    #[test]
    fn test_bit_count() {
        let store = MemoryStore::new();
        store.set(DB, b"key", b"foobar").unwrap();
        assert_eq!(store.bit_count(DB, b"key", 0, -1).unwrap(), 26);
        assert_eq!(store.bit_count(DB, b"key", 0, 0).unwrap(), 4);
        assert_eq!(store.bit_count(DB, b"key", 1, 1).unwrap(), 6);
        assert_eq!(store.bit_count(DB, b"missing", 0, -1).unwrap(), 0);
    }

    #[test]
    fn test_bit_op() {
        let store = MemoryStore::new();
        store.set(DB, b"a", b"abc").unwrap();
        store.set(DB, b"b", b"ab").unwrap();

        assert_eq!(store.bit_op(DB, BitOp::And, b"dst", &[b("a"), b("b")]).unwrap(), 3);
        let and = store.get(DB, b"dst").unwrap();
        assert_eq!(and, Bytes::from_static(b"ab\x00"));

        assert_eq!(store.bit_op(DB, BitOp::Not, b"dst", &[b("b")]).unwrap(), 2);
        assert_eq!(store.get(DB, b"dst").unwrap(), Bytes::from_static(b"\x9e\x9d"));

        // Empty result removes the destination
        assert_eq!(store.bit_op(DB, BitOp::Xor, b"dst", &[b("nope")]).unwrap(), 0);
        assert!(!store.exists(DB, b"dst"));
    }

    #[test]
    fn test_hashes() {
        let store = MemoryStore::new();
        assert!(store.hset(DB, b"h", b"f1", b"v1").unwrap());
        assert!(!store.hset(DB, b"h", b"f1", b"v2").unwrap());
        assert_eq!(store.hget(DB, b"h", b"f1").unwrap(), b("v2"));
        assert_eq!(store.hget(DB, b"h", b"nope"), Err(StoreError::NotFound));

        assert_eq!(store.hset_nx(DB, b"h", b"f1", b"x").unwrap(), 0);
        assert_eq!(store.hset_nx(DB, b"h", b"f2", b"v2").unwrap(), 1);
        assert_eq!(store.hlen(DB, b"h").unwrap(), 2);
        assert_eq!(store.hexists(DB, b"h", b"f2").unwrap(), 1);

        // Fields come back in key order
        assert_eq!(store.hkeys(DB, b"h").unwrap(), vec![b("f1"), b("f2")]);

        assert_eq!(store.hdel(DB, b"h", &[b("f1"), b("f2")]).unwrap(), 2);
        assert_eq!(store.key_type(DB, b"h"), KeyType::None);
    }

    #[test]
    fn test_hash_counters() {
        let store = MemoryStore::new();
        assert_eq!(store.hincr_by(DB, b"h", b"n", 5).unwrap(), 5);
        assert_eq!(store.hincr_by(DB, b"h", b"n", -2).unwrap(), 3);
        assert_eq!(store.hincr_by_float(DB, b"h", b"f", 0.5).unwrap(), 0.5);

        store.hset(DB, b"h", b"s", b"abc").unwrap();
        assert_eq!(store.hincr_by(DB, b"h", b"s", 1), Err(StoreError::NotInteger));
    }

    #[test]
    fn test_sets() {
        let store = MemoryStore::new();
        assert_eq!(store.sadd(DB, b"s", &[b("a"), b("b"), b("a")]).unwrap(), 2);
        assert_eq!(store.scard(DB, b"s").unwrap(), 2);
        assert_eq!(store.sis_member(DB, b"s", b"a").unwrap(), 1);
        assert_eq!(store.sis_member(DB, b"s", b"z").unwrap(), 0);

        assert_eq!(store.srem(DB, b"s", &[b("a"), b("z")]).unwrap(), 1);
        assert_eq!(store.srem(DB, b"s", &[b("b")]).unwrap(), 1);
        assert_eq!(store.key_type(DB, b"s"), KeyType::None);
    }

    #[test]
    fn test_spop_and_srandmember() {
        let store = MemoryStore::new();
        store.sadd(DB, b"s", &[b("only")]).unwrap();
        assert_eq!(store.spop(DB, b"s").unwrap(), b("only"));
        assert_eq!(store.spop(DB, b"s"), Err(StoreError::NotFound));

        store.sadd(DB, b"s", &[b("a"), b("b"), b("c")]).unwrap();
        assert_eq!(store.srand_member(DB, b"s", 2).unwrap().len(), 2);
        assert_eq!(store.srand_member(DB, b"s", 10).unwrap().len(), 3);
        assert_eq!(store.srand_member(DB, b"s", -5).unwrap().len(), 5);
        assert!(store.srand_member(DB, b"missing", 3).unwrap().is_empty());
    }

    #[test]
    fn test_smove() {
        let store = MemoryStore::new();
        store.sadd(DB, b"src", &[b("a"), b("b")]).unwrap();
        assert_eq!(store.smove(DB, b"src", b"dst", b"a").unwrap(), 1);
        assert_eq!(store.sis_member(DB, b"dst", b"a").unwrap(), 1);
        assert_eq!(store.sis_member(DB, b"src", b"a").unwrap(), 0);
        assert_eq!(store.smove(DB, b"src", b"dst", b"z").unwrap(), 0);
    }

    #[test]
    fn test_set_algebra() {
        let store = MemoryStore::new();
        store.sadd(DB, b"a", &[b("1"), b("2"), b("3")]).unwrap();
        store.sadd(DB, b"b", &[b("2"), b("3"), b("4")]).unwrap();

        let diff = store.sdiff(DB, &[b("a"), b("b")]).unwrap();
        assert_eq!(diff, vec![Value::Bytes(b("1"))]);

        let inter = store.sinter(DB, &[b("a"), b("b")]).unwrap();
        assert_eq!(inter, vec![Value::Bytes(b("2")), Value::Bytes(b("3"))]);

        let union = store.sunion(DB, &[b("a"), b("b")]).unwrap();
        assert_eq!(union.len(), 4);

        assert_eq!(store.sinter_store(DB, b"dst", &[b("a"), b("b")]).unwrap(), 2);
        assert_eq!(store.scard(DB, b"dst").unwrap(), 2);

        // Empty result clears the destination
        assert_eq!(store.sinter_store(DB, b"dst", &[b("a"), b("none")]).unwrap(), 0);
        assert!(!store.exists(DB, b"dst"));
    }

    #[test]
    fn test_zset_basics() {
        let store = MemoryStore::new();
        assert!(store.zadd(DB, b"z", 1.0, b"a").unwrap());
        assert!(store.zadd(DB, b"z", 2.0, b"b").unwrap());
        assert!(!store.zadd(DB, b"z", 3.0, b"a").unwrap());
        assert_eq!(store.zcard(DB, b"z").unwrap(), 2);
        assert_eq!(store.zscore(DB, b"z", b"a").unwrap(), 3.0);
        assert_eq!(store.zscore(DB, b"z", b"nope"), Err(StoreError::NotFound));
    }

    #[test]
    fn test_zrange() {
        let store = MemoryStore::new();
        store.zadd(DB, b"z", 3.0, b"c").unwrap();
        store.zadd(DB, b"z", 1.0, b"a").unwrap();
        store.zadd(DB, b"z", 2.0, b"b").unwrap();

        let all = store.zrange(DB, b"z", 0, -1, false).unwrap();
        assert_eq!(
            all,
            vec![Value::Bytes(b("a")), Value::Bytes(b("b")), Value::Bytes(b("c"))]
        );

        let scored = store.zrange(DB, b"z", 0, 0, true).unwrap();
        assert_eq!(scored, vec![Value::Bytes(b("a")), Value::Double(1.0)]);

        assert!(store.zrange(DB, b"z", 5, 10, false).unwrap().is_empty());
        assert!(store.zrange(DB, b"missing", 0, -1, false).unwrap().is_empty());
    }

    #[test]
    fn test_zcount() {
        let store = MemoryStore::new();
        store.zadd(DB, b"z", 1.0, b"a").unwrap();
        store.zadd(DB, b"z", 2.0, b"b").unwrap();
        store.zadd(DB, b"z", 3.0, b"c").unwrap();

        assert_eq!(store.zcount(DB, b"z", b"-inf", b"+inf").unwrap(), 3);
        assert_eq!(store.zcount(DB, b"z", b"1", b"2").unwrap(), 2);
        assert_eq!(store.zcount(DB, b"z", b"(1", b"3").unwrap(), 2);
        assert_eq!(store.zcount(DB, b"z", b"x", b"3"), Err(StoreError::NotFloat));
    }

    #[test]
    fn test_zincr_by() {
        let store = MemoryStore::new();
        assert_eq!(store.zincr_by(DB, b"z", 1.5, b"a").unwrap(), 1.5);
        assert_eq!(store.zincr_by(DB, b"z", 1.0, b"a").unwrap(), 2.5);
        assert_eq!(store.zscore(DB, b"z", b"a").unwrap(), 2.5);
    }

    #[test]
    fn test_batch_exec_applies_in_order() {
        let store = MemoryStore::new();
        store.multi(DB);
        assert!(store.zadd(DB, b"z", 1.0, b"a").unwrap());
        assert!(store.zadd(DB, b"z", 2.0, b"b").unwrap());
        // Restaging the same member is not a new add
        assert!(!store.zadd(DB, b"z", 3.0, b"a").unwrap());
        // Nothing is visible until exec
        assert_eq!(store.zcard(DB, b"z").unwrap(), 0);

        store.exec(DB);
        assert_eq!(store.zcard(DB, b"z").unwrap(), 2);
        // Last staged score wins
        assert_eq!(store.zscore(DB, b"z", b"a").unwrap(), 3.0);
    }

    #[test]
    fn test_batch_discard_drops_staged_writes() {
        let store = MemoryStore::new();
        store.zadd(DB, b"z", 1.0, b"kept").unwrap();
        store.multi(DB);
        store.zadd(DB, b"z", 2.0, b"dropped").unwrap();
        store.discard(DB);

        assert_eq!(store.zcard(DB, b"z").unwrap(), 1);
        assert_eq!(store.zscore(DB, b"z", b"dropped"), Err(StoreError::NotFound));
    }

    #[test]
    fn test_concurrent_brackets_stay_independent() {
        let store = Arc::new(MemoryStore::new());

        // Open a bracket here and leave it pending while another worker runs
        // a complete bracket against the same database.
        store.multi(DB);
        assert!(store.zadd(DB, b"z", 1.0, b"mine").unwrap());

        let other = Arc::clone(&store);
        std::thread::spawn(move || {
            other.multi(DB);
            other.zadd(DB, b"z", 2.0, b"theirs").unwrap();
            other.exec(DB);
        })
        .join()
        .unwrap();

        // The other bracket committed without touching this one's staging.
        assert_eq!(store.zcard(DB, b"z").unwrap(), 1);
        assert_eq!(store.zscore(DB, b"z", b"theirs").unwrap(), 2.0);
        assert_eq!(store.zscore(DB, b"z", b"mine"), Err(StoreError::NotFound));

        store.exec(DB);
        assert_eq!(store.zcard(DB, b"z").unwrap(), 2);
        assert_eq!(store.zscore(DB, b"z", b"mine").unwrap(), 1.0);
    }

    #[test]
    fn test_plain_write_during_foreign_bracket_applies_immediately() {
        let store = Arc::new(MemoryStore::new());
        store.multi(DB);

        // A worker that never opened a bracket must not have its write staged
        // into someone else's.
        let other = Arc::clone(&store);
        std::thread::spawn(move || {
            other.zadd(DB, b"z", 5.0, b"direct").unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(store.zscore(DB, b"z", b"direct").unwrap(), 5.0);
        store.discard(DB);
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(5, 0, -1), Some((0, 4)));
        assert_eq!(normalize_range(5, -2, -1), Some((3, 4)));
        assert_eq!(normalize_range(5, 1, 100), Some((1, 4)));
        assert_eq!(normalize_range(5, 3, 1), None);
        assert_eq!(normalize_range(5, 7, 9), None);
        assert_eq!(normalize_range(0, 0, -1), None);
    }

    #[test]
    fn test_parse_score_bound() {
        assert_eq!(parse_score_bound(b"1.5").unwrap(), (1.5, false));
        assert_eq!(parse_score_bound(b"(2").unwrap(), (2.0, true));
        assert_eq!(parse_score_bound(b"-inf").unwrap(), (f64::NEG_INFINITY, false));
        assert_eq!(parse_score_bound(b"+inf").unwrap(), (f64::INFINITY, false));
        assert!(parse_score_bound(b"abc").is_err());
    }
}
