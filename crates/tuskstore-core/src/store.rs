//! In-memory store: string records, lists, and sets
//!
//! Three sibling maps share one namespace: a key is bound to at most one
//! of them at a time. String records carry the stored payload (raw or
//! compressed, the engine decides) and an optional expiry deadline; lists
//! and sets are volatile collections that disappear when they empty out.
//!
//! The store itself holds NO lock. The engine wraps it in a single
//! RwLock so that readers share and writers exclude across the whole
//! triple, and so that a WAL append can happen while the write hold is
//! still in place.
//!
//! Expiry is lazy: an expired record stays in the map until a read
//! treats it as absent or a write path evicts it.

use std::collections::VecDeque;
use std::time::Instant;

use hashbrown::{HashMap, HashSet};

/// Which typespace a key is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    String,
    List,
    Set,
}

impl RecordKind {
    /// Name used in WrongType error context.
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::String => "string",
            RecordKind::List => "list",
            RecordKind::Set => "set",
        }
    }
}

/// A stored string record: payload bytes plus expiry deadline.
///
/// `expires_at` is milliseconds on the store's own monotonic clock;
/// 0 means no expiry. Deadlines never survive a restart — the WAL does
/// not carry them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueRecord {
    pub payload: Vec<u8>,
    pub expires_at: i64,
}

/// Result of a string lookup, separating the reasons a key reads as absent.
#[derive(Debug)]
pub enum StringLookup<'a> {
    /// Live record
    Hit(&'a ValueRecord),
    /// Present but past its deadline
    Expired,
    /// Not present in any typespace
    Miss,
    /// Bound to a different typespace
    WrongKind(RecordKind),
}

/// The three maps plus byte accounting and the clock origin.
pub struct Store {
    strings: HashMap<Vec<u8>, ValueRecord>,
    lists: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
    sets: HashMap<Vec<u8>, HashSet<Vec<u8>>>,
    /// Cumulative bytes accepted on the put path, pre-compression
    raw_bytes: u64,
    /// Cumulative bytes actually stored
    compressed_bytes: u64,
    /// Origin for the monotonic millisecond clock
    epoch: Instant,
}

impl Store {
    pub fn new() -> Self {
        Self {
            strings: HashMap::new(),
            lists: HashMap::new(),
            sets: HashMap::new(),
            raw_bytes: 0,
            compressed_bytes: 0,
            epoch: Instant::now(),
        }
    }

    /// Milliseconds since this store was created.
    pub fn now_ms(&self) -> i64 {
        self.epoch.elapsed().as_millis() as i64
    }

    fn is_expired(&self, record: &ValueRecord) -> bool {
        record.expires_at != 0 && self.now_ms() >= record.expires_at
    }

    /// Typespace the key is currently bound to. An expired string record
    /// does not count as a binding.
    pub fn kind_of(&self, key: &[u8]) -> Option<RecordKind> {
        if let Some(record) = self.strings.get(key) {
            if !self.is_expired(record) {
                return Some(RecordKind::String);
            }
        }
        if self.lists.contains_key(key) {
            return Some(RecordKind::List);
        }
        if self.sets.contains_key(key) {
            return Some(RecordKind::Set);
        }
        None
    }

    /// Drop the string record for `key` if it has expired. Write paths
    /// call this before rebinding a key to another typespace.
    pub fn evict_expired(&mut self, key: &[u8]) {
        if let Some(record) = self.strings.get(key) {
            if self.is_expired(record) {
                self.strings.remove(key);
            }
        }
    }

    // ---- string records ----

    /// Look up a string record, honoring expiry and type bindings.
    pub fn lookup(&self, key: &[u8]) -> StringLookup<'_> {
        if let Some(record) = self.strings.get(key) {
            if self.is_expired(record) {
                return StringLookup::Expired;
            }
            return StringLookup::Hit(record);
        }
        if self.lists.contains_key(key) {
            return StringLookup::WrongKind(RecordKind::List);
        }
        if self.sets.contains_key(key) {
            return StringLookup::WrongKind(RecordKind::Set);
        }
        StringLookup::Miss
    }

    /// Insert or replace a string record. Returns the previous record so
    /// the caller can roll back if the WAL append fails.
    pub fn insert_string(
        &mut self,
        key: &[u8],
        payload: Vec<u8>,
        ttl_ms: i64,
    ) -> Option<ValueRecord> {
        let expires_at = if ttl_ms > 0 { self.now_ms() + ttl_ms } else { 0 };
        self.strings
            .insert(key.to_vec(), ValueRecord { payload, expires_at })
    }

    /// Undo an `insert_string`: reinstate the previous record, or remove
    /// the key if there was none.
    pub fn restore_string(&mut self, key: &[u8], prev: Option<ValueRecord>) {
        match prev {
            Some(record) => {
                self.strings.insert(key.to_vec(), record);
            }
            None => {
                self.strings.remove(key);
            }
        }
    }

    /// Remove a string record (expired or not), returning it.
    pub fn remove_string(&mut self, key: &[u8]) -> Option<ValueRecord> {
        self.strings.remove(key)
    }

    /// Record accepted value bytes, called after the write is durable-bound.
    pub fn credit_value_bytes(&mut self, raw: u64, stored: u64) {
        self.raw_bytes += raw;
        self.compressed_bytes += stored;
    }

    /// Remove every record of every kind and reset the byte counters.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.lists.clear();
        self.sets.clear();
        self.raw_bytes = 0;
        self.compressed_bytes = 0;
    }

    /// Number of string records, expired included.
    pub fn key_count(&self) -> usize {
        self.strings.len()
    }

    pub fn raw_bytes(&self) -> u64 {
        self.raw_bytes
    }

    pub fn compressed_bytes(&self) -> u64 {
        self.compressed_bytes
    }

    // ---- iteration ----

    /// Up to `limit` live keys, in no particular order.
    pub fn keys(&self, limit: usize) -> Vec<Vec<u8>> {
        let mut result = Vec::with_capacity(limit.min(self.strings.len()));
        for (key, record) in &self.strings {
            if !self.is_expired(record) {
                result.push(key.clone());
                if result.len() >= limit {
                    break;
                }
            }
        }
        result
    }

    /// Up to `limit` live `(key, payload)` pairs with keys starting with
    /// `prefix`, in no particular order.
    pub fn scan(&self, prefix: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut result = Vec::new();
        for (key, record) in &self.strings {
            if !self.is_expired(record) && key.starts_with(prefix) {
                result.push((key.clone(), record.payload.clone()));
                if result.len() >= limit {
                    break;
                }
            }
        }
        result
    }

    /// Live `(key, payload)` pairs with `low <= key <= high`, ascending by
    /// key, truncated to `limit`.
    pub fn range(&self, low: &[u8], high: &[u8], limit: usize) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut result: Vec<(Vec<u8>, Vec<u8>)> = self
            .strings
            .iter()
            .filter(|(key, record)| {
                !self.is_expired(record) && key.as_slice() >= low && key.as_slice() <= high
            })
            .map(|(key, record)| (key.clone(), record.payload.clone()))
            .collect();

        result.sort_by(|(a, _), (b, _)| a.cmp(b));
        result.truncate(limit);
        result
    }

    /// Exact count of live keys starting with `prefix`, capped at `cap`.
    pub fn count_prefix(&self, prefix: &[u8], cap: usize) -> usize {
        let mut count = 0;
        for (key, record) in &self.strings {
            if !self.is_expired(record) && key.starts_with(prefix) {
                count += 1;
                if count >= cap {
                    break;
                }
            }
        }
        count
    }

    /// Every live `(key, payload)` pair, payload verbatim. This is the
    /// compaction input: what lands in the rewritten WAL must be exactly
    /// what the store holds.
    pub fn snapshot_payloads(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.strings
            .iter()
            .filter(|(_, record)| !self.is_expired(record))
            .map(|(key, record)| (key.clone(), record.payload.clone()))
            .collect()
    }

    // ---- lists ----

    /// Prepend; returns the new length.
    pub fn lpush(&mut self, key: &[u8], value: Vec<u8>) -> usize {
        let list = self.lists.entry(key.to_vec()).or_default();
        list.push_front(value);
        list.len()
    }

    /// Append; returns the new length.
    pub fn rpush(&mut self, key: &[u8], value: Vec<u8>) -> usize {
        let list = self.lists.entry(key.to_vec()).or_default();
        list.push_back(value);
        list.len()
    }

    /// Pop from the front. Popping the last element removes the list key.
    pub fn lpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_front();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    /// Pop from the back. Popping the last element removes the list key.
    pub fn rpop(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        let list = self.lists.get_mut(key)?;
        let value = list.pop_back();
        if list.is_empty() {
            self.lists.remove(key);
        }
        value
    }

    /// Inclusive sub-range with Redis index semantics: negative positions
    /// count from the end, `start` clamps up to 0, `stop` clamps down to
    /// the last index, and an inverted range is empty.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> Vec<Vec<u8>> {
        let Some(list) = self.lists.get(key) else {
            return Vec::new();
        };
        let len = list.len() as i64;

        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = (if stop < 0 { len + stop } else { stop }).min(len - 1);

        if start > stop {
            return Vec::new();
        }

        (start..=stop)
            .map(|i| list[i as usize].clone())
            .collect()
    }

    pub fn llen(&self, key: &[u8]) -> usize {
        self.lists.get(key).map_or(0, |list| list.len())
    }

    // ---- sets ----

    /// Add a member; 1 if it was new, 0 if already present.
    pub fn sadd(&mut self, key: &[u8], member: Vec<u8>) -> usize {
        let set = self.sets.entry(key.to_vec()).or_default();
        if set.insert(member) {
            1
        } else {
            0
        }
    }

    /// Remove a member. Removing the last member removes the set key.
    pub fn srem(&mut self, key: &[u8], member: &[u8]) -> bool {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> bool {
        self.sets.get(key).map_or(false, |set| set.contains(member))
    }

    /// All members, in no particular order.
    pub fn smembers(&self, key: &[u8]) -> Vec<Vec<u8>> {
        self.sets
            .get(key)
            .map_or_else(Vec::new, |set| set.iter().cloned().collect())
    }

    pub fn scard(&self, key: &[u8]) -> usize {
        self.sets.get(key).map_or(0, |set| set.len())
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}
