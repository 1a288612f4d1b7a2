//! Core engine — the heart of TuskStore.
//!
//! TuskStoreEngine binds the in-memory store to a crash-safe WAL and an
//! optional zstd compressor.
//!
//! **Read path**: store lookup under a shared lock, then decompress.
//! **Write path**: store-then-log under the exclusive lock — mutate the
//! maps, append the WAL record, sync per policy, release. A reader that
//! witnesses a mutation therefore knows its WAL append has begun, and a
//! durable WAL record can never describe a mutation the store rejected.
//! If the append itself fails, the store mutation is rolled back before
//! the error returns.
//!
//! Lock order is fixed: store, then WAL, then compressor. No path
//! acquires them in any other order.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};

use crate::compress::Compressor;
use crate::config::Config;
use crate::error::{TuskError, TuskResult};
use crate::format::WalOp;
use crate::store::{RecordKind, Store, StringLookup};
use crate::wal::Wal;

/// Point-in-time counters reported by `stats()`.
#[derive(Debug, Clone)]
pub struct EngineStats {
    /// String records in the store, expired included
    pub key_count: usize,
    /// Cumulative value bytes accepted, pre-compression
    pub raw_bytes: u64,
    /// Cumulative bytes actually stored
    pub compressed_bytes: u64,
    pub total_ops: u64,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
}

/// Operation counters, bumped from both shared- and exclusive-lock paths.
#[derive(Default)]
struct OpCounters {
    total_ops: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl OpCounters {
    fn bump_ops(&self) {
        self.total_ops.fetch_add(1, Ordering::Relaxed);
    }

    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

/// Embeddable key-value engine: store + WAL + compressor.
///
/// All public methods take `&self`; the engine is safe to share across
/// threads. Readers proceed in parallel, writers serialize through the
/// store's write lock.
pub struct TuskStoreEngine {
    /// The three maps, guarded as one unit
    store: RwLock<Store>,
    /// Write-ahead log; None for ephemeral engines
    wal: Option<Mutex<Wal>>,
    /// Value codec; None when compression is disabled
    compressor: Option<Mutex<Compressor>>,
    counters: OpCounters,
    config: Config,
    /// Data directory; None for ephemeral engines
    data_dir: Option<PathBuf>,
}

impl TuskStoreEngine {
    /// Open or create a durable engine at `dir`.
    ///
    /// Replays the WAL before returning: PUT records land in the store
    /// with their payload verbatim (already compressed when compression
    /// is on), DEL records remove. A malformed WAL header aborts
    /// construction. Keys recovered from the log come back without TTLs —
    /// deadlines do not survive a restart.
    pub fn open<P: AsRef<Path>>(dir: P, config: Config) -> TuskResult<Self> {
        config
            .validate()
            .map_err(|reason| TuskError::InvalidConfig { reason })?;

        let dir = dir.as_ref().to_path_buf();
        let wal = Wal::open(&dir, config.sync, config.async_flush_every)?;

        let mut store = Store::new();
        for record in wal.recover()? {
            match record.op {
                WalOp::Put => {
                    let stored = record.payload.len() as u64;
                    store.insert_string(&record.key, record.payload, 0);
                    store.credit_value_bytes(0, stored);
                }
                WalOp::Del => {
                    store.remove_string(&record.key);
                }
            }
        }

        let recovered = store.key_count();
        if recovered > 0 {
            tracing::info!(recovered, dir = %dir.display(), "recovered keys from WAL");
        }

        Ok(Self {
            store: RwLock::new(store),
            wal: Some(Mutex::new(wal)),
            compressor: Self::build_compressor(&config)?,
            counters: OpCounters::default(),
            config,
            data_dir: Some(dir),
        })
    }

    /// Create an engine with no backing directory.
    ///
    /// Nothing is persisted; `flush` and `compact` are no-ops and there
    /// is no recovery to perform.
    pub fn ephemeral(config: Config) -> TuskResult<Self> {
        config
            .validate()
            .map_err(|reason| TuskError::InvalidConfig { reason })?;

        Ok(Self {
            store: RwLock::new(Store::new()),
            wal: None,
            compressor: Self::build_compressor(&config)?,
            counters: OpCounters::default(),
            config,
            data_dir: None,
        })
    }

    fn build_compressor(config: &Config) -> TuskResult<Option<Mutex<Compressor>>> {
        if config.compression_level > 0 {
            let compressor =
                Compressor::new(config.compression_level, config.max_decompressed_size)?;
            Ok(Some(Mutex::new(compressor)))
        } else {
            Ok(None)
        }
    }

    /// Data directory, or None for an ephemeral engine.
    pub fn path(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }

    // ---- value codec ----

    fn encode_value(&self, value: &[u8]) -> TuskResult<Vec<u8>> {
        match &self.compressor {
            Some(compressor) => compressor.lock().compress(value, self.config.compression_level),
            None => Ok(value.to_vec()),
        }
    }

    fn decode_value(&self, payload: &[u8]) -> TuskResult<Vec<u8>> {
        match &self.compressor {
            Some(compressor) => compressor.lock().decompress(payload),
            None => Ok(payload.to_vec()),
        }
    }

    // ---- validation helpers ----

    fn validate_write(&self, key: &[u8], value: &[u8]) -> TuskResult<()> {
        if key.is_empty() {
            return Err(TuskError::InvalidKey);
        }
        if key.len() > self.config.max_key_size {
            return Err(TuskError::OversizedRecord {
                size: key.len() as u64,
                max: self.config.max_key_size as u64,
                component: "key",
            });
        }
        if value.len() > self.config.max_value_size {
            return Err(TuskError::OversizedRecord {
                size: value.len() as u64,
                max: self.config.max_value_size as u64,
                component: "value",
            });
        }
        Ok(())
    }

    fn check_kind(store: &Store, key: &[u8], expected: RecordKind) -> TuskResult<()> {
        match store.kind_of(key) {
            Some(actual) if actual != expected => Err(wrong_type(key, expected, actual)),
            _ => Ok(()),
        }
    }

    // ---- string operations ----

    /// Insert or replace a string record. `ttl_ms > 0` sets an expiry
    /// deadline of now + ttl_ms; 0 means the record never expires.
    pub fn put(&self, key: &[u8], value: &[u8], ttl_ms: i64) -> TuskResult<()> {
        self.counters.bump_ops();
        self.validate_write(key, value)?;

        let payload = self.encode_value(value)?;

        let mut store = self.store.write();
        store.evict_expired(key);
        Self::check_kind(&store, key, RecordKind::String)?;

        let prev = store.insert_string(key, payload.clone(), ttl_ms);
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().log_put(key, &payload) {
                store.restore_string(key, prev);
                return Err(e);
            }
        }
        store.credit_value_bytes(value.len() as u64, payload.len() as u64);
        Ok(())
    }

    /// Fetch a value. Absent and expired records both read as None.
    pub fn get(&self, key: &[u8]) -> TuskResult<Option<Vec<u8>>> {
        self.counters.bump_ops();

        let store = self.store.read();
        match store.lookup(key) {
            StringLookup::Hit(record) => {
                let value = self.decode_value(&record.payload)?;
                self.counters.record_hit();
                Ok(Some(value))
            }
            StringLookup::Expired => {
                self.counters.record_expired();
                Ok(None)
            }
            StringLookup::Miss => {
                self.counters.record_miss();
                Ok(None)
            }
            StringLookup::WrongKind(actual) => Err(wrong_type(key, RecordKind::String, actual)),
        }
    }

    /// Remove a string record. Returns whether one was removed; only a
    /// removal that actually happened is logged.
    pub fn del(&self, key: &[u8]) -> TuskResult<bool> {
        self.counters.bump_ops();

        let mut store = self.store.write();
        match store.remove_string(key) {
            Some(prev) => {
                if let Some(wal) = &self.wal {
                    if let Err(e) = wal.lock().log_del(key) {
                        store.restore_string(key, Some(prev));
                        return Err(e);
                    }
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a live string record exists for `key`.
    pub fn has(&self, key: &[u8]) -> bool {
        self.counters.bump_ops();

        let store = self.store.read();
        match store.lookup(key) {
            StringLookup::Hit(_) => true,
            StringLookup::Expired => {
                self.counters.record_expired();
                false
            }
            _ => false,
        }
    }

    /// Number of string records, expired included.
    pub fn len(&self) -> usize {
        self.store.read().key_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every record of every kind, reset the byte counters, and
    /// rewrite the WAL to empty.
    pub fn clear(&self) -> TuskResult<()> {
        self.counters.bump_ops();

        let mut store = self.store.write();
        store.clear();
        if let Some(wal) = &self.wal {
            wal.lock().compact(&[])?;
        }
        Ok(())
    }

    // ---- atomic counters ----

    /// Add `delta` to the integer stored at `key` and return the result.
    ///
    /// A value that does not parse as a signed 64-bit integer — or a
    /// missing key — starts from 0; the parse failure is deliberately
    /// silent, matching Redis semantics. The result is written back as
    /// decimal text with no TTL. Overflow wraps per two's complement.
    pub fn incr(&self, key: &[u8], delta: i64) -> TuskResult<i64> {
        self.counters.bump_ops();
        if key.is_empty() {
            return Err(TuskError::InvalidKey);
        }

        let mut store = self.store.write();
        store.evict_expired(key);
        Self::check_kind(&store, key, RecordKind::String)?;

        let current = match store.lookup(key) {
            StringLookup::Hit(record) => {
                let bytes = self.decode_value(&record.payload)?;
                std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .unwrap_or(0)
            }
            _ => 0,
        };

        let next = current.wrapping_add(delta);
        let text = next.to_string().into_bytes();
        let payload = self.encode_value(&text)?;

        let prev = store.insert_string(key, payload.clone(), 0);
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().log_put(key, &payload) {
                store.restore_string(key, prev);
                return Err(e);
            }
        }
        store.credit_value_bytes(text.len() as u64, payload.len() as u64);
        Ok(next)
    }

    /// `decr(k, d)` is `incr(k, -d)`.
    pub fn decr(&self, key: &[u8], delta: i64) -> TuskResult<i64> {
        self.incr(key, delta.wrapping_neg())
    }

    // ---- iteration & queries ----

    /// Up to `limit` live keys, in no particular order.
    pub fn keys(&self, limit: usize) -> Vec<Vec<u8>> {
        self.store.read().keys(limit)
    }

    /// Up to `limit` live `(key, value)` pairs whose keys start with
    /// `prefix`, in no particular order. Values are decompressed while
    /// the shared lock is held.
    pub fn scan(&self, prefix: &[u8], limit: usize) -> TuskResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let store = self.store.read();
        store
            .scan(prefix, limit)
            .into_iter()
            .map(|(key, payload)| Ok((key, self.decode_value(&payload)?)))
            .collect()
    }

    /// Live `(key, value)` pairs with `low <= key <= high`, ascending,
    /// truncated to `limit`.
    pub fn range(&self, low: &[u8], high: &[u8], limit: usize) -> TuskResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let store = self.store.read();
        store
            .range(low, high, limit)
            .into_iter()
            .map(|(key, payload)| Ok((key, self.decode_value(&payload)?)))
            .collect()
    }

    /// Exact count of live keys starting with `prefix`, capped to bound
    /// the work.
    pub fn count_prefix(&self, prefix: &[u8]) -> usize {
        self.store.read().count_prefix(prefix, self.config.count_prefix_cap)
    }

    /// Point-in-time decompressed view of every live string record.
    pub fn snapshot(&self) -> TuskResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let store = self.store.read();
        store
            .snapshot_payloads()
            .into_iter()
            .map(|(key, payload)| Ok((key, self.decode_value(&payload)?)))
            .collect()
    }

    // ---- list operations ----

    /// Prepend to the list at `key`; returns the new length.
    pub fn lpush(&self, key: &[u8], value: &[u8]) -> TuskResult<usize> {
        self.counters.bump_ops();
        if key.is_empty() {
            return Err(TuskError::InvalidKey);
        }

        let mut store = self.store.write();
        store.evict_expired(key);
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.lpush(key, value.to_vec()))
    }

    /// Append to the list at `key`; returns the new length.
    pub fn rpush(&self, key: &[u8], value: &[u8]) -> TuskResult<usize> {
        self.counters.bump_ops();
        if key.is_empty() {
            return Err(TuskError::InvalidKey);
        }

        let mut store = self.store.write();
        store.evict_expired(key);
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.rpush(key, value.to_vec()))
    }

    /// Pop from the front; None when the list is absent.
    pub fn lpop(&self, key: &[u8]) -> TuskResult<Option<Vec<u8>>> {
        self.counters.bump_ops();

        let mut store = self.store.write();
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.lpop(key))
    }

    /// Pop from the back; None when the list is absent.
    pub fn rpop(&self, key: &[u8]) -> TuskResult<Option<Vec<u8>>> {
        self.counters.bump_ops();

        let mut store = self.store.write();
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.rpop(key))
    }

    /// Inclusive sub-range with Redis negative-index semantics.
    pub fn lrange(&self, key: &[u8], start: i64, stop: i64) -> TuskResult<Vec<Vec<u8>>> {
        let store = self.store.read();
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.lrange(key, start, stop))
    }

    /// List length; 0 when absent.
    pub fn llen(&self, key: &[u8]) -> TuskResult<usize> {
        let store = self.store.read();
        Self::check_kind(&store, key, RecordKind::List)?;
        Ok(store.llen(key))
    }

    // ---- set operations ----

    /// Add a member; returns 1 if it was new, 0 otherwise.
    pub fn sadd(&self, key: &[u8], member: &[u8]) -> TuskResult<usize> {
        self.counters.bump_ops();
        if key.is_empty() {
            return Err(TuskError::InvalidKey);
        }

        let mut store = self.store.write();
        store.evict_expired(key);
        Self::check_kind(&store, key, RecordKind::Set)?;
        Ok(store.sadd(key, member.to_vec()))
    }

    /// Remove a member; returns whether it was present.
    pub fn srem(&self, key: &[u8], member: &[u8]) -> TuskResult<bool> {
        self.counters.bump_ops();

        let mut store = self.store.write();
        Self::check_kind(&store, key, RecordKind::Set)?;
        Ok(store.srem(key, member))
    }

    pub fn sismember(&self, key: &[u8], member: &[u8]) -> TuskResult<bool> {
        let store = self.store.read();
        Self::check_kind(&store, key, RecordKind::Set)?;
        Ok(store.sismember(key, member))
    }

    /// All members, in no particular order.
    pub fn smembers(&self, key: &[u8]) -> TuskResult<Vec<Vec<u8>>> {
        let store = self.store.read();
        Self::check_kind(&store, key, RecordKind::Set)?;
        Ok(store.smembers(key))
    }

    /// Set cardinality; 0 when absent.
    pub fn scard(&self, key: &[u8]) -> TuskResult<usize> {
        let store = self.store.read();
        Self::check_kind(&store, key, RecordKind::Set)?;
        Ok(store.scard(key))
    }

    // ---- batch operations ----

    /// Insert every pair in one exclusive critical section, with no TTL.
    ///
    /// Validation failures (empty key, oversized record, wrong type)
    /// fail the whole batch before any mutation. An I/O failure mid-batch
    /// rolls the already-applied records back in memory; WAL records
    /// appended before the failure are equivalent to a crash prefix.
    pub fn put_batch(&self, pairs: &[(Vec<u8>, Vec<u8>)]) -> TuskResult<()> {
        for (key, value) in pairs {
            self.validate_write(key, value)?;
        }

        let payloads: Vec<Vec<u8>> = pairs
            .iter()
            .map(|(_, value)| self.encode_value(value))
            .collect::<TuskResult<_>>()?;

        let mut store = self.store.write();
        for (key, _) in pairs {
            store.evict_expired(key);
            Self::check_kind(&store, key, RecordKind::String)?;
        }

        let mut applied: Vec<(&[u8], Option<crate::store::ValueRecord>)> =
            Vec::with_capacity(pairs.len());
        let mut raw_total = 0u64;
        let mut stored_total = 0u64;

        for ((key, value), payload) in pairs.iter().zip(&payloads) {
            self.counters.bump_ops();
            let prev = store.insert_string(key, payload.clone(), 0);

            if let Some(wal) = &self.wal {
                if let Err(e) = wal.lock().log_put(key, payload) {
                    store.restore_string(key, prev);
                    for (rollback_key, rollback_prev) in applied.into_iter().rev() {
                        store.restore_string(rollback_key, rollback_prev);
                    }
                    return Err(e);
                }
            }

            raw_total += value.len() as u64;
            stored_total += payload.len() as u64;
            applied.push((key.as_slice(), prev));
        }

        store.credit_value_bytes(raw_total, stored_total);
        Ok(())
    }

    /// Fetch every key in one shared critical section. The result is
    /// aligned with the input; absent, expired, and differently-bound
    /// keys all read as None.
    pub fn get_batch(&self, keys: &[Vec<u8>]) -> TuskResult<Vec<Option<Vec<u8>>>> {
        let store = self.store.read();
        let mut results = Vec::with_capacity(keys.len());

        for key in keys {
            self.counters.bump_ops();
            match store.lookup(key) {
                StringLookup::Hit(record) => {
                    let value = self.decode_value(&record.payload)?;
                    self.counters.record_hit();
                    results.push(Some(value));
                }
                StringLookup::Expired => {
                    self.counters.record_expired();
                    results.push(None);
                }
                StringLookup::Miss | StringLookup::WrongKind(_) => {
                    self.counters.record_miss();
                    results.push(None);
                }
            }
        }

        Ok(results)
    }

    // ---- persistence ----

    /// Force unflushed WAL records to disk. No-op for ephemeral engines.
    pub fn flush(&self) -> TuskResult<()> {
        if let Some(wal) = &self.wal {
            wal.lock().flush()?;
        }
        Ok(())
    }

    /// Rewrite the WAL so it holds exactly the live set: one PUT per
    /// live key with its current payload, no DEL records. The shared
    /// store hold excludes writers for the duration, so the snapshot and
    /// the rewritten log cannot diverge.
    pub fn compact(&self) -> TuskResult<()> {
        let Some(wal) = &self.wal else {
            return Ok(());
        };

        let store = self.store.read();
        let active = store.snapshot_payloads();
        wal.lock().compact(&active)
    }

    /// Current counters and sizes.
    pub fn stats(&self) -> EngineStats {
        let store = self.store.read();
        EngineStats {
            key_count: store.key_count(),
            raw_bytes: store.raw_bytes(),
            compressed_bytes: store.compressed_bytes(),
            total_ops: self.counters.total_ops.load(Ordering::Relaxed),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
        }
    }
}

impl Drop for TuskStoreEngine {
    fn drop(&mut self) {
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().flush() {
                tracing::warn!(error = %e, "WAL flush on drop failed");
            }
        }
    }
}

fn wrong_type(key: &[u8], expected: RecordKind, actual: RecordKind) -> TuskError {
    TuskError::WrongType {
        key: String::from_utf8_lossy(key).into_owned(),
        expected: expected.as_str(),
        actual: actual.as_str(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn test_engine() -> (TuskStoreEngine, TempDir) {
        let dir = TempDir::new().unwrap();
        let engine = TuskStoreEngine::open(dir.path(), Config::default()).unwrap();
        (engine, dir)
    }

    #[test]
    fn test_open_empty() {
        let (engine, _dir) = test_engine();
        assert_eq!(engine.len(), 0);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_put_get() {
        let (engine, _dir) = test_engine();
        engine.put(b"hello", b"world", 0).unwrap();
        assert_eq!(engine.get(b"hello").unwrap(), Some(b"world".to_vec()));
        assert_eq!(engine.len(), 1);
        assert!(engine.has(b"hello"));
    }

    #[test]
    fn test_put_overwrite() {
        let (engine, _dir) = test_engine();
        engine.put(b"k", b"v1", 0).unwrap();
        engine.put(b"k", b"v2", 0).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v2".to_vec()));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_delete() {
        let (engine, _dir) = test_engine();
        engine.put(b"k", b"v", 0).unwrap();
        assert!(engine.del(b"k").unwrap());
        assert_eq!(engine.get(b"k").unwrap(), None);
        assert!(!engine.del(b"k").unwrap());
        assert!(!engine.has(b"k"));
    }

    #[test]
    fn test_empty_key_rejected() {
        let (engine, _dir) = test_engine();
        assert!(matches!(engine.put(b"", b"v", 0), Err(TuskError::InvalidKey)));
        assert!(matches!(engine.incr(b"", 1), Err(TuskError::InvalidKey)));
        assert!(matches!(engine.lpush(b"", b"v"), Err(TuskError::InvalidKey)));
        assert!(matches!(engine.sadd(b"", b"m"), Err(TuskError::InvalidKey)));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_oversized_value_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.max_value_size = 16;
        let engine = TuskStoreEngine::open(dir.path(), config).unwrap();

        let result = engine.put(b"k", &vec![0u8; 17], 0);
        assert!(matches!(
            result,
            Err(TuskError::OversizedRecord { component: "value", .. })
        ));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let (engine, _dir) = test_engine();
        engine.put(b"k", b"v", 100).unwrap();

        sleep(Duration::from_millis(50));
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));

        sleep(Duration::from_millis(60));
        assert_eq!(engine.get(b"k").unwrap(), None);
        assert!(!engine.has(b"k"));

        let stats = engine.stats();
        assert!(stats.expired >= 1);
    }

    #[test]
    fn test_incr_algebra() {
        let (engine, _dir) = test_engine();

        engine.put(b"n", b"5", 0).unwrap();
        assert_eq!(engine.incr(b"n", 3).unwrap(), 8);
        assert_eq!(engine.get(b"n").unwrap(), Some(b"8".to_vec()));

        engine.put(b"junk", b"notanumber", 0).unwrap();
        assert_eq!(engine.incr(b"junk", 1).unwrap(), 1);

        assert_eq!(engine.incr(b"fresh", 1).unwrap(), 1);
        assert_eq!(engine.decr(b"fresh", 2).unwrap(), -1);
        assert_eq!(engine.get(b"fresh").unwrap(), Some(b"-1".to_vec()));
    }

    #[test]
    fn test_incr_clears_ttl() {
        let (engine, _dir) = test_engine();
        engine.put(b"n", b"10", 5_000).unwrap();
        assert_eq!(engine.incr(b"n", 1).unwrap(), 11);

        // Written back with no TTL
        let snapshot = engine.snapshot().unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].1, b"11");
    }

    #[test]
    fn test_wrong_type_rejected() {
        let (engine, _dir) = test_engine();

        engine.put(b"s", b"v", 0).unwrap();
        assert!(matches!(engine.lpush(b"s", b"x"), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.sadd(b"s", b"m"), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.llen(b"s"), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.scard(b"s"), Err(TuskError::WrongType { .. })));

        engine.lpush(b"l", b"x").unwrap();
        assert!(matches!(engine.put(b"l", b"v", 0), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.incr(b"l", 1), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.get(b"l"), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.sadd(b"l", b"m"), Err(TuskError::WrongType { .. })));

        engine.sadd(b"z", b"m").unwrap();
        assert!(matches!(engine.put(b"z", b"v", 0), Err(TuskError::WrongType { .. })));
        assert!(matches!(engine.lpop(b"z"), Err(TuskError::WrongType { .. })));

        // del only answers for the string store
        assert!(!engine.del(b"l").unwrap());
    }

    #[test]
    fn test_expired_key_can_rebind() {
        let (engine, _dir) = test_engine();
        engine.put(b"k", b"v", 20).unwrap();
        sleep(Duration::from_millis(35));

        // The expired string no longer blocks a typed write
        assert_eq!(engine.lpush(b"k", b"x").unwrap(), 1);
        assert_eq!(engine.llen(b"k").unwrap(), 1);
    }

    #[test]
    fn test_scan_and_count_prefix() {
        let (engine, _dir) = test_engine();
        engine.put(b"user:1", b"A", 0).unwrap();
        engine.put(b"user:2", b"B", 0).unwrap();
        engine.put(b"order:1", b"X", 0).unwrap();

        let mut hits = engine.scan(b"user:", 100).unwrap();
        hits.sort();
        assert_eq!(
            hits,
            vec![
                (b"user:1".to_vec(), b"A".to_vec()),
                (b"user:2".to_vec(), b"B".to_vec()),
            ]
        );
        assert_eq!(engine.count_prefix(b"user:"), 2);
    }

    #[test]
    fn test_range_ascending() {
        let (engine, _dir) = test_engine();
        engine.put(b"b", b"v", 0).unwrap();
        engine.put(b"a", b"v", 0).unwrap();
        engine.put(b"c", b"v", 0).unwrap();

        let result = engine.range(b"a", b"b", 100).unwrap();
        assert_eq!(
            result,
            vec![
                (b"a".to_vec(), b"v".to_vec()),
                (b"b".to_vec(), b"v".to_vec()),
            ]
        );
    }

    #[test]
    fn test_list_operations() {
        let (engine, _dir) = test_engine();

        engine.lpush(b"L", b"x").unwrap();
        engine.rpush(b"L", b"y").unwrap();
        engine.lpush(b"L", b"z").unwrap();

        // [z, x, y]
        let all = engine.lrange(b"L", 0, -1).unwrap();
        assert_eq!(all, vec![b"z".to_vec(), b"x".to_vec(), b"y".to_vec()]);
        let tail = engine.lrange(b"L", -2, -1).unwrap();
        assert_eq!(tail, vec![b"x".to_vec(), b"y".to_vec()]);
        assert_eq!(engine.llen(b"L").unwrap(), 3);

        assert_eq!(engine.lpop(b"L").unwrap(), Some(b"z".to_vec()));
        assert_eq!(engine.rpop(b"L").unwrap(), Some(b"y".to_vec()));
        assert_eq!(engine.lpop(b"L").unwrap(), Some(b"x".to_vec()));
        assert_eq!(engine.lpop(b"L").unwrap(), None);
        assert_eq!(engine.llen(b"L").unwrap(), 0);
    }

    #[test]
    fn test_lifo_fifo_symmetry() {
        let (engine, _dir) = test_engine();

        engine.lpush(b"stack", b"a").unwrap();
        engine.lpush(b"stack", b"b").unwrap();
        assert_eq!(engine.lpop(b"stack").unwrap(), Some(b"b".to_vec()));
        assert_eq!(engine.lpop(b"stack").unwrap(), Some(b"a".to_vec()));
        assert_eq!(engine.lpop(b"stack").unwrap(), None);

        engine.rpush(b"queue", b"a").unwrap();
        engine.rpush(b"queue", b"b").unwrap();
        assert_eq!(engine.rpop(b"queue").unwrap(), Some(b"b".to_vec()));
        assert_eq!(engine.rpop(b"queue").unwrap(), Some(b"a".to_vec()));
        assert_eq!(engine.rpop(b"queue").unwrap(), None);
    }

    #[test]
    fn test_set_operations() {
        let (engine, _dir) = test_engine();

        assert_eq!(engine.sadd(b"S", b"m").unwrap(), 1);
        assert_eq!(engine.sadd(b"S", b"m").unwrap(), 0);
        assert!(engine.sismember(b"S", b"m").unwrap());
        assert_eq!(engine.scard(b"S").unwrap(), 1);

        assert!(engine.srem(b"S", b"m").unwrap());
        assert!(!engine.srem(b"S", b"m").unwrap());
        assert!(!engine.sismember(b"S", b"m").unwrap());
        assert!(engine.smembers(b"S").unwrap().is_empty());
    }

    #[test]
    fn test_batch_operations() {
        let (engine, _dir) = test_engine();

        let pairs = vec![
            (b"a".to_vec(), b"1".to_vec()),
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ];
        engine.put_batch(&pairs).unwrap();
        assert_eq!(engine.len(), 3);

        let keys = vec![b"a".to_vec(), b"missing".to_vec(), b"c".to_vec()];
        let results = engine.get_batch(&keys).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0], Some(b"1".to_vec()));
        assert_eq!(results[1], None);
        assert_eq!(results[2], Some(b"3".to_vec()));
    }

    #[test]
    fn test_batch_rejects_invalid_key_up_front() {
        let (engine, _dir) = test_engine();

        let pairs = vec![
            (b"good".to_vec(), b"1".to_vec()),
            (b"".to_vec(), b"2".to_vec()),
        ];
        assert!(matches!(engine.put_batch(&pairs), Err(TuskError::InvalidKey)));
        assert_eq!(engine.len(), 0);
    }

    #[test]
    fn test_clear() {
        let (engine, _dir) = test_engine();
        engine.put(b"s", b"v", 0).unwrap();
        engine.lpush(b"l", b"x").unwrap();
        engine.sadd(b"z", b"m").unwrap();

        engine.clear().unwrap();
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.llen(b"l").unwrap(), 0);
        assert_eq!(engine.scard(b"z").unwrap(), 0);

        let stats = engine.stats();
        assert_eq!(stats.raw_bytes, 0);
        assert_eq!(stats.compressed_bytes, 0);
    }

    #[test]
    fn test_stats_counters() {
        let (engine, _dir) = test_engine();

        engine.put(b"k", b"value bytes", 0).unwrap();
        engine.get(b"k").unwrap();
        engine.get(b"missing").unwrap();

        let stats = engine.stats();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert!(stats.total_ops >= 3);
        assert_eq!(stats.raw_bytes, 11);
        assert!(stats.compressed_bytes > 0);
    }

    #[test]
    fn test_ephemeral_engine() {
        let engine = TuskStoreEngine::ephemeral(Config::default()).unwrap();
        engine.put(b"k", b"v", 0).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"v".to_vec()));

        // No WAL to touch
        engine.flush().unwrap();
        engine.compact().unwrap();
        assert!(engine.path().is_none());
    }

    #[test]
    fn test_compression_disabled_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.compression_level = 0;
        let engine = TuskStoreEngine::open(dir.path(), config).unwrap();

        engine.put(b"k", b"stored verbatim", 0).unwrap();
        assert_eq!(engine.get(b"k").unwrap(), Some(b"stored verbatim".to_vec()));

        let stats = engine.stats();
        assert_eq!(stats.raw_bytes, stats.compressed_bytes);
    }

    #[test]
    fn test_crash_recovery() {
        let dir = TempDir::new().unwrap();
        {
            let engine = TuskStoreEngine::open(dir.path(), Config::default()).unwrap();
            engine.put(b"survive1", b"yes", 0).unwrap();
            engine.put(b"survive2", b"also_yes", 0).unwrap();
            engine.put(b"doomed", b"temp", 0).unwrap();
            engine.del(b"doomed").unwrap();
        }
        {
            let engine = TuskStoreEngine::open(dir.path(), Config::default()).unwrap();
            assert_eq!(engine.get(b"survive1").unwrap(), Some(b"yes".to_vec()));
            assert_eq!(engine.get(b"survive2").unwrap(), Some(b"also_yes".to_vec()));
            assert_eq!(engine.get(b"doomed").unwrap(), None);
            assert_eq!(engine.len(), 2);
        }
    }

    #[test]
    fn test_snapshot_decompressed() {
        let (engine, _dir) = test_engine();
        engine.put(b"a", b"alpha", 0).unwrap();
        engine.put(b"b", b"beta", 0).unwrap();

        let mut snapshot = engine.snapshot().unwrap();
        snapshot.sort();
        assert_eq!(
            snapshot,
            vec![
                (b"a".to_vec(), b"alpha".to_vec()),
                (b"b".to_vec(), b"beta".to_vec()),
            ]
        );
    }

    #[test]
    fn test_concurrent_reads() {
        let (engine, _dir) = test_engine();
        let engine = Arc::new(engine);

        for i in 0..100 {
            engine
                .put(format!("k{}", i).as_bytes(), format!("v{}", i).as_bytes(), 0)
                .unwrap();
        }

        let mut handles = vec![];
        for _ in 0..8 {
            let e = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let val = e.get(format!("k{}", i).as_bytes()).unwrap().unwrap();
                    assert_eq!(val, format!("v{}", i).as_bytes());
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn test_concurrent_writers_serialize() {
        let (engine, _dir) = test_engine();
        let engine = Arc::new(engine);

        let mut handles = vec![];
        for t in 0..4 {
            let e = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    e.put(format!("t{}:{}", t, i).as_bytes(), b"v", 0).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(engine.len(), 200);
    }

    #[test]
    fn test_concurrent_incr_is_atomic() {
        let (engine, _dir) = test_engine();
        let engine = Arc::new(engine);

        let mut handles = vec![];
        for _ in 0..4 {
            let e = Arc::clone(&engine);
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    e.incr(b"counter", 1).unwrap();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(engine.get(b"counter").unwrap(), Some(b"400".to_vec()));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.compression_level = 99;
        assert!(matches!(
            TuskStoreEngine::open(dir.path(), config),
            Err(TuskError::InvalidConfig { .. })
        ));
    }
}
