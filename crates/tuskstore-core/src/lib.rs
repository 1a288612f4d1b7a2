//! TuskStore Core — Embeddable Key-Value Engine
//!
//! A durable, in-process key-value store: RAM is the working surface, an
//! append-only write-ahead log provides crash safety, and recovery replays
//! the log to rebuild state after a restart.
//!
//! # Architecture
//!
//! - **Read path**: serve from the RAM maps under a shared lock, then
//!   decompress
//! - **Write path**: store-then-log under the exclusive lock, fsync per
//!   the configured sync policy
//! - **Compaction**: rewrite the log to just the live set via the atomic
//!   rename pattern
//!
//! Beyond plain string records, the store carries ordered lists and
//! unordered sets (volatile — the WAL records only string mutations),
//! per-record TTL expiry, and optional zstd value compression.
//!
//! # No Host Assumptions
//!
//! This crate has no runtime, no network surface, and no configuration
//! loading. It is a library linked into a host process; one engine
//! instance owns its data directory at a time.

pub mod compress;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod platform;
pub mod store;
pub mod wal;

// Re-export key types for convenience
pub use compress::Compressor;
pub use config::{Config, SyncMode};
pub use engine::{EngineStats, TuskStoreEngine};
pub use error::{TuskError, TuskResult};
pub use format::{WalOp, WalRecord};
pub use store::{RecordKind, Store};
pub use wal::{Wal, WAL_FILE_NAME};
