//! Configuration for TuskStore engines
//!
//! All knobs are fixed at construction time; an engine never changes its
//! sync policy or compression mode after `open`.

/// When dirty WAL bytes are forced to stable storage.
///
/// | Mode  | fsync                         | Data loss window on crash |
/// |-------|-------------------------------|---------------------------|
/// | Sync  | after every append            | zero (flushed writes)     |
/// | Async | every N appends or on flush() | up to N records           |
/// | None  | never                         | whatever the OS held back |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// fsync after every WAL append (slowest, maximum durability)
    Sync,
    /// fsync every `async_flush_every` appends or on explicit flush (the default)
    Async,
    /// never fsync; bytes still reach the OS on every append
    None,
}

impl Default for SyncMode {
    fn default() -> Self {
        SyncMode::Async
    }
}

/// TuskStore engine configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// WAL sync policy
    pub sync: SyncMode,
    /// zstd level 1..=22; 0 disables compression entirely
    pub compression_level: i32,
    /// Unflushed-append threshold for SyncMode::Async
    pub async_flush_every: usize,
    /// Maximum key size in bytes
    pub max_key_size: usize,
    /// Maximum value size in bytes
    pub max_value_size: usize,
    /// Cap on a frame's declared decompressed size, enforced before allocation
    pub max_decompressed_size: usize,
    /// Upper bound on count_prefix work
    pub count_prefix_cap: usize,
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=22).contains(&self.compression_level) {
            return Err("compression_level must be in [0, 22]".into());
        }
        if self.async_flush_every == 0 {
            return Err("async_flush_every must be > 0".into());
        }
        if self.max_key_size == 0 || self.max_key_size > crate::format::MAX_KEY_SIZE {
            return Err("max_key_size must be in [1, 1MB]".into());
        }
        if self.max_value_size == 0 || self.max_value_size > crate::format::MAX_PAYLOAD_SIZE {
            return Err("max_value_size must be in [1, 100MB]".into());
        }
        if self.max_decompressed_size == 0 {
            return Err("max_decompressed_size must be > 0".into());
        }
        if self.count_prefix_cap == 0 {
            return Err("count_prefix_cap must be > 0".into());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sync: SyncMode::Async,
            compression_level: 3,
            async_flush_every: 100,
            max_key_size: crate::format::MAX_KEY_SIZE,
            max_value_size: crate::format::MAX_PAYLOAD_SIZE,
            max_decompressed_size: 100 * 1024 * 1024,
            count_prefix_cap: 100_000,
        }
    }
}
