//! Write-Ahead Log for TuskStore
//!
//! One append-only file per data directory. Every mutation the engine
//! accepts lands here as a binary record; recovery replays the file
//! front-to-back and compaction rewrites it to just the live set.
//!
//! Appends write straight through to the OS — there is no user-space
//! buffer to lose — and the sync policy decides when the bytes are forced
//! to stable media. A record that is on disk when the process dies is
//! recovered; a record still in the OS page cache may not be. That is the
//! entire durability contract.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::SyncMode;
use crate::error::{TuskError, TuskResult};
use crate::format::{decode_at, encode_del, encode_put, Decoded, WalRecord};
use crate::platform::sync_file_data;

/// Fixed WAL file name inside the data directory
pub const WAL_FILE_NAME: &str = "tusk.wal";

/// Append-only journal with a configurable sync policy.
///
/// Not internally synchronized — the engine wraps it in a Mutex and
/// acquires that Mutex inside the store write lock, so append order
/// always matches store mutation order.
pub struct Wal {
    /// Current append handle
    file: File,
    /// Path to the live WAL file (for error context and compaction)
    path: PathBuf,
    /// Sync policy fixed at open
    mode: SyncMode,
    /// Async mode: appends between fsyncs
    flush_every: usize,
    /// Appends since the last fsync
    unflushed: usize,
}

impl Wal {
    /// Open or create the WAL inside `dir`.
    pub fn open<P: AsRef<Path>>(dir: P, mode: SyncMode, flush_every: usize) -> TuskResult<Self> {
        let dir = dir.as_ref();

        fs::create_dir_all(dir).map_err(|e| TuskError::Io {
            path: Some(dir.to_path_buf()),
            kind: e.kind(),
            message: format!("failed to create data directory: {}", e),
        })?;

        let path = dir.join(WAL_FILE_NAME);
        let file = Self::open_append(&path)?;

        Ok(Self { file, path, mode, flush_every, unflushed: 0 })
    }

    fn open_append(path: &Path) -> TuskResult<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| TuskError::Io {
                path: Some(path.to_path_buf()),
                kind: e.kind(),
                message: format!("failed to open WAL file: {}", e),
            })
    }

    /// Append a PUT record. The payload is written verbatim — any
    /// compression has already happened at the engine layer.
    pub fn log_put(&mut self, key: &[u8], payload: &[u8]) -> TuskResult<()> {
        let bytes = encode_put(key, payload)?;
        self.append(&bytes)
    }

    /// Append a DEL record.
    pub fn log_del(&mut self, key: &[u8]) -> TuskResult<()> {
        let bytes = encode_del(key)?;
        self.append(&bytes)
    }

    fn append(&mut self, bytes: &[u8]) -> TuskResult<()> {
        self.file.write_all(bytes).map_err(|e| TuskError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("WAL append failed: {}", e),
        })?;

        self.unflushed += 1;
        self.maybe_flush()
    }

    /// Apply the sync policy after an append.
    fn maybe_flush(&mut self) -> TuskResult<()> {
        match self.mode {
            SyncMode::Sync => self.flush(),
            SyncMode::Async => {
                if self.unflushed >= self.flush_every {
                    self.flush()
                } else {
                    Ok(())
                }
            }
            SyncMode::None => Ok(()),
        }
    }

    /// Force written records to persistent storage.
    pub fn flush(&mut self) -> TuskResult<()> {
        sync_file_data(&self.file).map_err(|e| TuskError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("WAL sync failed: {}", e),
        })?;
        self.unflushed = 0;
        Ok(())
    }

    /// Read all complete records, front-to-back.
    ///
    /// A torn record at the tail — the mark of a crash mid-append — is
    /// discarded silently and ends the scan. A malformed header anywhere
    /// is `WalCorrupted` and aborts recovery entirely.
    pub fn recover(&self) -> TuskResult<Vec<WalRecord>> {
        let buf = fs::read(&self.path).map_err(|e| TuskError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("failed to read WAL file: {}", e),
        })?;

        let mut records = Vec::new();
        let mut offset = 0;

        while offset < buf.len() {
            match decode_at(&buf, offset, &self.path)? {
                Decoded::Record { record, next } => {
                    records.push(record);
                    offset = next;
                }
                Decoded::Torn => {
                    tracing::warn!(
                        offset,
                        file_len = buf.len(),
                        "torn record at WAL tail, discarding"
                    );
                    break;
                }
            }
        }

        Ok(records)
    }

    /// Atomically replace the log with one PUT record per entry in
    /// `active`.
    ///
    /// Crash safety comes from the rename pattern:
    /// 1. Write every record to a sibling temp file
    /// 2. sync_file_data the temp file
    /// 3. Rename the temp over the live path (atomic on POSIX)
    /// 4. sync_file_data the parent directory
    ///
    /// A crash before the rename leaves the old log intact with an
    /// orphaned temp file; a crash after leaves the new log. Never a
    /// partial.
    pub fn compact(&mut self, active: &[(Vec<u8>, Vec<u8>)]) -> TuskResult<()> {
        let tmp_path = self.path.with_extension("wal.tmp");

        {
            let mut tmp = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)
                .map_err(|e| TuskError::Io {
                    path: Some(tmp_path.clone()),
                    kind: e.kind(),
                    message: format!("failed to create compaction temp file: {}", e),
                })?;

            for (key, payload) in active {
                let bytes = encode_put(key, payload)?;
                tmp.write_all(&bytes).map_err(|e| TuskError::Io {
                    path: Some(tmp_path.clone()),
                    kind: e.kind(),
                    message: format!("failed to write compacted record: {}", e),
                })?;
            }

            sync_file_data(&tmp).map_err(|e| TuskError::Io {
                path: Some(tmp_path.clone()),
                kind: e.kind(),
                message: format!("failed to sync compaction temp file: {}", e),
            })?;
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| TuskError::Io {
            path: Some(self.path.clone()),
            kind: e.kind(),
            message: format!("failed to rename compacted WAL: {}", e),
        })?;

        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent).map_err(|e| TuskError::Io {
                path: Some(parent.to_path_buf()),
                kind: e.kind(),
                message: format!("failed to open directory for sync: {}", e),
            })?;
            sync_file_data(&dir).map_err(|e| TuskError::Io {
                path: Some(parent.to_path_buf()),
                kind: e.kind(),
                message: format!("failed to sync directory after compaction: {}", e),
            })?;
        }

        // The old handle points at the unlinked inode; swap in a fresh one.
        self.file = Self::open_append(&self.path)?;
        self.unflushed = 0;

        tracing::debug!(records = active.len(), "WAL compacted");
        Ok(())
    }

    /// Path of the live WAL file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
