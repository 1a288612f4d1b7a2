//! zstd block compression for stored values
//!
//! One compression and one decompression context are created per
//! `Compressor` and reused across calls; zstd context setup is expensive
//! enough to matter on the put path. The type is deliberately not shared —
//! the engine serializes access through a Mutex.
//!
//! Decompression reads the frame's declared content size and rejects
//! anything over the configured cap BEFORE allocating the output buffer,
//! so a hostile or corrupt frame cannot exhaust memory.

use crate::error::{TuskError, TuskResult};

/// Default cap on a frame's declared decompressed size (100MB)
pub const DEFAULT_MAX_DECOMPRESSED: usize = 100 * 1024 * 1024;

/// Reusable zstd compression/decompression contexts.
pub struct Compressor {
    cctx: zstd::bulk::Compressor<'static>,
    dctx: zstd::bulk::Decompressor<'static>,
    /// Level the compression context was built with
    level: i32,
    /// Upper bound on declared decompressed size
    max_decompressed: usize,
}

impl Compressor {
    /// Create a compressor with its contexts initialized at `level`.
    pub fn new(level: i32, max_decompressed: usize) -> TuskResult<Self> {
        let cctx = zstd::bulk::Compressor::new(level).map_err(|e| TuskError::Io {
            path: None,
            kind: e.kind(),
            message: format!("failed to create zstd compression context: {}", e),
        })?;
        let dctx = zstd::bulk::Decompressor::new().map_err(|e| TuskError::Io {
            path: None,
            kind: e.kind(),
            message: format!("failed to create zstd decompression context: {}", e),
        })?;

        Ok(Self { cctx, dctx, level, max_decompressed })
    }

    /// Compress `data` at `level`. Empty input yields empty output.
    ///
    /// The live context is rebuilt if `level` differs from the one it was
    /// created with; engines pass a fixed level, so this never happens in
    /// steady state.
    pub fn compress(&mut self, data: &[u8], level: i32) -> TuskResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        if level != self.level {
            self.cctx = zstd::bulk::Compressor::new(level).map_err(|e| TuskError::Io {
                path: None,
                kind: e.kind(),
                message: format!("failed to rebuild zstd context at level {}: {}", level, e),
            })?;
            self.level = level;
        }

        self.cctx.compress(data).map_err(|e| TuskError::Io {
            path: None,
            kind: e.kind(),
            message: format!("compression failed: {}", e),
        })
    }

    /// Decompress a zstd frame. Empty input yields empty output.
    ///
    /// Fails with `CorruptPayload` on a malformed frame, `UnknownFrameSize`
    /// when the frame omits its content size, and `DecompressedTooLarge`
    /// when the declared size is over the cap.
    pub fn decompress(&mut self, data: &[u8]) -> TuskResult<Vec<u8>> {
        if data.is_empty() {
            return Ok(Vec::new());
        }

        let declared = declared_frame_size(data)?;
        if declared > self.max_decompressed as u64 {
            return Err(TuskError::DecompressedTooLarge {
                declared,
                max: self.max_decompressed as u64,
            });
        }

        self.dctx
            .decompress(data, declared as usize)
            .map_err(|e| TuskError::CorruptPayload {
                reason: format!("decompression failed: {}", e),
            })
    }

    /// Declared decompressed size of a frame, without decompressing it.
    pub fn decompressed_size(&self, data: &[u8]) -> TuskResult<u64> {
        if data.is_empty() {
            return Ok(0);
        }
        declared_frame_size(data)
    }
}

/// Read the content size a frame declares in its header.
fn declared_frame_size(data: &[u8]) -> TuskResult<u64> {
    match zstd::zstd_safe::get_frame_content_size(data) {
        Err(_) => Err(TuskError::CorruptPayload {
            reason: "invalid zstd frame header".to_string(),
        }),
        Ok(None) => Err(TuskError::UnknownFrameSize),
        Ok(Some(size)) => Ok(size),
    }
}
