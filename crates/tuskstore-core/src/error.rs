//! Error types for TuskStore operations
//!
//! All TuskStore errors are represented by the TuskError enum, which provides
//! detailed context for debugging and recovery.

use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// TuskStore error types with detailed context
#[derive(Debug, Clone)]
pub enum TuskError {
    /// Empty key on a write path — nothing is persisted
    InvalidKey,

    /// Key or value exceeds the wire-format bounds
    OversizedRecord {
        /// Size of the oversized component
        size: u64,
        /// Maximum allowed size
        max: u64,
        /// Whether it's the key or value that's oversized
        component: &'static str,
    },

    /// Configuration rejected at engine construction
    InvalidConfig {
        /// Description of the offending parameter
        reason: String,
    },

    /// I/O operation failed
    Io {
        /// The file path where the error occurred
        path: Option<PathBuf>,
        /// The underlying I/O error kind
        kind: std::io::ErrorKind,
        /// Human-readable description
        message: String,
    },

    /// WAL header is malformed — recovery cannot continue
    WalCorrupted {
        /// Path to the corrupted WAL file
        path: PathBuf,
        /// Byte offset where corruption was detected
        offset: u64,
        /// Description of the corruption
        reason: String,
    },

    /// Stored payload is not a well-formed compressed frame
    CorruptPayload {
        /// Description from the decoder
        reason: String,
    },

    /// Compressed frame lacks a declared decompressed size
    UnknownFrameSize,

    /// Declared decompressed size exceeds the configured cap
    DecompressedTooLarge {
        /// Size declared by the frame header
        declared: u64,
        /// Configured maximum
        max: u64,
    },

    /// Operation for one record type applied to a key bound to another
    WrongType {
        /// The key, rendered lossily for display
        key: String,
        /// Type the operation expected
        expected: &'static str,
        /// Type the key is actually bound to
        actual: &'static str,
    },
}

impl fmt::Display for TuskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuskError::InvalidKey => {
                write!(f, "invalid key: keys must be non-empty")
            }

            TuskError::OversizedRecord { size, max, component } => {
                write!(f, "record {} too large: {} bytes exceeds limit of {} bytes",
                       component, size, max)
            }

            TuskError::InvalidConfig { reason } => {
                write!(f, "invalid configuration: {}", reason)
            }

            TuskError::Io { path, kind, message } => {
                if let Some(path) = path {
                    write!(f, "I/O error in {}: {} ({})", path.display(), message, kind)
                } else {
                    write!(f, "I/O error: {} ({})", message, kind)
                }
            }

            TuskError::WalCorrupted { path, offset, reason } => {
                write!(f, "WAL corrupted in {} at offset {}: {}", path.display(), offset, reason)
            }

            TuskError::CorruptPayload { reason } => {
                write!(f, "corrupt compressed payload: {}", reason)
            }

            TuskError::UnknownFrameSize => {
                write!(f, "compressed frame does not declare its decompressed size")
            }

            TuskError::DecompressedTooLarge { declared, max } => {
                write!(f, "declared decompressed size {} bytes exceeds cap of {} bytes",
                       declared, max)
            }

            TuskError::WrongType { key, expected, actual } => {
                write!(f, "wrong type for key {:?}: expected {}, found {}",
                       key, expected, actual)
            }
        }
    }
}

impl Error for TuskError {}

/// Convert std::io::Error to TuskError::Io
impl From<std::io::Error> for TuskError {
    fn from(err: std::io::Error) -> Self {
        TuskError::Io {
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for TuskStore operations
pub type TuskResult<T> = Result<T, TuskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TuskError::WalCorrupted {
            path: PathBuf::from("/tmp/tusk.wal"),
            offset: 512,
            reason: "invalid key length".to_string(),
        };

        let display = format!("{}", err);
        assert!(display.contains("WAL corrupted"));
        assert!(display.contains("/tmp/tusk.wal"));
        assert!(display.contains("512"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let tusk_err: TuskError = io_err.into();

        match tusk_err {
            TuskError::Io { kind, .. } => assert_eq!(kind, std::io::ErrorKind::NotFound),
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_wrong_type_display() {
        let err = TuskError::WrongType {
            key: "jobs".to_string(),
            expected: "list",
            actual: "string",
        };

        let display = format!("{}", err);
        assert!(display.contains("expected list"));
        assert!(display.contains("found string"));
    }
}
