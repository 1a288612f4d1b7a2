//! Platform-specific durable sync
//!
//! Maps to the strongest durability primitive each platform offers. The WAL
//! treats a successful return as the point past which a record survives
//! power loss.

use std::fs::File;
use std::io;

/// Ensure file data is durably written to persistent storage before returning.
///
/// Platform behaviors:
/// - Linux: fdatasync() — syncs data but not metadata timestamps
/// - macOS/iOS: fcntl(F_FULLFSYNC) — bypasses the disk write cache
/// - Windows: FlushFileBuffers()
/// - Other: File::sync_data() fallback
///
/// May block for extended periods under heavy I/O; callers must not hold
/// locks that the sync itself depends on.
pub fn sync_file_data(file: &File) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fdatasync operates on the fd of a live File reference.
        let result = unsafe { libc::fdatasync(fd) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(any(target_os = "macos", target_os = "ios"))]
    {
        // Plain fsync on Apple platforms only reaches the disk's volatile
        // write cache; F_FULLFSYNC is required for true durability.
        use std::os::unix::io::AsRawFd;
        let fd = file.as_raw_fd();
        // SAFETY: fcntl operates on the fd of a live File reference.
        let result = unsafe { libc::fcntl(fd, libc::F_FULLFSYNC) };
        if result == 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(target_os = "windows")]
    {
        use std::os::windows::io::AsRawHandle;
        use winapi::um::fileapi::FlushFileBuffers;
        let handle = file.as_raw_handle();
        // SAFETY: FlushFileBuffers operates on the handle of a live File reference.
        let result = unsafe { FlushFileBuffers(handle as *mut _) };
        if result != 0 {
            Ok(())
        } else {
            Err(io::Error::last_os_error())
        }
    }

    #[cfg(not(any(
        target_os = "linux",
        target_os = "macos",
        target_os = "ios",
        target_os = "windows"
    )))]
    {
        file.sync_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sync_file_data_on_written_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"bytes that must land on disk").unwrap();

        let result = sync_file_data(file.as_file());
        assert!(result.is_ok(), "sync_file_data failed: {:?}", result.err());
    }
}
