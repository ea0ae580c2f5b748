//! Advisory file lock
//!
//! Readers take a shared `flock(2)`; a running etcd holds an exclusive one.
//! Acquisition is retried until the configured timeout expires; a zero
//! timeout makes a single attempt. The lock is released when the file is
//! closed.

use std::fs::File;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{DumpError, Result};

/// Pause between lock attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

#[cfg(unix)]
pub(crate) fn lock_shared(file: &File, path: &Path, timeout: Duration) -> Result<()> {
    use std::io;
    use std::os::unix::io::AsRawFd;

    let started = Instant::now();
    loop {
        // SAFETY: the descriptor is owned by `file`, which outlives the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_SH | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(());
        }

        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EWOULDBLOCK) | Some(libc::EINTR) => {}
            _ => {
                return Err(DumpError::Open {
                    path: path.to_path_buf(),
                    reason: format!("flock: {}", err),
                })
            }
        }

        if started.elapsed() >= timeout {
            return Err(DumpError::LockTimeout {
                path: path.to_path_buf(),
                timeout,
            });
        }
        tracing::debug!(path = %path.display(), "file is locked, retrying");
        thread::sleep(RETRY_INTERVAL);
    }
}

#[cfg(not(unix))]
pub(crate) fn lock_shared(_file: &File, path: &Path, _timeout: Duration) -> Result<()> {
    tracing::warn!(path = %path.display(), "advisory locking unsupported on this platform");
    Ok(())
}
