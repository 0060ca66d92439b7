use std::fs::{File, OpenOptions};
use std::io;

use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::IndexLayout;

/// Advisory lock on an index directory: builds hold it exclusively,
/// queries share it.
pub struct IndexLock {
    pub file: File,
    pub exclusive: bool,
}

impl IndexLock {
    pub fn acquire(layout: &IndexLayout, exclusive: bool) -> Result<Self> {
        let lock_path = layout.lock();

        let file = if exclusive {
            OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)?
        } else {
            OpenOptions::new().read(true).open(&lock_path)?
        };

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_EX, LOCK_NB, LOCK_SH};

            let fd = file.as_raw_fd();
            let operation = if exclusive { LOCK_EX } else { LOCK_SH } | LOCK_NB;

            // SAFETY: fd is owned by `file` for the duration of the call.
            if unsafe { flock(fd, operation) } != 0 {
                let busy = if exclusive { "another build holds" } else { "a build holds" };
                return Err(Error::new(
                    ErrorKind::Io,
                    format!("{} {}: {}", busy, lock_path.display(), io::Error::last_os_error()),
                ));
            }
        }

        Ok(IndexLock { file, exclusive })
    }

    /// Shared lock for readers. An index written without a lock file is
    /// read unlocked.
    pub fn acquire_shared(layout: &IndexLayout) -> Result<Option<Self>> {
        match Self::acquire(layout, false) {
            Ok(lock) => Ok(Some(lock)),
            Err(_) if !layout.lock().exists() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for IndexLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            use libc::{flock, LOCK_UN};

            let fd = self.file.as_raw_fd();
            // SAFETY: as in acquire.
            unsafe {
                flock(fd, LOCK_UN);
            }
        }
    }
}
