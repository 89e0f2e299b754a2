use super::StoreError;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive writer guard: an advisory lock on a lock file.
///
/// The kernel drops the lock when the owning process exits, however it
/// exits, so a file left behind by a killed writer never blocks the next
/// one. The file itself is not removed; it only carries the owner's pid.
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
    _file: File,
}

impl WriterLock {
    pub fn acquire(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        match file.try_lock() {
            Ok(()) => {}
            Err(TryLockError::WouldBlock) => return Err(StoreError::Locked(path)),
            Err(TryLockError::Error(e)) => return Err(StoreError::io(path, e)),
        }

        file.set_len(0).map_err(|e| StoreError::io(&path, e))?;
        file.rewind().map_err(|e| StoreError::io(&path, e))?;
        writeln!(file, "{}", std::process::id()).map_err(|e| StoreError::io(&path, e))?;
        debug!(path = %path.display(), "writer lock acquired");
        Ok(Self { path, _file: file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_writer_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.lock");
        let first = WriterLock::acquire(&path).unwrap();
        assert!(matches!(WriterLock::acquire(&path), Err(StoreError::Locked(_))));
        drop(first);
        assert!(WriterLock::acquire(&path).is_ok());
    }

    #[test]
    fn test_leftover_lock_file_is_reclaimed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.lock");
        // Written by a writer that died without cleaning up.
        fs::write(&path, "999999999\n").unwrap();

        let lock = WriterLock::acquire(&path).unwrap();
        let owner = fs::read_to_string(lock.path()).unwrap();
        assert_eq!(owner.trim(), std::process::id().to_string());
    }
}
