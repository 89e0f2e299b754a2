use super::StoreError;
use backoff::ExponentialBackoff;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// One JSON document on local disk.
///
/// Writes never leave a half-written file behind: the document is written
/// to `<name>.tmp` in the same directory and renamed over the target.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
    max_retry: Duration,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_retry: Duration::from_secs(2),
        }
    }

    /// Bound on the total time spent retrying transient write failures.
    pub fn with_max_retry(mut self, max_retry: Duration) -> Self {
        self.max_retry = max_retry;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the document. `Ok(None)` when the file does not exist.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<T>, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&self.path, e)),
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::serialize(&self.path, e))
    }

    /// Atomically replace the document, retrying transient I/O failures.
    pub fn save<T: Serialize>(&self, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(value).map_err(|e| StoreError::serialize(&self.path, e))?;

        let backoff = ExponentialBackoff {
            initial_interval: Duration::from_millis(50),
            max_elapsed_time: Some(self.max_retry),
            ..Default::default()
        };

        let result = backoff::retry(backoff, || {
            self.write_atomic(&json).map_err(|e| {
                if is_transient(&e) {
                    warn!(path = %self.path.display(), error = %e, "write failed, retrying");
                    backoff::Error::transient(e)
                } else {
                    backoff::Error::permanent(e)
                }
            })
        });

        match result {
            Ok(()) => {
                debug!(path = %self.path.display(), bytes = json.len(), "document saved");
                Ok(())
            }
            Err(backoff::Error::Permanent(e)) | Err(backoff::Error::Transient { err: e, .. }) => {
                Err(StoreError::io(&self.path, e))
            }
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.path.with_file_name(format!("{}.tmp", name))
    }

    fn write_atomic(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        if let Err(e) = fs::write(&tmp, bytes) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, &self.path)
    }
}

fn is_transient(e: &std::io::Error) -> bool {
    !matches!(
        e.kind(),
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::AlreadyExists
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        value: u32,
    }

    #[test]
    fn test_missing_file_loads_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("absent.json"));
        assert!(store.load::<Doc>().unwrap().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::new(dir.path().join("nested").join("doc.json"));
        let doc = Doc {
            name: "ledger".to_string(),
            value: 7,
        };
        store.save(&doc).unwrap();
        assert_eq!(store.load::<Doc>().unwrap(), Some(doc));
        assert!(!dir.path().join("nested").join("doc.json.tmp").exists());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        fs::write(&path, "{not json").unwrap();
        let store = JsonStore::new(&path);
        assert!(matches!(store.load::<Doc>(), Err(StoreError::Serialize { .. })));
    }

    #[test]
    fn test_failed_write_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        let store = JsonStore::new(&path).with_max_retry(Duration::from_millis(100));
        let doc = Doc {
            name: "first".to_string(),
            value: 1,
        };
        store.save(&doc).unwrap();

        // A directory squatting on the temp path makes the write fail.
        fs::create_dir(dir.path().join("doc.json.tmp")).unwrap();
        let result = store.save(&Doc {
            name: "second".to_string(),
            value: 2,
        });
        assert!(result.is_err());
        assert_eq!(store.load::<Doc>().unwrap(), Some(doc));
    }
}
