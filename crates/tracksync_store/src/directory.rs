//! Directory-based storage backend for persistent storage.

use crate::backend::KeyValueBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

/// A directory-backed key-value backend.
///
/// Each key is stored as `<dir>/<key>.json`. Values survive process
/// restarts.
///
/// # Durability
///
/// Writes go to a temporary sibling file which is synced and then renamed
/// over the target, so a crash mid-write leaves the previous value intact.
///
/// # Keys
///
/// Keys must be non-empty, must not start with `.`, and may only contain
/// ASCII letters, digits, `-`, `_` and `.`.
///
/// # Example
///
/// ```no_run
/// use tracksync_store::{DirectoryBackend, KeyValueBackend};
/// use std::path::Path;
///
/// let backend = DirectoryBackend::open(Path::new("store")).unwrap();
/// backend.write("playlist", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct DirectoryBackend {
    dir: PathBuf,
    quota: Option<u64>,
    write_lock: Mutex<()>,
}

impl DirectoryBackend {
    /// Opens a backend rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            quota: None,
            write_lock: Mutex::new(()),
        })
    }

    /// Limits the total size of all stored values to `bytes`.
    #[must_use]
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Returns the directory holding the key files.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let valid = !key.is_empty()
            && !key.starts_with('.')
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.{EXTENSION}")))
    }

    fn used_bytes_except(&self, skip: &Path) -> StorageResult<u64> {
        let mut total = 0;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path == skip || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            total += fs::metadata(&path)?.len();
        }
        Ok(total)
    }
}

impl KeyValueBackend for DirectoryBackend {
    fn read(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.key_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let _guard = self.write_lock.lock();

        if let Some(quota) = self.quota {
            let required = self.used_bytes_except(&path)? + value.len() as u64;
            if required > quota {
                return Err(StorageError::QuotaExceeded { required, quota });
            }
        }

        let tmp = path.with_extension(format!("{EXTENSION}.tmp"));
        let written = write_file(&tmp, value.as_bytes()).and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp);
            return Err(e.into());
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        let _guard = self.write_lock.lock();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_creates_missing_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let backend = DirectoryBackend::open(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(backend.path(), nested.as_path());
    }

    #[test]
    fn directory_write_then_read() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();

        backend.write("tracks", r#"[{"id":1}]"#).unwrap();
        assert_eq!(
            backend.read("tracks").unwrap().as_deref(),
            Some(r#"[{"id":1}]"#)
        );
        assert!(dir.path().join("tracks.json").exists());
        assert!(!dir.path().join("tracks.json.tmp").exists());
    }

    #[test]
    fn failed_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();

        // A directory in place of the value file makes the rename fail.
        let blocked = dir.path().join("tracks.json");
        fs::create_dir(&blocked).unwrap();
        fs::write(blocked.join("keep"), "x").unwrap();

        assert!(backend.write("tracks", "[]").is_err());
        assert!(!dir.path().join("tracks.json.tmp").exists());
        assert!(blocked.join("keep").exists());
    }

    #[test]
    fn directory_persists_across_reopen() {
        let dir = tempdir().unwrap();
        {
            let backend = DirectoryBackend::open(dir.path()).unwrap();
            backend.write("gist-id", "\"abc\"").unwrap();
        }
        let backend = DirectoryBackend::open(dir.path()).unwrap();
        assert_eq!(backend.read("gist-id").unwrap().as_deref(), Some("\"abc\""));
    }

    #[test]
    fn directory_read_missing_is_none() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();
        assert!(backend.read("playlist").unwrap().is_none());
    }

    #[test]
    fn directory_rejects_path_like_keys() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();

        for key in ["", "../escape", ".hidden", "a/b"] {
            let result = backend.write(key, "1");
            assert!(matches!(result, Err(StorageError::InvalidKey(_))), "{key}");
        }
    }

    #[test]
    fn directory_keys_sorted() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();
        backend.write("tracks", "[]").unwrap();
        backend.write("approvedTracks", "[]").unwrap();
        backend.write("github-token", "\"t\"").unwrap();

        assert_eq!(
            backend.keys().unwrap(),
            vec!["approvedTracks", "github-token", "tracks"]
        );
    }

    #[test]
    fn directory_remove() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap();
        backend.write("tracks", "[]").unwrap();
        backend.remove("tracks").unwrap();
        backend.remove("tracks").unwrap();
        assert!(backend.read("tracks").unwrap().is_none());
    }

    #[test]
    fn directory_quota_keeps_previous_value() {
        let dir = tempdir().unwrap();
        let backend = DirectoryBackend::open(dir.path()).unwrap().with_quota(8);
        backend.write("tracks", "[1,2]").unwrap();

        let result = backend.write("tracks", "[1,2,3,4,5]");
        assert!(matches!(result, Err(StorageError::QuotaExceeded { .. })));
        assert_eq!(backend.read("tracks").unwrap().as_deref(), Some("[1,2]"));
    }
}
