//! Opaque key-value storage for session secrets.
//!
//! On device this is backed by the platform keychain. The crate ships an
//! in-memory store for tests and short-lived processes, and a file-backed
//! store for desktop tooling.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

/// Consumer-provided secret persistence.
///
/// Calls are synchronous and infallible from the caller's point of view:
/// failures surface as `false` / `None`, never as errors.
pub trait SecretStore: Send + Sync + 'static {
    /// Store `blob` under `key`, replacing any previous value.
    fn save(&self, key: &str, blob: &[u8]) -> bool;

    /// Read the blob stored under `key`.
    fn load(&self, key: &str) -> Option<Vec<u8>>;

    /// Remove `key`. Missing keys are ignored.
    fn delete(&self, key: &str);
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemorySecretStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn save(&self, key: &str, blob: &[u8]) -> bool {
        self.entries.lock().insert(key.to_owned(), blob.to_vec());
        true
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        self.entries.lock().get(key).cloned()
    }

    fn delete(&self, key: &str) {
        self.entries.lock().remove(key);
    }
}

/// Stores each key as one file inside a directory.
///
/// Files are written to a temporary sibling and renamed into place so a
/// crash never leaves a half-written blob behind. Permissions are left to
/// the caller; point it at a directory only the current user can read.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
}

impl FileSecretStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(file_name_for(key))
    }
}

/// Maps a key to a file name, reversibly.
///
/// Lowercase ASCII letters, digits and `-` pass through; every other byte
/// (including `_` itself) becomes `_xx` in lowercase hex. Distinct keys
/// never share a file, even on case-insensitive filesystems, and the name
/// can never be `.`, `..` or contain a path separator.
fn file_name_for(key: &str) -> String {
    let mut name = String::with_capacity(key.len() + 1);
    for byte in key.bytes() {
        if byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-' {
            name.push(char::from(byte));
        } else {
            name.push_str(&format!("_{byte:02x}"));
        }
    }
    if name.is_empty() {
        name.push('_');
    }
    name
}

impl SecretStore for FileSecretStore {
    fn save(&self, key: &str, blob: &[u8]) -> bool {
        let path = self.path_for(key);
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let result = fs::create_dir_all(&self.dir)
            .and_then(|()| fs::write(&tmp, blob))
            .and_then(|()| fs::rename(&tmp, &path));
        if let Err(e) = result {
            tracing::error!(error = %e, path = %path.display(), "Secret write failed");
            return false;
        }
        true
    }

    fn load(&self, key: &str) -> Option<Vec<u8>> {
        fs::read(self.path_for(key)).ok()
    }

    fn delete(&self, key: &str) {
        let path = self.path_for(key);
        if let Err(e) = fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %path.display(), "Secret delete failed");
            }
        }
    }
}
