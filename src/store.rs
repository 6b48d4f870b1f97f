//! Scoped, content-keyed byte store on the filesystem
//!
//! Entries live at `root/scope/escape(key)`. Keys are escaped with URL-safe
//! base64 (no padding) so arbitrary keys, including ones containing path
//! separators, map to exactly one safe filename and can be recovered by
//! `list`. Writes go through a temp file and an atomic rename, so an entry
//! is either absent or fully written.

use crate::error::{StashError, StashResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The minimal store surface the caching orchestrator needs.
///
/// `FsStore` is the production implementation; tests stub this to prove the
/// orchestrator honors its cache contract.
pub trait Store {
    /// Read an entry. Absence is `None`, never an error.
    fn get(&self, key: &str) -> StashResult<Option<Vec<u8>>>;

    /// Write an entry, overwriting any existing one.
    fn set(&self, key: &str, content: &[u8]) -> StashResult<()>;
}

/// A filesystem-backed content store for one scope
#[derive(Debug, Clone)]
pub struct FsStore {
    dir: PathBuf,
}

impl FsStore {
    /// Create a store rooted at `root`, partitioned under `scope`
    pub fn new(root: impl Into<PathBuf>, scope: &str) -> Self {
        Self {
            dir: root.into().join(scope),
        }
    }

    /// Create a store under the default root for `scope`
    pub fn open(scope: &str) -> Self {
        Self::new(Self::default_root(), scope)
    }

    /// The default store root: the platform cache directory plus `stash`
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("stash")
    }

    /// The scope directory this store reads and writes
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(URL_SAFE_NO_PAD.encode(key.as_bytes()))
    }

    /// Write `content` under `key`, creating the scope directory as needed
    pub fn set(&self, key: &str, content: impl AsRef<[u8]>) -> StashResult<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            StashError::store_io(format!("creating store dir {}", self.dir.display()), e)
        })?;

        let path = self.entry_path(key);
        let mut file = tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| {
            StashError::store_io(format!("creating temp file in {}", self.dir.display()), e)
        })?;
        file.write_all(content.as_ref())
            .map_err(|e| StashError::store_io(format!("writing entry {}", path.display()), e))?;
        file.persist(&path)
            .map_err(|e| StashError::store_io(format!("persisting entry {}", path.display()), e.error))?;

        debug!(key, path = %path.display(), "stored entry");
        Ok(())
    }

    /// Read the entry under `key`; `None` if it does not exist
    pub fn get(&self, key: &str) -> StashResult<Option<Vec<u8>>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StashError::store_io(
                format!("reading entry {}", path.display()),
                e,
            )),
        }
    }

    /// Read the entry under `key` as UTF-8 text; `None` if it does not exist
    pub fn get_string(&self, key: &str) -> StashResult<Option<String>> {
        match self.get(key)? {
            Some(bytes) => {
                let text = String::from_utf8(bytes).map_err(|e| {
                    StashError::store_io(
                        format!("entry for key '{key}' is not valid UTF-8"),
                        std::io::Error::new(std::io::ErrorKind::InvalidData, e),
                    )
                })?;
                Ok(Some(text))
            }
            None => Ok(None),
        }
    }

    /// Enumerate the keys in this scope, reversing the filename escape.
    /// Files whose names do not decode are skipped.
    pub fn list(&self) -> StashResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StashError::store_io(
                    format!("listing store dir {}", self.dir.display()),
                    e,
                ))
            }
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                StashError::store_io(format!("listing store dir {}", self.dir.display()), e)
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                debug!(?name, "skipping non-UTF-8 filename in store dir");
                continue;
            };
            let decoded = URL_SAFE_NO_PAD
                .decode(name)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(key) => keys.push(key),
                None => debug!(name, "skipping foreign file in store dir"),
            }
        }
        Ok(keys)
    }

    /// Remove every entry in this scope. A missing scope dir is not an error.
    pub fn clear(&self) -> StashResult<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StashError::store_io(
                format!("clearing store dir {}", self.dir.display()),
                e,
            )),
        }
    }
}

impl Store for FsStore {
    fn get(&self, key: &str) -> StashResult<Option<Vec<u8>>> {
        FsStore::get(self, key)
    }

    fn set(&self, key: &str, content: &[u8]) -> StashResult<()> {
        FsStore::set(self, key, content)
    }
}

/// Derive a scope name from an explicit caller identity string.
///
/// Same identity = same scope. The name is a truncated SHA-256 digest, so it
/// is always a safe directory name.
pub fn scope_for(identity: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identity.as_bytes());
    hex::encode(&hasher.finalize()[..8])
}
