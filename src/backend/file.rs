//! JSON document tier standing in for page- and session-scoped stores.
//!
//! The whole store is one JSON object of key to raw text. Writes take an
//! advisory lock on a sidecar file so two CLI processes cannot interleave
//! read-modify-write cycles, then replace the document atomically.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;
use tempfile::NamedTempFile;

use super::{Backend, BackendError, BackendResult, QuotaEstimate, TierId};

type Document = BTreeMap<String, String>;

#[derive(Debug)]
pub struct JsonFileBackend {
    tier: TierId,
    path: PathBuf,
    quota_bytes: Option<u64>,
    guard: Mutex<()>,
}

impl JsonFileBackend {
    #[must_use]
    pub fn new(tier: TierId, path: impl Into<PathBuf>) -> Self {
        Self {
            tier,
            path: path.into(),
            quota_bytes: None,
            guard: Mutex::new(()),
        }
    }

    /// Reject writes that would grow the document past `bytes`.
    #[must_use]
    pub const fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    fn read_document(&self) -> BackendResult<Document> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Document::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(Document::new());
        }
        serde_json::from_str(&text)
            .map_err(|e| BackendError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn write_document(&self, doc: &Document) -> BackendResult<()> {
        let encoded = serde_json::to_vec(doc)
            .map_err(|e| BackendError::Corrupt(format!("encode document: {e}")))?;
        if let Some(quota) = self.quota_bytes {
            let size = encoded.len() as u64;
            if size > quota {
                return Err(BackendError::QuotaExceeded(format!(
                    "{} would hold {size} bytes, quota is {quota}",
                    self.tier
                )));
            }
        }

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&encoded)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| BackendError::Io(e.error))?;
        Ok(())
    }

    /// Run a read-modify-write cycle under both the in-process and the
    /// cross-process lock.
    fn modify(&self, edit: impl FnOnce(&mut Document) -> bool) -> BackendResult<()> {
        let _guard = self.guard.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let lock_file: File = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let result = self.read_document().and_then(|mut doc| {
            if edit(&mut doc) {
                self.write_document(&doc)
            } else {
                Ok(())
            }
        });

        let _ = FileExt::unlock(&lock_file);
        result
    }
}

impl Backend for JsonFileBackend {
    fn tier(&self) -> TierId {
        self.tier
    }

    fn get(&self, key: &str) -> BackendResult<Option<String>> {
        Ok(self.read_document()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> BackendResult<()> {
        self.modify(|doc| {
            doc.insert(key.to_string(), value.to_string());
            true
        })
    }

    fn remove(&self, key: &str) -> BackendResult<()> {
        self.modify(|doc| doc.remove(key).is_some())
    }

    fn clear(&self) -> BackendResult<()> {
        self.modify(|doc| {
            doc.clear();
            true
        })
    }

    fn estimate(&self) -> Option<QuotaEstimate> {
        let usage = fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        Some(QuotaEstimate {
            usage_bytes: usage,
            quota_bytes: self.quota_bytes,
        })
    }
}
