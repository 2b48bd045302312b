//! FileStore: filesystem-backed key-value storage.
//!
//! All records live in one JSON document:
//!
//! ```text
//! {base_path}
//! └── state.json   # { "namespace/record": <value>, ... }
//! ```
//!
//! Every update rewrites the document through a temp file in the same
//! directory followed by a rename, so a crash mid-write never leaves a torn
//! document behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

/// Trait for durable key-value backends.
///
/// This allows for alternative implementations (e.g., in-memory for testing,
/// or an embedder-provided store such as an editor's global state).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Retrieve a record by key.
    ///
    /// Returns `Ok(None)` if the record is absent.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Write or clear a record.
    ///
    /// `Some(value)` replaces the record; `None` removes it. The change is
    /// durable once the call returns.
    async fn update(&self, key: &str, value: Option<Value>) -> Result<()>;
}

/// Filesystem-backed store.
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the backing document.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Open a store backed by the given document path.
    ///
    /// Creates the parent directory if needed. The document itself is
    /// created lazily on the first update; a missing document reads as
    /// empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create state directory {}", parent.display()))?;
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Open a store at `{dir}/state.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir.as_ref().join("state.json"))
    }

    /// The backing document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read state document {}", self.path.display())
                })
            }
        };
        serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse state document {}", self.path.display()))
    }

    async fn write_document(&self, document: &Map<String, Value>) -> Result<()> {
        let bytes =
            serde_json::to_vec_pretty(document).context("failed to serialize state document")?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("failed to move {} into place", tmp.display()))?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let document = self.read_document().await?;
        Ok(document.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Option<Value>) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut document = self.read_document().await?;
        match value {
            Some(value) => {
                document.insert(key.to_string(), value);
            }
            None => {
                document.remove(key);
            }
        }
        self.write_document(&document).await
    }
}
