// src/store.rs
//! Brief persistence behind a small document-store contract:
//! merge-upsert for the latest snapshot, create-only for history.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;

use crate::config::briefs::is_valid_key;
use crate::engine::Brief;
use crate::error::{BriefError, Result};

pub const ENV_BRIEF_STORE_DIR: &str = "BRIEF_STORE_DIR";
pub const DEFAULT_STORE_DIR: &str = "data/marketBriefs";

#[async_trait]
pub trait BriefStore: Send + Sync {
    /// Merge `brief` into the latest document for `key` (created if missing).
    async fn upsert_latest(&self, key: &str, brief: &Brief) -> Result<()>;
    /// Write a history entry; an existing `entry_id` under `key` is an error.
    async fn append_history(&self, key: &str, entry_id: &str, brief: &Brief) -> Result<()>;
    /// Current merged snapshot for `key`.
    async fn latest(&self, key: &str) -> Result<Option<Value>>;
}

/// Deep merge: objects merge field-wise, everything else is replaced.
pub fn merge_json(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(d), Value::Object(s)) => {
            for (k, v) in s {
                match d.get_mut(&k) {
                    Some(slot) => merge_json(slot, v),
                    None => {
                        d.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

fn checked_key(key: &str) -> Result<&str> {
    if is_valid_key(key) {
        Ok(key)
    } else {
        Err(BriefError::Store(format!("invalid document key {key:?}")))
    }
}

// ---------- in-memory ----------

#[derive(Default)]
struct MemoryState {
    latest: HashMap<String, Value>,
    history: HashMap<String, BTreeMap<String, Value>>,
}

/// Process-local store for tests and local runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> Result<MutexGuard<'_, MemoryState>> {
        self.inner
            .lock()
            .map_err(|_| BriefError::Store("memory store lock poisoned".into()))
    }

    /// History entries for `key`, ordered by entry id.
    pub fn history_for(&self, key: &str) -> Vec<(String, Value)> {
        self.state()
            .ok()
            .and_then(|g| {
                g.history
                    .get(key)
                    .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            })
            .unwrap_or_default()
    }

    pub fn latest_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state()
            .map(|g| g.latest.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BriefStore for MemoryStore {
    async fn upsert_latest(&self, key: &str, brief: &Brief) -> Result<()> {
        let doc = serde_json::to_value(brief)?;
        let mut g = self.state()?;
        match g.latest.entry(key.to_string()) {
            Entry::Occupied(mut e) => merge_json(e.get_mut(), doc),
            Entry::Vacant(e) => {
                e.insert(doc);
            }
        }
        Ok(())
    }

    async fn append_history(&self, key: &str, entry_id: &str, brief: &Brief) -> Result<()> {
        let doc = serde_json::to_value(brief)?;
        let mut g = self.state()?;
        let entries = g.history.entry(key.to_string()).or_default();
        if entries.contains_key(entry_id) {
            return Err(BriefError::Store(format!(
                "history entry {key}/{entry_id} already exists"
            )));
        }
        entries.insert(entry_id.to_string(), doc);
        Ok(())
    }

    async fn latest(&self, key: &str) -> Result<Option<Value>> {
        let g = self.state()?;
        Ok(g.latest.get(key).cloned())
    }
}

// ---------- JSON files ----------

/// Layout: `{root}/{key}/latest.json` and `{root}/{key}/history/{id}.json`.
///
/// Writers of one key are serialized for the whole read-merge-write, so the
/// latest snapshot is last-writer-wins and never interleaved.
pub struct FileStore {
    root: PathBuf,
    key_locks: tokio::sync::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            key_locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// $BRIEF_STORE_DIR, else data/marketBriefs.
    pub fn from_env() -> Self {
        let root = std::env::var(ENV_BRIEF_STORE_DIR).unwrap_or_else(|_| DEFAULT_STORE_DIR.into());
        Self::new(root)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &str) -> Result<PathBuf> {
        Ok(self.root.join(checked_key(key)?))
    }

    fn latest_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.key_dir(key)?.join("latest.json"))
    }

    fn history_dir(&self, key: &str) -> Result<PathBuf> {
        Ok(self.key_dir(key)?.join("history"))
    }

    async fn key_lock(&self, key: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.to_string()).or_default().clone()
    }
}

/// Write through a uniquely named temp file in `dir`, then rename over `path`.
fn replace_file(dir: &Path, path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| BriefError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl BriefStore for FileStore {
    async fn upsert_latest(&self, key: &str, brief: &Brief) -> Result<()> {
        let dir = self.key_dir(key)?;
        let path = self.latest_path(key)?;

        let lock = self.key_lock(key).await;
        let _guard = lock.lock().await;

        tokio::fs::create_dir_all(&dir).await?;
        let mut doc = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Value>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Value::Object(Default::default()),
            Err(e) => return Err(e.into()),
        };
        merge_json(&mut doc, serde_json::to_value(brief)?);
        let bytes = serde_json::to_vec_pretty(&doc)?;

        // readers never see a half-written snapshot
        tokio::task::spawn_blocking(move || replace_file(&dir, &path, &bytes))
            .await
            .map_err(|e| BriefError::Store(format!("latest write task failed: {e}")))??;
        Ok(())
    }

    async fn append_history(&self, key: &str, entry_id: &str, brief: &Brief) -> Result<()> {
        let dir = self.history_dir(key)?;
        let entry_id = checked_key(entry_id)?;
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{entry_id}.json"));

        let mut f = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(BriefError::Store(format!(
                    "history entry {key}/{entry_id} already exists"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        f.write_all(&serde_json::to_vec_pretty(brief)?).await?;
        f.flush().await?;
        Ok(())
    }

    async fn latest(&self, key: &str) -> Result<Option<Value>> {
        let path = self.latest_path(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
