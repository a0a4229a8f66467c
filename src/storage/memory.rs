use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{Document, DocumentStore, Filter, StoreError, Update, ID_FIELD};

type Collection = BTreeMap<Uuid, Document>;

#[derive(Serialize, Deserialize, Default)]
struct Snapshot {
    version: u32,
    created_ms: i64,
    collections: BTreeMap<String, Vec<Document>>,
}

const SNAPSHOT_VERSION: u32 = 1;

/// In-process document store.
///
/// All collections live behind one `RwLock`; every trait call holds the lock for
/// the duration of a single document operation, which makes `update_by_id`
/// atomic with respect to other requests. When a snapshot path is configured the
/// whole store is written to it as JSON by `save_snapshot`, either from the
/// persistence loop or explicitly on shutdown.
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
    snapshot_path: Option<PathBuf>,
    dirty: AtomicBool,
    /// Serialises snapshot writers so an older snapshot never lands after a newer one.
    write_lock: tokio::sync::Mutex<()>,
}

impl Default for MemoryStore {
    fn default() -> Self { Self::new() }
}

impl MemoryStore {
    /// Volatile store with no snapshot file.
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            snapshot_path: None,
            dirty: AtomicBool::new(false),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Open a store backed by a JSON snapshot, loading it when the file exists.
    pub fn open<P: AsRef<Path>>(snapshot_path: P) -> Result<Self, StoreError> {
        let path = snapshot_path.as_ref().to_path_buf();
        let mut collections: HashMap<String, Collection> = HashMap::new();
        match std::fs::read(&path) {
            Ok(bytes) => {
                let snap: Snapshot = serde_json::from_slice(&bytes)?;
                let mut loaded = 0usize;
                for (name, docs) in snap.collections {
                    let coll = collections.entry(name).or_default();
                    for doc in docs {
                        match doc.get(ID_FIELD).and_then(|v| v.as_str()).and_then(|s| Uuid::parse_str(s).ok()) {
                            Some(id) => { coll.insert(id, doc); loaded += 1; }
                            None => warn!(path = %path.display(), "snapshot document without a valid _id skipped"),
                        }
                    }
                }
                info!(path = %path.display(), documents = loaded, "store snapshot loaded");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no store snapshot yet; starting empty");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Self {
            collections: RwLock::new(collections),
            snapshot_path: Some(path),
            dirty: AtomicBool::new(false),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    pub fn snapshot_path(&self) -> Option<&Path> { self.snapshot_path.as_deref() }

    pub fn is_dirty(&self) -> bool { self.dirty.load(Ordering::Acquire) }

    fn mark_dirty(&self) { self.dirty.store(true, Ordering::Release); }

    /// Write the whole store to the snapshot file (temp file + rename).
    /// No-op for volatile stores.
    pub async fn save_snapshot(&self) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.clone() else { return Ok(()); };
        let _guard = self.write_lock.lock().await;
        let bytes = {
            let map = self.collections.read();
            let mut snap = Snapshot { version: SNAPSHOT_VERSION, created_ms: chrono::Utc::now().timestamp_millis(), ..Default::default() };
            for (name, coll) in map.iter() {
                snap.collections.insert(name.clone(), coll.values().cloned().collect());
            }
            // Cleared under the read lock: writers need the write lock to dirty it again.
            self.dirty.store(false, Ordering::Release);
            serde_json::to_vec_pretty(&snap)?
        };
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() { tokio::fs::create_dir_all(dir).await?; }
        }
        let tmp = path.with_extension("json.tmp");
        let res = async {
            tokio::fs::write(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &path).await
        }.await;
        if let Err(e) = res {
            self.mark_dirty();
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = bytes.len(), "store snapshot written");
        Ok(())
    }

    /// Spawn the background loop that snapshots the store whenever it changed.
    pub fn spawn_persistence(self: &Arc<Self>, interval: Duration) -> Option<JoinHandle<()>> {
        if self.snapshot_path.is_none() || interval.is_zero() { return None; }
        let this = Arc::clone(self);
        Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if this.is_dirty() {
                    if let Err(e) = this.save_snapshot().await {
                        warn!("store snapshot failed: {}", e);
                    }
                }
            }
        }))
    }

    fn with_id(mut doc: Document, id: Uuid) -> Document {
        doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
        doc
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>, StoreError> {
        let map = self.collections.read();
        Ok(map
            .get(collection)
            .map(|coll| coll.values().filter(|d| filter.matches(d)).cloned().collect())
            .unwrap_or_default())
    }

    async fn find_by_id(&self, collection: &str, id: Uuid) -> Result<Option<Document>, StoreError> {
        let map = self.collections.read();
        Ok(map.get(collection).and_then(|coll| coll.get(&id)).cloned())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        {
            let mut map = self.collections.write();
            map.entry(collection.to_string()).or_default().insert(id, Self::with_id(doc, id));
            self.mark_dirty();
        }
        debug!(collection, %id, "document inserted");
        Ok(id)
    }

    async fn replace_by_id(&self, collection: &str, id: Uuid, doc: Document) -> Result<bool, StoreError> {
        let mut map = self.collections.write();
        let Some(slot) = map.get_mut(collection).and_then(|coll| coll.get_mut(&id)) else { return Ok(false); };
        *slot = Self::with_id(doc, id);
        self.mark_dirty();
        Ok(true)
    }

    async fn update_by_id(&self, collection: &str, id: Uuid, update: Update) -> Result<bool, StoreError> {
        let mut map = self.collections.write();
        let Some(slot) = map.get_mut(collection).and_then(|coll| coll.get_mut(&id)) else { return Ok(false); };
        // Apply to a copy so a failed update leaves the stored document untouched.
        let mut next = slot.clone();
        update.apply(&mut next)?;
        *slot = Self::with_id(next, id);
        self.mark_dirty();
        Ok(true)
    }

    async fn delete_by_id(&self, collection: &str, id: Uuid) -> Result<bool, StoreError> {
        let mut map = self.collections.write();
        let removed = map.get_mut(collection).and_then(|coll| coll.remove(&id)).is_some();
        if removed { self.mark_dirty(); }
        Ok(removed)
    }

    async fn delete_many(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut map = self.collections.write();
        let Some(coll) = map.get_mut(collection) else { return Ok(0); };
        let before = coll.len();
        coll.retain(|_, d| !filter.matches(d));
        let removed = (before - coll.len()) as u64;
        if removed > 0 { self.mark_dirty(); }
        Ok(removed)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let map = self.collections.read();
        Ok(map.get(collection).map(|coll| coll.values().filter(|d| filter.matches(d)).count() as u64).unwrap_or(0))
    }
}
