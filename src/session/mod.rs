//! Session store: maps opaque session ids to their vector indexes
//!
//! Each session owns one document's index. Writes to an index are
//! serialized behind its `RwLock`; queries share the read side. Different
//! sessions never contend. Session metadata lives in a registry file next
//! to the per-session index files, so sessions survive process restarts.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::types::SessionMeta;

const REGISTRY_FILE: &str = "sessions.json";

/// A live session: metadata plus the locked index
pub struct SessionHandle {
    meta: RwLock<SessionMeta>,
    /// Single-writer, many-reader index access
    pub index: RwLock<VectorIndex>,
    last_activity: Mutex<Instant>,
}

impl SessionHandle {
    fn new(meta: SessionMeta, index: VectorIndex) -> Self {
        Self {
            meta: RwLock::new(meta),
            index: RwLock::new(index),
            last_activity: Mutex::new(Instant::now()),
        }
    }

    /// Snapshot of the session metadata
    pub fn meta(&self) -> SessionMeta {
        self.meta.read().clone()
    }

    /// Record activity for idle reaping
    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Time since the session was last used
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }
}

/// Store of live sessions backed by per-session index files
pub struct SessionStore {
    storage_dir: PathBuf,
    sessions: DashMap<Uuid, Arc<SessionHandle>>,
    /// Metadata for every known session, live or persisted
    registry: Mutex<HashMap<Uuid, SessionMeta>>,
}

impl SessionStore {
    /// Open a store rooted at the given storage directory, reloading the
    /// session registry if one was persisted there
    pub fn new(storage_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&storage_dir)?;

        let registry_path = storage_dir.join(REGISTRY_FILE);
        let registry: HashMap<Uuid, SessionMeta> = match std::fs::read(&registry_path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                tracing::warn!("Session registry unreadable, starting empty: {}", e);
                HashMap::new()
            }),
            Err(_) => HashMap::new(),
        };

        if !registry.is_empty() {
            tracing::info!(sessions = registry.len(), "reloaded session registry");
        }

        Ok(Self {
            storage_dir,
            sessions: DashMap::new(),
            registry: Mutex::new(registry),
        })
    }

    /// Storage directory holding the persisted index files
    pub fn storage_dir(&self) -> &PathBuf {
        &self.storage_dir
    }

    /// Create a fresh session with an empty index; returns its identifier
    pub fn create_session(&self, meta: SessionMeta) -> Result<Uuid> {
        let session_id = meta.session_id;
        let handle = Arc::new(SessionHandle::new(meta.clone(), VectorIndex::new(session_id)));

        match self.sessions.entry(session_id) {
            Entry::Occupied(_) => return Err(Error::DuplicateSession(session_id)),
            Entry::Vacant(slot) => {
                slot.insert(handle);
            }
        }

        self.registry.lock().insert(session_id, meta);
        self.save_registry()?;

        tracing::info!(session_id = %session_id, "session created");
        Ok(session_id)
    }

    /// Swap a fully built index into the session and update its metadata.
    ///
    /// The swap happens under one write lock, so a concurrent reader sees
    /// either the empty index or the complete one, never a partial write.
    pub fn install_index(&self, session_id: Uuid, index: VectorIndex) -> Result<()> {
        let handle = self.get(session_id)?;
        let chunk_count = index.len() as u32;

        *handle.index.write() = index;
        handle.meta.write().chunk_count = chunk_count;

        if let Some(meta) = self.registry.lock().get_mut(&session_id) {
            meta.chunk_count = chunk_count;
        }
        self.save_registry()?;

        Ok(())
    }

    /// Resolve a session handle.
    ///
    /// Falls back to the persisted index on disk when the session is not
    /// live in memory, so sessions survive process restarts.
    pub fn get(&self, session_id: Uuid) -> Result<Arc<SessionHandle>> {
        if let Some(handle) = self.sessions.get(&session_id) {
            handle.touch();
            return Ok(Arc::clone(&handle));
        }

        self.load(session_id)
    }

    /// Revive a persisted session into the live map.
    ///
    /// Fails with `DuplicateSession` when the slot is already occupied.
    pub fn load(&self, session_id: Uuid) -> Result<Arc<SessionHandle>> {
        let index = VectorIndex::load(&self.storage_dir, session_id)?;

        let meta = self
            .registry
            .lock()
            .get(&session_id)
            .cloned()
            .unwrap_or_else(|| {
                // Registry lost or predates this index file; keep the
                // session usable with minimal metadata
                let mut meta = SessionMeta::new(
                    session_id,
                    String::new(),
                    crate::types::DocumentFormat::PlainText,
                    String::new(),
                );
                meta.chunk_count = index.len() as u32;
                meta
            });

        let handle = Arc::new(SessionHandle::new(meta, index));

        match self.sessions.entry(session_id) {
            Entry::Occupied(_) => Err(Error::DuplicateSession(session_id)),
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&handle));
                tracing::info!(session_id = %session_id, "session loaded from storage");
                Ok(handle)
            }
        }
    }

    /// Destroy a session: drop the live handle, erase its metadata, and
    /// delete its persisted index. Idempotent; destroying an unknown
    /// session is a no-op.
    pub fn destroy(&self, session_id: Uuid) -> Result<()> {
        let was_live = self.sessions.remove(&session_id).is_some();
        let was_known = self.registry.lock().remove(&session_id).is_some();
        VectorIndex::destroy(&self.storage_dir, session_id)?;

        if was_known {
            self.save_registry()?;
        }
        if was_live || was_known {
            tracing::info!(session_id = %session_id, "session destroyed");
        }

        Ok(())
    }

    /// Whether the session is live in memory
    pub fn contains(&self, session_id: Uuid) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether any sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Destroy sessions idle for longer than `max_idle`; returns how many
    /// were reaped.
    ///
    /// Sessions carry no automatic expiry; an embedder that wants reaping
    /// calls this on its own schedule.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<Uuid> = self
            .sessions
            .iter()
            .filter(|entry| entry.value().idle_for() > max_idle)
            .map(|entry| *entry.key())
            .collect();

        let mut reaped = 0;
        for session_id in stale {
            if self.destroy(session_id).is_ok() {
                reaped += 1;
            }
        }

        if reaped > 0 {
            tracing::info!(reaped, "reaped idle sessions");
        }

        reaped
    }

    /// Persist the metadata registry, temp file then rename
    fn save_registry(&self) -> Result<()> {
        let path = self.storage_dir.join(REGISTRY_FILE);
        let tmp = path.with_extension("json.tmp");

        let data = {
            let registry = self.registry.lock();
            serde_json::to_vec(&*registry)?
        };

        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, DocumentFormat, Locator};

    fn store() -> (tempfile::TempDir, SessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn meta(session_id: Uuid) -> SessionMeta {
        SessionMeta::new(
            session_id,
            "doc.txt".to_string(),
            DocumentFormat::PlainText,
            "hash".to_string(),
        )
    }

    fn built_index(session_id: Uuid) -> VectorIndex {
        let mut index = VectorIndex::new(session_id);
        let chunk = Chunk::new(session_id, 0, "text".into(), Locator::default(), 0);
        index.upsert(&chunk, vec![1.0, 0.0]).unwrap();
        index
    }

    #[test]
    fn test_create_get_destroy() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();

        let handle = store.get(id).unwrap();
        assert_eq!(handle.meta().document_name, "doc.txt");
        assert!(handle.index.read().is_empty());

        store.destroy(id).unwrap();
        assert!(matches!(store.get(id), Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_destroy_is_idempotent() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();
        store.destroy(id).unwrap();
        store.destroy(id).unwrap();
        store.destroy(Uuid::new_v4()).unwrap();
    }

    #[test]
    fn test_duplicate_session_is_rejected() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();
        let err = store.create_session(meta(id)).unwrap_err();
        assert!(matches!(err, Error::DuplicateSession(dup) if dup == id));
    }

    #[test]
    fn test_install_index_updates_chunk_count() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();
        store.install_index(id, built_index(id)).unwrap();

        let handle = store.get(id).unwrap();
        assert_eq!(handle.meta().chunk_count, 1);
        assert_eq!(handle.index.read().len(), 1);
    }

    #[test]
    fn test_sessions_survive_a_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = Uuid::new_v4();

        {
            let store = SessionStore::new(dir.path().to_path_buf()).unwrap();
            store.create_session(meta(id)).unwrap();
            let index = built_index(id);
            index.persist(dir.path()).unwrap();
            store.install_index(id, index).unwrap();
        }

        // A fresh store over the same directory revives the session with
        // its original metadata
        let store = SessionStore::new(dir.path().to_path_buf()).unwrap();
        assert!(!store.contains(id));
        let handle = store.get(id).unwrap();
        assert_eq!(handle.meta().document_name, "doc.txt");
        assert_eq!(handle.index.read().len(), 1);
        assert!(store.contains(id));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let (_dir, store) = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        store.create_session(meta(a)).unwrap();
        store.create_session(meta(b)).unwrap();
        store.install_index(a, built_index(a)).unwrap();
        store.install_index(b, built_index(b)).unwrap();

        store.destroy(a).unwrap();

        // b is untouched
        let handle = store.get(b).unwrap();
        assert_eq!(handle.index.read().len(), 1);
        assert!(matches!(store.get(a), Err(Error::SessionNotFound(_))));
    }

    #[test]
    fn test_destroy_leaves_no_persisted_state() {
        let (dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();
        let index = built_index(id);
        index.persist(dir.path()).unwrap();
        store.install_index(id, index).unwrap();

        store.destroy(id).unwrap();

        assert!(!VectorIndex::exists(dir.path(), id));
        let registry: HashMap<Uuid, SessionMeta> = serde_json::from_slice(
            &std::fs::read(dir.path().join(REGISTRY_FILE)).unwrap(),
        )
        .unwrap();
        assert!(!registry.contains_key(&id));
    }

    #[test]
    fn test_reap_idle_only_removes_stale_sessions() {
        let (_dir, store) = store();
        let id = Uuid::new_v4();
        store.create_session(meta(id)).unwrap();

        // Fresh session survives a generous threshold
        assert_eq!(store.reap_idle(Duration::from_secs(3600)), 0);
        assert!(store.contains(id));

        // Zero threshold reaps everything idle
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.reap_idle(Duration::from_millis(1)), 1);
        assert!(!store.contains(id));
    }
}
