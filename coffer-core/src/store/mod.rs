//! Generic cache-backed persistence manager.
//!
//! [`PersistentStore`] composes a bounded [`EntityCache`] with a
//! [`RecordCodec`] and a [`StorageLayout`] that maps entities to paths
//! under the store's root. Semantics:
//!
//! - load-on-miss: `get` serves the cached copy or hydrates from disk
//! - at most one in-memory instance per key; cached values are
//!   `Arc<Mutex<T>>`, so every caller shares (and locks) the same copy
//! - a missing record is `Ok(None)`; a malformed one is a hard
//!   [`StoreError::Decode`] that propagates
//! - `persist` fully overwrites the record, creating parent directories
//! - `unload` persists then evicts, the one path that guarantees
//!   in-memory mutations reach disk before the entity leaves the cache
//! - an entry pushed out by cache pressure is written back best-effort

pub mod bank;
pub mod character;

use crate::cache::EntityCache;
use crate::codec::{BinaryCodec, RecordCodec};
use crate::error::{StoreError, StoreResult};
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// The single shared in-memory copy of a cached entity, guarded by its
/// per-entity lock.
pub type Shared<T> = Arc<Mutex<T>>;

/// Maps one entity type onto cache keys and record paths.
pub trait StorageLayout {
    /// The entity this layout persists.
    type Entity: Serialize + DeserializeOwned;
    /// Cache key.
    type Key: Hash + Eq + Clone;
    /// Identifying information needed to compute a storage location.
    /// May carry more than the key does.
    type Params;

    /// Cache key for the given params.
    fn key(&self, params: &Self::Params) -> Self::Key;

    /// Params recovered from a live entity (entities carry their own
    /// identity), used for write-back when the caller only has a value.
    fn params_of(&self, entity: &Self::Entity) -> Self::Params;

    /// Absolute path of the entity's record under `root`.
    fn record_path(&self, root: &Path, params: &Self::Params) -> PathBuf;
}

// ---------------------------------------------------------------------------
// Record I/O helpers
// ---------------------------------------------------------------------------

/// Write one record, creating parent directories as needed. Fully
/// overwrites any previous record; idempotent.
pub(crate) fn write_record<T, C: RecordCodec<T>>(
    codec: &C,
    path: &Path,
    value: &T,
) -> StoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = codec.encode(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Read one record. A missing file is `Ok(None)`; any other I/O failure
/// or a decode failure propagates.
pub(crate) fn read_record<T, C: RecordCodec<T>>(
    codec: &C,
    path: &Path,
) -> StoreResult<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let value = codec.decode(&bytes).map_err(|err| match err {
        StoreError::Decode { message, .. } => StoreError::Decode {
            path: path.display().to_string(),
            message,
        },
        other => other,
    })?;
    Ok(Some(value))
}

/// Remove a record if present; already-absent is not an error.
pub(crate) fn remove_record(path: &Path) -> StoreResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

// ---------------------------------------------------------------------------
// PersistentStore
// ---------------------------------------------------------------------------

/// Generic cache-backed entity store.
pub struct PersistentStore<L: StorageLayout> {
    root: PathBuf,
    layout: L,
    cache: EntityCache<L::Key, Shared<L::Entity>>,
    codec: BinaryCodec<L::Entity>,
}

impl<L: StorageLayout> PersistentStore<L> {
    /// Create a store rooted at `root` caching at most `capacity`
    /// entities.
    pub fn new(root: impl Into<PathBuf>, layout: L, capacity: usize) -> Self {
        Self {
            root: root.into(),
            layout,
            cache: EntityCache::with_capacity(capacity),
            codec: BinaryCodec::new(),
        }
    }

    /// Storage root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The layout in use.
    pub fn layout(&self) -> &L {
        &self.layout
    }

    /// Direct cache access, for specialised stores layered on top.
    pub fn cache(&self) -> &EntityCache<L::Key, Shared<L::Entity>> {
        &self.cache
    }

    /// Record path for the given params.
    pub fn record_path(&self, params: &L::Params) -> PathBuf {
        self.layout.record_path(&self.root, params)
    }

    /// Pure cache lookup; no I/O.
    pub fn get_cached(&self, key: &L::Key) -> Option<Shared<L::Entity>> {
        self.cache.get(key)
    }

    /// Cached copy if resident, otherwise load from disk and cache.
    ///
    /// # Errors
    /// Propagates I/O and decode failures; absence is `Ok(None)`.
    pub fn get(&self, params: &L::Params) -> StoreResult<Option<Shared<L::Entity>>> {
        if let Some(cached) = self.cache.get(&self.layout.key(params)) {
            return Ok(Some(cached));
        }
        self.load(params)
    }

    /// Read the record from disk, cache it, and return the shared copy.
    ///
    /// # Errors
    /// A missing record yields `Ok(None)`; a present-but-malformed
    /// record is a hard [`StoreError::Decode`].
    pub fn load(&self, params: &L::Params) -> StoreResult<Option<Shared<L::Entity>>> {
        let path = self.record_path(params);
        let Some(entity) = read_record(&self.codec, &path)? else {
            return Ok(None);
        };
        let shared = Arc::new(Mutex::new(entity));
        self.admit(self.layout.key(params), Arc::clone(&shared));
        debug!(path = %path.display(), "hydrated record");
        Ok(Some(shared))
    }

    /// Persist an entity, fully overwriting its record.
    ///
    /// The entity stays cached; callers should hold its lock while the
    /// write happens.
    ///
    /// # Errors
    /// Propagates encode and I/O failures.
    pub fn persist(&self, entity: &L::Entity) -> StoreResult<()> {
        let params = self.layout.params_of(entity);
        write_record(&self.codec, &self.record_path(&params), entity)
    }

    /// Remove the on-disk record (no error if already absent) and evict
    /// the entity from the cache.
    ///
    /// # Errors
    /// Propagates I/O failures other than absence.
    pub fn delete(&self, params: &L::Params) -> StoreResult<()> {
        remove_record(&self.record_path(params))?;
        self.cache.invalidate(&self.layout.key(params));
        Ok(())
    }

    /// If the entity is cached, persist it and evict it. No-op when not
    /// resident.
    ///
    /// # Errors
    /// Propagates persist failures; on failure the entity stays cached.
    pub fn unload(&self, params: &L::Params) -> StoreResult<()> {
        let key = self.layout.key(params);
        if let Some(shared) = self.cache.get(&key) {
            {
                let entity = shared.lock();
                write_record(&self.codec, &self.record_path(params), &*entity)?;
            }
            self.cache.invalidate(&key);
        }
        Ok(())
    }

    /// Insert into the cache, writing back whatever entry got evicted.
    pub fn admit(&self, key: L::Key, value: Shared<L::Entity>) {
        if let Some((_, evicted)) = self.admit_raw(key, value) {
            let entity = evicted.lock();
            let path = self.record_path(&self.layout.params_of(&entity));
            if let Err(err) = write_record(&self.codec, &path, &*entity) {
                warn!(path = %path.display(), error = %err, "failed to write back evicted entity");
            }
        }
    }

    /// Insert into the cache and hand any evicted entry back to the
    /// caller instead of writing it back. Specialised stores use this
    /// when eviction has side effects beyond the record itself.
    pub fn admit_raw(
        &self,
        key: L::Key,
        value: Shared<L::Entity>,
    ) -> Option<(L::Key, Shared<L::Entity>)> {
        self.cache.put(key, value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
