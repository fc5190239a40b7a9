//! Character store: the generic store specialised for player characters.
//!
//! A player may own several characters, so records are keyed by the
//! composite `(owner, slot)` pair — the cache never conflates two
//! characters of the same owner. Records live flat under one directory:
//!
//! ```text
//! characters/<owner-uuid>.<slot>.bin
//! ```

use crate::character::Character;
use crate::error::{StoreError, StoreResult};
use crate::store::{PersistentStore, Shared, StorageLayout};
use crate::types::PlayerId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

const CHARACTERS_DIR: &str = "characters";
const RECORD_EXT: &str = "bin";

/// Composite cache key / params for a character: owner plus slot index.
pub type CharacterRef = (PlayerId, u8);

/// Layout of character records.
pub struct CharacterLayout;

impl StorageLayout for CharacterLayout {
    type Entity = Character;
    type Key = CharacterRef;
    type Params = CharacterRef;

    fn key(&self, params: &CharacterRef) -> CharacterRef {
        *params
    }

    fn params_of(&self, entity: &Character) -> CharacterRef {
        (entity.owner, entity.slot)
    }

    fn record_path(&self, root: &Path, params: &CharacterRef) -> PathBuf {
        let (owner, slot) = params;
        root.join(CHARACTERS_DIR)
            .join(format!("{owner}.{slot}.{RECORD_EXT}"))
    }
}

/// Cache-backed store for [`Character`] records.
pub struct CharacterStore {
    inner: PersistentStore<CharacterLayout>,
    max_per_owner: u8,
}

impl CharacterStore {
    /// Create a character store rooted at `root`, caching at most
    /// `capacity` characters, with at most `max_per_owner` slots per
    /// player.
    pub fn new(root: impl Into<PathBuf>, capacity: usize, max_per_owner: u8) -> Self {
        let inner = PersistentStore::new(root, CharacterLayout, capacity);
        info!(
            root = %inner.root().display(),
            capacity,
            max_per_owner,
            "character store opened"
        );
        Self {
            inner,
            max_per_owner,
        }
    }

    /// Pure cache lookup; no I/O.
    pub fn get_cached(&self, character: &CharacterRef) -> Option<Shared<Character>> {
        self.inner.get_cached(character)
    }

    /// Cached copy if resident, otherwise hydrate from disk.
    ///
    /// # Errors
    /// Propagates I/O and decode failures; absence is `Ok(None)`.
    pub fn get(&self, character: &CharacterRef) -> StoreResult<Option<Shared<Character>>> {
        self.inner.get(character)
    }

    /// Persist a character, fully overwriting its record.
    ///
    /// # Errors
    /// Propagates encode and I/O failures.
    pub fn save(&self, character: &Character) -> StoreResult<()> {
        self.inner.persist(character)
    }

    /// Remove the on-disk record (absence tolerated) and evict.
    ///
    /// # Errors
    /// Propagates I/O failures other than absence.
    pub fn delete(&self, character: &CharacterRef) -> StoreResult<()> {
        self.inner.delete(character)
    }

    /// Persist-then-evict if resident; no-op otherwise.
    ///
    /// # Errors
    /// Propagates persist failures.
    pub fn unload(&self, character: &CharacterRef) -> StoreResult<()> {
        self.inner.unload(character)
    }

    /// Create a character in the owner's first free slot, persist it,
    /// and cache it.
    ///
    /// # Errors
    /// Returns [`StoreError::SlotLimit`] when every slot up to the
    /// configured cap is taken; propagates I/O failures.
    pub fn create(&self, owner: PlayerId) -> StoreResult<Shared<Character>> {
        let taken = self.slots(owner)?;
        let slot = (0..self.max_per_owner)
            .find(|slot| !taken.contains(slot))
            .ok_or(StoreError::SlotLimit {
                owner,
                limit: self.max_per_owner,
            })?;

        let character = Character::new(owner, slot);
        self.inner.persist(&character)?;
        let shared = Arc::new(Mutex::new(character));
        self.inner.admit((owner, slot), Arc::clone(&shared));
        debug!(owner = %owner, slot, "character created");
        Ok(shared)
    }

    /// Slots currently occupied on disk by `owner`'s characters.
    ///
    /// # Errors
    /// Propagates listing failures; a missing directory is empty.
    pub fn slots(&self, owner: PlayerId) -> StoreResult<Vec<u8>> {
        let dir = self.inner.root().join(CHARACTERS_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{owner}.");
        let suffix = format!(".{RECORD_EXT}");
        let mut slots = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(slot) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(&suffix))
                .and_then(|slot| slot.parse::<u8>().ok())
            else {
                continue;
            };
            slots.push(slot);
        }
        slots.sort_unstable();
        Ok(slots)
    }

    /// Templating variables for a character.
    pub fn variables(&self, character: &Character) -> BTreeMap<String, String> {
        character.variables()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
