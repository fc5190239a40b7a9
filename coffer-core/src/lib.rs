//! # Coffer Core Library
//!
//! Persistent, cache-backed entity store for a multiplayer server's
//! bank/economy and player-character subsystems, plus the transactional
//! economy engine built on it.
//!
//! Three layers, bottom up:
//!
//! - [`store::PersistentStore`] — generic load-on-miss / write-back
//!   manager composing a bounded [`cache::EntityCache`] with a binary
//!   [`codec::RecordCodec`]. At most one in-memory copy per key; cached
//!   values carry their own per-entity lock.
//! - [`store::bank::BankStore`] / [`store::character::CharacterStore`] —
//!   the store specialised for the two-level bank aggregate (root +
//!   customers + loans, IBAN secondary index, directory-scan recovery)
//!   and for composite-keyed character records.
//! - [`economy::EconomyEngine`] — validated, lock-ordered balance
//!   mutations: `pay`, `deposit`, `withdraw`.
//!
//! Everything is constructed explicitly at startup ([`Coffer::open`])
//! and injected into consumers; there is no global state.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bank;
pub mod cache;
pub mod character;
pub mod codec;
pub mod config;
pub mod economy;
pub mod error;
pub mod store;
pub mod sweep;
pub mod template;
pub mod types;

pub use bank::{Bank, BankCustomer, BankLoan};
pub use character::Character;
pub use config::CofferConfig;
pub use economy::EconomyEngine;
pub use error::{EconomyError, Party, StoreError};
pub use store::bank::BankStore;
pub use store::character::CharacterStore;
pub use types::*;

use std::path::Path;
use std::sync::Arc;

/// The fully wired subsystem: both stores plus the handle needed to
/// build engines and sweeps on top.
pub struct Coffer {
    /// Bank aggregate store.
    pub banks: Arc<BankStore>,
    /// Player-character store.
    pub characters: Arc<CharacterStore>,
}

impl Coffer {
    /// Construct both stores under one data directory.
    #[must_use]
    pub fn open(data_dir: &Path, config: &CofferConfig) -> Self {
        let banks = Arc::new(BankStore::new(data_dir, config.cache.resident_banks));
        let characters = Arc::new(CharacterStore::new(
            data_dir,
            config.cache.resident_characters,
            config.characters.max_per_owner,
        ));
        Self { banks, characters }
    }

    /// An economy engine over this instance's bank store.
    #[must_use]
    pub fn economy(&self) -> EconomyEngine {
        EconomyEngine::new(Arc::clone(&self.banks))
    }

    /// Spawn the periodic flush sweep if enabled by `config`.
    #[must_use]
    pub fn spawn_sweep(&self, config: &CofferConfig) -> Option<sweep::SweepHandle> {
        if !config.sweep.enabled {
            return None;
        }
        Some(sweep::spawn(
            Arc::clone(&self.banks),
            std::time::Duration::from_secs(config.sweep.interval_secs),
        ))
    }
}
