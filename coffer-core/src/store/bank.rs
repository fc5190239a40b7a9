//! Bank store: the generic store specialised for the two-level bank
//! aggregate, plus the IBAN secondary index.
//!
//! On-disk layout:
//!
//! ```text
//! banks/<bank-uuid>/general.bin
//! banks/<bank-uuid>/customers/<player-uuid>.bin
//! banks/<bank-uuid>/loans/<loan-uuid>.bin
//! ```
//!
//! Customers and loans are stored as sibling records but owned by the
//! bank: they hydrate and persist with their parent, never on their own
//! schedule. Live customer records sit in a process-wide arena keyed by
//! [`CustomerKey`]; the IBAN index maps account numbers to the same
//! keys. Index and arena entries never outlive the bank they belong to:
//! `unload`, `delete`, and cache eviction all purge them in the same
//! operation that drops the bank.

use crate::bank::{Bank, BankCustomer, BankLoan};
use crate::codec::BinaryCodec;
use crate::error::StoreResult;
use crate::store::{
    PersistentStore, Shared, StorageLayout, read_record, remove_record, write_record,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::types::{BankId, CustomerKey, Iban, PlayerId};

const BANKS_DIR: &str = "banks";
const ROOT_RECORD: &str = "general.bin";
const CUSTOMERS_DIR: &str = "customers";
const LOANS_DIR: &str = "loans";
const RECORD_EXT: &str = "bin";

/// Layout of bank root records.
pub struct BankLayout;

impl StorageLayout for BankLayout {
    type Entity = Bank;
    type Key = BankId;
    type Params = BankId;

    fn key(&self, params: &BankId) -> BankId {
        *params
    }

    fn params_of(&self, entity: &Bank) -> BankId {
        entity.id
    }

    fn record_path(&self, root: &Path, params: &BankId) -> PathBuf {
        root.join(BANKS_DIR).join(params.to_string()).join(ROOT_RECORD)
    }
}

/// Cache-backed store for [`Bank`] aggregates.
pub struct BankStore {
    inner: PersistentStore<BankLayout>,
    /// Single live copy of every resident customer record.
    customers: DashMap<CustomerKey, Shared<BankCustomer>>,
    /// Secondary index resolving transfers without knowing the bank.
    ibans: DashMap<Iban, CustomerKey>,
    root_codec: BinaryCodec<Bank>,
    customer_codec: BinaryCodec<BankCustomer>,
    loan_codec: BinaryCodec<BankLoan>,
}

impl BankStore {
    /// Create a bank store rooted at `root`, caching at most `capacity`
    /// banks.
    pub fn new(root: impl Into<PathBuf>, capacity: usize) -> Self {
        let inner = PersistentStore::new(root, BankLayout, capacity);
        info!(root = %inner.root().display(), capacity, "bank store opened");
        Self {
            inner,
            customers: DashMap::new(),
            ibans: DashMap::new(),
            root_codec: BinaryCodec::new(),
            customer_codec: BinaryCodec::new(),
            loan_codec: BinaryCodec::new(),
        }
    }

    fn bank_dir(&self, bank: BankId) -> PathBuf {
        self.inner.root().join(BANKS_DIR).join(bank.to_string())
    }

    fn customers_dir(&self, bank: BankId) -> PathBuf {
        self.bank_dir(bank).join(CUSTOMERS_DIR)
    }

    fn loans_dir(&self, bank: BankId) -> PathBuf {
        self.bank_dir(bank).join(LOANS_DIR)
    }

    fn customer_path(&self, bank: BankId, player: PlayerId) -> PathBuf {
        self.customers_dir(bank)
            .join(format!("{player}.{RECORD_EXT}"))
    }

    fn loan_path(&self, bank: BankId, loan: &BankLoan) -> PathBuf {
        self.loans_dir(bank).join(format!("{}.{RECORD_EXT}", loan.id))
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Pure cache lookup; no I/O.
    pub fn get_cached(&self, bank: &BankId) -> Option<Shared<Bank>> {
        self.inner.get_cached(bank)
    }

    /// Cached copy if resident, otherwise hydrate from disk.
    ///
    /// # Errors
    /// Propagates root-record I/O and decode failures.
    pub fn get(&self, bank: &BankId) -> StoreResult<Option<Shared<Bank>>> {
        if let Some(cached) = self.inner.get_cached(bank) {
            return Ok(Some(cached));
        }
        self.load(*bank)
    }

    /// Resolve a customer via the IBAN index.
    pub fn customer_by_iban(&self, iban: &Iban) -> Option<(CustomerKey, Shared<BankCustomer>)> {
        let key = *self.ibans.get(iban)?.value();
        let customer = Arc::clone(self.customers.get(&key)?.value());
        Some((key, customer))
    }

    /// First resident account owned by `player`, across all banks.
    pub fn customer_by_player(&self, player: PlayerId) -> Option<Shared<BankCustomer>> {
        self.customers
            .iter()
            .find(|entry| entry.key().player == player)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every resident bank (for the flush sweep).
    pub fn cached_banks(&self) -> Vec<Shared<Bank>> {
        self.inner.cache().values()
    }

    /// Number of IBAN index entries currently registered.
    pub fn indexed_ibans(&self) -> usize {
        self.ibans.len()
    }

    // ------------------------------------------------------------------
    // Hydration
    // ------------------------------------------------------------------

    /// Load one bank from disk: root record first (hard failure
    /// propagates), then its customers and loans, where a single corrupt
    /// or unreadable child is logged and skipped.
    ///
    /// # Errors
    /// Propagates root-record failures; a missing root is `Ok(None)`.
    pub fn load(&self, bank_id: BankId) -> StoreResult<Option<Shared<Bank>>> {
        let root_path = self.inner.record_path(&bank_id);
        let Some(mut bank) = read_record(&self.root_codec, &root_path)? else {
            return Ok(None);
        };

        // A reload replaces whatever this bank had registered before.
        self.purge_bank(bank_id);
        self.hydrate_customers(&mut bank);
        self.hydrate_loans(&mut bank);

        debug!(
            bank = %bank_id,
            customers = bank.customers.len(),
            loans = bank.loans.len(),
            "hydrated bank"
        );

        let shared = Arc::new(Mutex::new(bank));
        if let Some((evicted_id, evicted)) = self.inner.admit_raw(bank_id, Arc::clone(&shared)) {
            self.flush_evicted(evicted_id, &evicted);
        }
        Ok(Some(shared))
    }

    fn hydrate_customers(&self, bank: &mut Bank) {
        for path in uuid_records(&self.customers_dir(bank.id)) {
            match read_record(&self.customer_codec, &path) {
                Ok(Some(customer)) => {
                    let key = CustomerKey {
                        bank: customer.bank,
                        player: customer.player,
                    };
                    self.ibans.insert(customer.iban.clone(), key);
                    bank.customers.insert(customer.player);
                    self.customers.insert(key, Arc::new(Mutex::new(customer)));
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(bank = %bank.id, path = %path.display(), error = %err,
                        "skipping unreadable customer record");
                }
            }
        }
    }

    fn hydrate_loans(&self, bank: &mut Bank) {
        for path in uuid_records(&self.loans_dir(bank.id)) {
            match read_record(&self.loan_codec, &path) {
                Ok(Some(loan)) => bank.loans.push(loan),
                Ok(None) => {}
                Err(err) => {
                    warn!(bank = %bank.id, path = %path.display(), error = %err,
                        "skipping unreadable loan record");
                }
            }
        }
    }

    /// Startup recovery: scan the banks directory and load every
    /// UUID-named subdirectory. Invalid entries and failed loads are
    /// logged and skipped; the scan never aborts.
    ///
    /// # Errors
    /// Only fails if the top-level listing itself fails (a missing
    /// banks directory is an empty store).
    pub fn load_all(&self) -> StoreResult<Vec<Shared<Bank>>> {
        let banks_root = self.inner.root().join(BANKS_DIR);
        let entries = match fs::read_dir(&banks_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut loaded = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                warn!(path = %entry.path().display(), "skipping non-UTF-8 entry");
                continue;
            };
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(uuid) = Uuid::parse_str(name) else {
                warn!(name, "skipping bank directory without a valid UUID name");
                continue;
            };
            match self.load(BankId(uuid)) {
                Ok(Some(bank)) => loaded.push(bank),
                Ok(None) => warn!(bank = name, "bank directory has no root record"),
                Err(err) => warn!(bank = name, error = %err, "failed to load bank"),
            }
        }
        info!(banks = loaded.len(), "bank recovery scan complete");
        Ok(loaded)
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    /// Persist the root record and every current customer and loan
    /// record. Full rewrite on each call; the bank stays cached.
    ///
    /// Callers should hold the bank's lock for a consistent snapshot.
    ///
    /// # Errors
    /// Propagates the first encode or I/O failure.
    pub fn save(&self, bank: &Bank) -> StoreResult<()> {
        write_record(&self.root_codec, &self.inner.record_path(&bank.id), bank)?;

        for player in &bank.customers {
            let key = CustomerKey {
                bank: bank.id,
                player: *player,
            };
            match self.customers.get(&key) {
                Some(entry) => {
                    let customer = entry.value().lock();
                    self.save_customer(&customer)?;
                }
                None => warn!(bank = %bank.id, player = %player,
                    "membership without a live customer record; nothing to save"),
            }
        }
        for loan in &bank.loans {
            write_record(&self.loan_codec, &self.loan_path(bank.id, loan), loan)?;
        }
        debug!(bank = %bank.id, "saved bank aggregate");
        Ok(())
    }

    /// Persist a single customer record.
    ///
    /// # Errors
    /// Propagates encode and I/O failures.
    pub fn save_customer(&self, customer: &BankCustomer) -> StoreResult<()> {
        write_record(
            &self.customer_codec,
            &self.customer_path(customer.bank, customer.player),
            customer,
        )
    }

    /// Persist the bank and evict it, purging its IBAN index and arena
    /// entries in the same operation. No-op when not resident.
    ///
    /// # Errors
    /// Propagates save failures; on failure the bank stays resident.
    pub fn unload(&self, bank_id: BankId) -> StoreResult<()> {
        if let Some(shared) = self.inner.get_cached(&bank_id) {
            {
                let bank = shared.lock();
                self.save(&bank)?;
            }
            self.inner.cache().invalidate(&bank_id);
            self.purge_bank(bank_id);
        }
        Ok(())
    }

    /// Remove the bank's entire on-disk tree and every in-memory trace
    /// of it (cache, arena, IBAN index). Absent records are tolerated.
    ///
    /// # Errors
    /// Propagates I/O failures other than absence.
    pub fn delete(&self, bank_id: BankId) -> StoreResult<()> {
        match fs::remove_dir_all(self.bank_dir(bank_id)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.inner.cache().invalidate(&bank_id);
        self.purge_bank(bank_id);
        Ok(())
    }

    /// Write back an evicted bank best-effort, then purge its index
    /// entries so nothing dangles at a no-longer-resident aggregate.
    fn flush_evicted(&self, bank_id: BankId, shared: &Shared<Bank>) {
        {
            let bank = shared.lock();
            if let Err(err) = self.save(&bank) {
                warn!(bank = %bank_id, error = %err, "failed to write back evicted bank");
            }
        }
        self.purge_bank(bank_id);
    }

    /// Drop every arena and IBAN-index entry belonging to `bank_id`.
    fn purge_bank(&self, bank_id: BankId) {
        self.ibans.retain(|_, key| key.bank != bank_id);
        self.customers.retain(|key, _| key.bank != bank_id);
    }

    // ------------------------------------------------------------------
    // Customer lifecycle
    // ------------------------------------------------------------------

    /// Open an account for `player` at the given bank: derive the IBAN,
    /// add the membership, and register the arena and index entries.
    /// Returns the existing record if the player already has one here.
    ///
    /// The caller holds the bank's lock (it passes `&mut Bank`).
    pub fn create_customer(&self, bank: &mut Bank, player: PlayerId) -> Shared<BankCustomer> {
        let key = CustomerKey {
            bank: bank.id,
            player,
        };
        if bank.customers.contains(&player) {
            if let Some(existing) = self.customers.get(&key) {
                return Arc::clone(existing.value());
            }
        }

        let customer = BankCustomer::new(bank.id, player);
        let iban = customer.iban.clone();
        let shared = Arc::new(Mutex::new(customer));
        bank.customers.insert(player);
        self.customers.insert(key, Arc::clone(&shared));
        self.ibans.insert(iban, key);
        debug!(bank = %bank.id, player = %player, "customer created");
        shared
    }

    /// Close `player`'s account: drop the membership, invalidate the
    /// IBAN index entry via the identical derivation the create path
    /// used, and remove the on-disk record so the account cannot
    /// resurface on the next hydration.
    ///
    /// # Errors
    /// Propagates I/O failures other than absence.
    pub fn delete_customer(&self, bank: &mut Bank, player: PlayerId) -> StoreResult<()> {
        bank.customers.remove(&player);
        self.ibans.remove(&Iban::derive(bank.id, player));
        self.customers.remove(&CustomerKey {
            bank: bank.id,
            player,
        });
        remove_record(&self.customer_path(bank.id, player))
    }

    // ------------------------------------------------------------------
    // Templating
    // ------------------------------------------------------------------

    /// Templating variables for a bank.
    pub fn variables(&self, bank: &Bank) -> BTreeMap<String, String> {
        bank.variables()
    }
}

/// List the `.bin` records in `dir` whose file stem is a syntactically
/// valid UUID. A missing directory is empty; unreadable entries are
/// logged and skipped.
fn uuid_records(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to list record directory");
            return Vec::new();
        }
    };

    let mut records = Vec::new();
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let valid = path.extension().and_then(|ext| ext.to_str()) == Some(RECORD_EXT)
            && path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .is_some_and(|stem| Uuid::parse_str(stem).is_ok());
        if valid {
            records.push(path);
        } else {
            warn!(path = %path.display(), "skipping entry without a valid UUID record name");
        }
    }
    records
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
