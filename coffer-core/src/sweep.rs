//! Background flush sweep.
//!
//! A dedicated thread periodically persists every cached bank so a crash
//! loses at most one interval of mutations. Each bank is saved under the
//! same per-entity lock foreground transfers take, so the sweep never
//! observes a half-updated balance. A failing save is logged and the
//! sweep moves on to the next bank rather than aborting the pass.

use crate::store::bank::BankStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Granularity at which the sweep thread checks its stop flag.
const STOP_POLL: Duration = Duration::from_millis(50);

/// Persist every currently cached bank. Returns how many were saved;
/// failures are logged and skipped.
pub fn flush_cached(banks: &BankStore) -> usize {
    let mut flushed = 0;
    for shared in banks.cached_banks() {
        let bank = shared.lock();
        match banks.save(&bank) {
            Ok(()) => flushed += 1,
            Err(err) => warn!(bank = %bank.id, error = %err, "sweep failed to persist bank"),
        }
    }
    debug!(flushed, "flush sweep pass complete");
    flushed
}

/// Handle to a running sweep thread. Dropping it stops the thread and
/// waits for the in-flight pass to finish.
pub struct SweepHandle {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl SweepHandle {
    /// Signal the sweep to stop and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SweepHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Spawn the periodic sweep over `banks`, one pass per `interval`.
#[must_use]
pub fn spawn(banks: Arc<BankStore>, interval: Duration) -> SweepHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);

    let thread = std::thread::spawn(move || {
        info!(interval_secs = interval.as_secs(), "flush sweep started");
        let mut elapsed = Duration::ZERO;
        loop {
            if stop_flag.load(Ordering::Relaxed) {
                break;
            }
            std::thread::sleep(STOP_POLL.min(interval));
            elapsed += STOP_POLL.min(interval);
            if elapsed >= interval {
                elapsed = Duration::ZERO;
                let _ = flush_cached(&banks);
            }
        }
        // Final pass so a clean shutdown leaves nothing unflushed.
        let _ = flush_cached(&banks);
        info!("flush sweep stopped");
    });

    SweepHandle {
        stop,
        thread: Some(thread),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::Bank;
    use crate::types::PlayerId;

    #[test]
    fn flush_persists_in_memory_mutations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let banks = BankStore::new(dir.path(), 16);

        let mut bank = Bank::new("Sweep Bank", 100);
        let bank_id = bank.id;
        let customer = banks.create_customer(&mut bank, PlayerId::new());
        let iban = customer.lock().iban.clone();
        banks.save(&bank).expect("save");
        let _ = banks.load(bank_id).expect("load").expect("present");

        // Mutate in memory only.
        banks
            .customer_by_iban(&iban)
            .expect("resident")
            .1
            .lock()
            .balance = 4321;

        assert_eq!(flush_cached(&banks), 1);

        // Rehydrate from disk: the mutation survived.
        banks.unload(bank_id).expect("unload");
        let _ = banks.get(&bank_id).expect("get").expect("present");
        let (_, rehydrated) = banks.customer_by_iban(&iban).expect("rehydrated");
        assert_eq!(rehydrated.lock().balance, 4321);
    }

    #[test]
    fn spawned_sweep_stops_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let banks = Arc::new(BankStore::new(dir.path(), 16));

        let handle = spawn(Arc::clone(&banks), Duration::from_millis(10));
        std::thread::sleep(Duration::from_millis(40));
        handle.stop();
    }

    #[test]
    fn flush_on_empty_cache_is_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let banks = BankStore::new(dir.path(), 16);
        assert_eq!(flush_cached(&banks), 0);
    }
}
