//! Transactional economy engine over bank-store-resolved customers.
//!
//! All three operations mutate balances inside the per-customer lock,
//! spanning "read balance → validate → write balance → persist" as one
//! critical section. `pay` touches two accounts that other transfers may
//! target concurrently, so both locks are taken before any mutation, in
//! ascending [`CustomerKey`] order — independent of argument order — so
//! two opposing transfers on the same pair can never deadlock.

use crate::bank::BankCustomer;
use crate::error::{EconomyError, EconomyResult, Party};
use crate::store::Shared;
use crate::store::bank::BankStore;
use crate::types::{BankId, CustomerKey, Iban};
use std::sync::Arc;
use tracing::debug;

/// Validated, lock-ordered balance mutations.
pub struct EconomyEngine {
    banks: Arc<BankStore>,
}

impl EconomyEngine {
    /// Create an engine over the given bank store.
    #[must_use]
    pub fn new(banks: Arc<BankStore>) -> Self {
        Self { banks }
    }

    fn resolve_customer(
        &self,
        iban: &Iban,
        party: Party,
    ) -> EconomyResult<(CustomerKey, Shared<BankCustomer>)> {
        self.banks
            .customer_by_iban(iban)
            .ok_or(EconomyError::CustomerNotFound(party))
    }

    fn max_debt_of(&self, bank: BankId, party: Party) -> EconomyResult<i64> {
        let bank = self
            .banks
            .get(&bank)?
            .ok_or(EconomyError::BankNotFound(party))?;
        let max_debt = bank.lock().max_debt;
        Ok(max_debt)
    }

    /// Balance after debiting `amount`, or `None` when the debit would
    /// drop below `-max_debt`. A result that is not representable in
    /// `i64` is below any ceiling, so arithmetic overflow is reported
    /// the same way as an ordinary overdraft breach.
    fn debit(balance: i64, amount: i64, max_debt: i64) -> Option<i64> {
        let debited = balance.checked_sub(amount)?;
        (debited >= -max_debt).then_some(debited)
    }

    /// Transfer `amount` from the sender's account to the receiver's.
    ///
    /// Only the sender-side bank's overdraft ceiling gates the transfer;
    /// the receiver's bank is resolved (it must exist) but does not
    /// affect whether the payment is allowed. Debit, credit, and both
    /// persists form one logical transaction under both account locks.
    ///
    /// # Errors
    /// - [`EconomyError::InvalidAmount`] for `amount <= 0`
    /// - [`EconomyError::CustomerNotFound`] / [`EconomyError::BankNotFound`],
    ///   tagged with the failing party
    /// - [`EconomyError::InsufficientFunds`] when the debit would push the
    ///   sender below `-max_debt`; no balance changes
    /// - [`EconomyError::PartialPersist`] when the sender's record reached
    ///   disk but the receiver's did not; in-memory state is consistent
    pub fn pay(&self, sender_iban: &Iban, receiver_iban: &Iban, amount: i64) -> EconomyResult<()> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }

        let (sender_key, sender) = self.resolve_customer(sender_iban, Party::Sender)?;
        let (receiver_key, receiver) = self.resolve_customer(receiver_iban, Party::Receiver)?;
        let max_debt = self.max_debt_of(sender_key.bank, Party::Sender)?;
        // The receiver's bank must resolve, but its ceiling is irrelevant.
        let _ = self.max_debt_of(receiver_key.bank, Party::Receiver)?;

        if sender_key == receiver_key {
            // Self-transfer: one lock, zero net movement, still validated.
            let guard = sender.lock();
            if Self::debit(guard.balance, amount, max_debt).is_none() {
                return Err(EconomyError::InsufficientFunds { max_debt });
            }
            self.banks.save_customer(&guard)?;
            return Ok(());
        }

        // Canonical ascending-key order, regardless of argument order.
        let (mut sender_guard, mut receiver_guard);
        if sender_key < receiver_key {
            sender_guard = sender.lock();
            receiver_guard = receiver.lock();
        } else {
            receiver_guard = receiver.lock();
            sender_guard = sender.lock();
        }

        let Some(debited) = Self::debit(sender_guard.balance, amount, max_debt) else {
            return Err(EconomyError::InsufficientFunds { max_debt });
        };
        sender_guard.balance = debited;
        // Credits saturate at the representable maximum instead of wrapping.
        receiver_guard.balance = receiver_guard.balance.saturating_add(amount);

        self.banks.save_customer(&sender_guard)?;
        if let Err(err) = self.banks.save_customer(&receiver_guard) {
            return Err(EconomyError::PartialPersist {
                persisted: sender_guard.iban.clone(),
                failed: receiver_guard.iban.clone(),
                source: err,
            });
        }

        debug!(
            sender = %sender_guard.iban,
            receiver = %receiver_guard.iban,
            amount,
            "payment completed"
        );
        Ok(())
    }

    /// Credit `amount` to the account. No upper bound is enforced;
    /// balances saturate at `i64::MAX` rather than wrapping.
    ///
    /// # Errors
    /// [`EconomyError::InvalidAmount`] for `amount <= 0`;
    /// [`EconomyError::CustomerNotFound`] if the IBAN does not resolve;
    /// storage failures propagate.
    pub fn deposit(&self, iban: &Iban, amount: i64) -> EconomyResult<()> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let (_, customer) = self.resolve_customer(iban, Party::Sender)?;

        let mut guard = customer.lock();
        guard.balance = guard.balance.saturating_add(amount);
        self.banks.save_customer(&guard)?;
        debug!(iban = %guard.iban, amount, "deposit completed");
        Ok(())
    }

    /// Debit `amount` from the account, subject to the owning bank's
    /// overdraft ceiling.
    ///
    /// # Errors
    /// [`EconomyError::InvalidAmount`] for `amount <= 0`;
    /// [`EconomyError::CustomerNotFound`] / [`EconomyError::BankNotFound`];
    /// [`EconomyError::InsufficientFunds`] when the debit would exceed
    /// the ceiling; storage failures propagate.
    pub fn withdraw(&self, iban: &Iban, amount: i64) -> EconomyResult<()> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount(amount));
        }
        let (key, customer) = self.resolve_customer(iban, Party::Sender)?;
        let max_debt = self.max_debt_of(key.bank, Party::Sender)?;

        let mut guard = customer.lock();
        let Some(debited) = Self::debit(guard.balance, amount, max_debt) else {
            return Err(EconomyError::InsufficientFunds { max_debt });
        };
        guard.balance = debited;
        self.banks.save_customer(&guard)?;
        debug!(iban = %guard.iban, amount, "withdrawal completed");
        Ok(())
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

    struct Fixture {
        _dir: tempfile::TempDir,
        banks: Arc<BankStore>,
        engine: EconomyEngine,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let banks = Arc::new(BankStore::new(dir.path(), 16));
            let engine = EconomyEngine::new(Arc::clone(&banks));
            Self {
                _dir: dir,
                banks,
                engine,
            }
        }

        /// Persist and hydrate a bank with accounts at the given balances.
        fn bank(&self, max_debt: i64, balances: &[i64]) -> Vec<Iban> {
            let mut bank = Bank::new("Fixture Bank", max_debt);
            let bank_id = bank.id;
            let mut ibans = Vec::new();
            for &balance in balances {
                let customer = self.banks.create_customer(&mut bank, PlayerId::new());
                let mut guard = customer.lock();
                guard.balance = balance;
                ibans.push(guard.iban.clone());
            }
            self.banks.save(&bank).expect("save");
            let _ = self.banks.load(bank_id).expect("load").expect("present");
            // Hydration re-derives the arena; resolve the fresh records.
            ibans
        }

        fn balance(&self, iban: &Iban) -> i64 {
            self.banks
                .customer_by_iban(iban)
                .expect("resident")
                .1
                .lock()
                .balance
        }
    }

    #[test]
    fn pay_rejects_non_positive_amounts() {
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[50, 0]);

        for amount in [0, -5] {
            let err = fx
                .engine
                .pay(&ibans[0], &ibans[1], amount)
                .expect_err("must fail");
            assert!(matches!(err, EconomyError::InvalidAmount(_)));
        }
        assert_eq!(fx.balance(&ibans[0]), 50);
        assert_eq!(fx.balance(&ibans[1]), 0);
    }

    #[test]
    fn pay_rejects_unknown_ibans_with_the_right_party() {
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[50]);
        let ghost = Iban("MC0000000000000000".to_string());

        let err = fx
            .engine
            .pay(&ghost, &ibans[0], 10)
            .expect_err("must fail");
        assert!(matches!(err, EconomyError::CustomerNotFound(Party::Sender)));

        let err = fx
            .engine
            .pay(&ibans[0], &ghost, 10)
            .expect_err("must fail");
        assert!(matches!(
            err,
            EconomyError::CustomerNotFound(Party::Receiver)
        ));
    }

    #[test]
    fn pay_enforces_the_sender_overdraft_ceiling() {
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[50, 0]);

        let err = fx
            .engine
            .pay(&ibans[0], &ibans[1], 151)
            .expect_err("must fail");
        assert!(matches!(
            err,
            EconomyError::InsufficientFunds { max_debt: 100 }
        ));
        // No partial debit.
        assert_eq!(fx.balance(&ibans[0]), 50);
        assert_eq!(fx.balance(&ibans[1]), 0);
    }

    #[test]
    fn pay_into_overdraft_within_the_ceiling_succeeds() {
        // maxDebt=100, A=50, C=0: pay 120 leaves A at -70, which is
        // above -100, so the transfer goes through.
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[50, 0]);

        fx.engine.pay(&ibans[0], &ibans[1], 120).expect("pay");
        assert_eq!(fx.balance(&ibans[0]), -70);
        assert_eq!(fx.balance(&ibans[1]), 120);
    }

    #[test]
    fn pay_conserves_the_total() {
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[300, 40]);

        fx.engine.pay(&ibans[0], &ibans[1], 125).expect("pay");
        assert_eq!(fx.balance(&ibans[0]), 175);
        assert_eq!(fx.balance(&ibans[1]), 165);
        assert_eq!(fx.balance(&ibans[0]) + fx.balance(&ibans[1]), 340);
    }

    #[test]
    fn pay_across_banks_uses_only_the_sender_ceiling() {
        let fx = Fixture::new();
        let sender = fx.bank(100, &[0]);
        let receiver = fx.bank(0, &[0]);

        // Sender may go to -100 even though the receiver's bank allows
        // no overdraft at all.
        fx.engine.pay(&sender[0], &receiver[0], 100).expect("pay");
        assert_eq!(fx.balance(&sender[0]), -100);
        assert_eq!(fx.balance(&receiver[0]), 100);
    }

    #[test]
    fn deposit_credits_unconditionally() {
        let fx = Fixture::new();
        let ibans = fx.bank(0, &[5]);

        fx.engine.deposit(&ibans[0], i64::MAX / 2).expect("deposit");
        assert_eq!(fx.balance(&ibans[0]), 5 + i64::MAX / 2);

        let err = fx.engine.deposit(&ibans[0], 0).expect_err("must fail");
        assert!(matches!(err, EconomyError::InvalidAmount(0)));
    }

    #[test]
    fn withdraw_respects_the_ceiling() {
        let fx = Fixture::new();
        let ibans = fx.bank(25, &[10]);

        fx.engine.withdraw(&ibans[0], 35).expect("withdraw");
        assert_eq!(fx.balance(&ibans[0]), -25);

        let err = fx.engine.withdraw(&ibans[0], 1).expect_err("must fail");
        assert!(matches!(
            err,
            EconomyError::InsufficientFunds { max_debt: 25 }
        ));
        assert_eq!(fx.balance(&ibans[0]), -25);
    }

    #[test]
    fn pay_rejects_accounts_whose_bank_record_is_missing() {
        let fx = Fixture::new();
        let good = fx.bank(100, &[50]);

        // An account registered in the index whose bank root record
        // never reached disk: the bank resolves neither from cache nor
        // from storage, tagged by the failing party.
        let mut orphan_bank = Bank::new("Orphan", 100);
        let customer = fx.banks.create_customer(&mut orphan_bank, PlayerId::new());
        let orphan = customer.lock().iban.clone();

        let err = fx.engine.pay(&orphan, &good[0], 10).expect_err("must fail");
        assert!(matches!(err, EconomyError::BankNotFound(Party::Sender)));

        let err = fx.engine.pay(&good[0], &orphan, 10).expect_err("must fail");
        assert!(matches!(err, EconomyError::BankNotFound(Party::Receiver)));
        assert_eq!(fx.balance(&good[0]), 50);
    }

    #[test]
    fn pay_reports_partial_durability_when_receiver_save_fails() {
        let fx = Fixture::new();
        let ibans = fx.bank(100, &[50, 0]);

        // Block the receiver's record path: a directory where the
        // record file belongs makes the second persist fail after the
        // sender's already reached disk.
        let (key, _) = fx.banks.customer_by_iban(&ibans[1]).expect("resident");
        let blocked = fx
            ._dir
            .path()
            .join("banks")
            .join(key.bank.to_string())
            .join("customers")
            .join(format!("{}.bin", key.player));
        std::fs::remove_file(&blocked).expect("remove record");
        std::fs::create_dir(&blocked).expect("block record path");

        let err = fx
            .engine
            .pay(&ibans[0], &ibans[1], 10)
            .expect_err("must fail");
        match err {
            EconomyError::PartialPersist { persisted, failed, .. } => {
                assert_eq!(persisted, ibans[0]);
                assert_eq!(failed, ibans[1]);
            }
            other => panic!("expected partial persist, got {other}"),
        }
        // In-memory state is mutated and consistent; only durability
        // is partial.
        assert_eq!(fx.balance(&ibans[0]), 40);
        assert_eq!(fx.balance(&ibans[1]), 10);
    }

    #[test]
    fn extreme_balances_do_not_wrap_around() {
        let fx = Fixture::new();
        let ibans = fx.bank(i64::MAX, &[i64::MIN + 5, i64::MAX - 5]);

        // A debit whose result is unrepresentable is an overdraft
        // breach, not a wrap-around into riches.
        let err = fx.engine.withdraw(&ibans[0], 10).expect_err("must fail");
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));
        assert_eq!(fx.balance(&ibans[0]), i64::MIN + 5);

        let err = fx
            .engine
            .pay(&ibans[0], &ibans[1], 10)
            .expect_err("must fail");
        assert!(matches!(err, EconomyError::InsufficientFunds { .. }));

        // Credits saturate at the ceiling of the representation.
        fx.engine.deposit(&ibans[1], 10).expect("deposit");
        assert_eq!(fx.balance(&ibans[1]), i64::MAX);
    }

    #[test]
    fn opposing_transfers_do_not_deadlock_and_conserve_totals() {
        let fx = Fixture::new();
        let ibans = fx.bank(10_000, &[1_000, 1_000]);
        let a = ibans[0].clone();
        let b = ibans[1].clone();

        let engine_ab = EconomyEngine::new(Arc::clone(&fx.banks));
        let engine_ba = EconomyEngine::new(Arc::clone(&fx.banks));
        let (a2, b2) = (a.clone(), b.clone());

        let forward = std::thread::spawn(move || {
            for _ in 0..200 {
                let _ = engine_ab.pay(&a, &b, 3);
            }
        });
        let backward = std::thread::spawn(move || {
            for _ in 0..200 {
                let _ = engine_ba.pay(&b2, &a2, 5);
            }
        });
        forward.join().expect("forward thread");
        backward.join().expect("backward thread");

        assert_eq!(fx.balance(&ibans[0]) + fx.balance(&ibans[1]), 2_000);
    }

    fn assert_shareable(_: &(impl Send + Sync)) {}

    #[test]
    fn engine_is_shareable_across_threads() {
        let fx = Fixture::new();
        assert_shareable(&fx.engine);
    }
}
