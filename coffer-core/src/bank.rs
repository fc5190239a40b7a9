//! Bank aggregate: the root entity plus its customer memberships and
//! loans.
//!
//! Customers and loans are persisted as sibling records under the bank's
//! directory, so the root record carries only `id`, `name`, and
//! `max_debt` — the membership set and loan list are hydrated from disk
//! by the bank store and skipped by the codec. Live customer records
//! themselves reside in the store's arena, keyed by [`CustomerKey`]; a
//! bank only remembers which players belong to it, which keeps exactly
//! one mutable copy of every account in the process.

use crate::types::{BankId, Iban, LoanId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Aggregate root of the bank/economy subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bank {
    /// Stable identity of the bank.
    pub id: BankId,
    /// Display name.
    pub name: String,
    /// Overdraft ceiling: the most negative a customer balance at this
    /// bank may reach.
    pub max_debt: i64,
    /// Players holding an account here. Hydrated from the customers
    /// directory, not part of the root record.
    #[serde(skip)]
    pub customers: BTreeSet<PlayerId>,
    /// Loans issued by this bank. Hydrated from the loans directory,
    /// not part of the root record.
    #[serde(skip)]
    pub loans: Vec<BankLoan>,
}

impl Bank {
    /// Create a new bank with no customers or loans.
    #[must_use]
    pub fn new(name: impl Into<String>, max_debt: i64) -> Self {
        Self {
            id: BankId::new(),
            name: name.into(),
            max_debt,
            customers: BTreeSet::new(),
            loans: Vec::new(),
        }
    }

    /// Register a loan on the aggregate.
    pub fn add_loan(&mut self, loan: BankLoan) {
        self.loans.push(loan);
    }

    /// Remove a loan by ID.
    pub fn remove_loan(&mut self, id: LoanId) {
        self.loans.retain(|loan| loan.id != id);
    }

    /// Look up a loan by ID.
    #[must_use]
    pub fn loan(&self, id: LoanId) -> Option<&BankLoan> {
        self.loans.iter().find(|loan| loan.id == id)
    }

    /// First loan issued to the given customer, if any.
    #[must_use]
    pub fn loan_by_customer(&self, customer: PlayerId) -> Option<&BankLoan> {
        self.loans.iter().find(|loan| loan.customer == customer)
    }

    /// Templating variables for this bank.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("bank.uuid".to_string(), self.id.to_string()),
            ("bank.name".to_string(), self.name.clone()),
            (
                "bank.customers.size".to_string(),
                self.customers.len().to_string(),
            ),
            ("bank.loans.size".to_string(), self.loans.len().to_string()),
        ])
    }
}

/// A player's account at one bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankCustomer {
    /// The owning player.
    pub player: PlayerId,
    /// The bank this account belongs to.
    pub bank: BankId,
    /// Derived account identifier, stable for the customer's lifetime.
    pub iban: Iban,
    /// Current balance in minor currency units. May be negative down to
    /// the bank's `max_debt`; that bound is enforced at mutation time by
    /// the economy engine, not stored as a standing constraint.
    pub balance: i64,
    /// Loans taken out by this customer.
    pub loans: Vec<LoanId>,
}

impl BankCustomer {
    /// Create a fresh zero-balance account for `player` at `bank`.
    #[must_use]
    pub fn new(bank: BankId, player: PlayerId) -> Self {
        Self {
            player,
            bank,
            iban: Iban::derive(bank, player),
            balance: 0,
            loans: Vec::new(),
        }
    }
}

/// One loan issued by a bank to a customer.
///
/// `amount_paid <= principal` is deliberately not validated at this
/// layer; repayment bookkeeping belongs to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankLoan {
    /// Stable identity of the loan.
    pub id: LoanId,
    /// Issuing bank.
    pub bank: BankId,
    /// Borrowing customer.
    pub customer: PlayerId,
    /// Amount lent, in minor currency units.
    pub principal: i64,
    /// Amount repaid so far.
    pub amount_paid: i64,
    /// Interest rate as a fraction per period.
    pub interest_rate: f64,
    /// Term of the loan in days.
    pub duration_days: u32,
}
