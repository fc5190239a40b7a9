//! Error types for the coffer store and economy engine.
//!
//! Absence of a record is never an error: store lookups return
//! `Ok(None)`. [`StoreError`] is reserved for real failures — I/O,
//! malformed records, configuration — so callers can tell "not found"
//! apart from "storage broke" instead of having both collapse into an
//! empty optional.

use crate::types::{Iban, PlayerId};
use std::fmt;
use thiserror::Error;

/// Failures raised by the persistence layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity could not be encoded into a record.
    #[error("failed to encode record: {0}")]
    Encode(String),

    /// A record exists but could not be decoded. Always fatal to the
    /// load that hit it; never converted to "not found".
    #[error("failed to decode record {path}: {message}")]
    Decode {
        /// Path of the offending record.
        path: String,
        /// Codec error detail.
        message: String,
    },

    /// Configuration could not be parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A player already has the maximum number of character slots.
    #[error("character slots exhausted for {owner} (limit: {limit})")]
    SlotLimit {
        /// The owner whose cap was hit.
        owner: PlayerId,
        /// Configured per-owner slot limit.
        limit: u8,
    },
}

/// Convenience result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Which party of a two-sided operation failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Party {
    /// The paying / withdrawing side.
    Sender,
    /// The receiving side.
    Receiver,
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sender => write!(f, "sender"),
            Self::Receiver => write!(f, "receiver"),
        }
    }
}

/// Failures raised by the economy engine.
#[derive(Error, Debug)]
pub enum EconomyError {
    /// Transfer, deposit, or withdrawal amount was not strictly positive.
    #[error("amount must be positive, got {0}")]
    InvalidAmount(i64),

    /// The mutation would push the balance below the bank's overdraft
    /// ceiling.
    #[error("insufficient funds: balance may not drop below -{max_debt}")]
    InsufficientFunds {
        /// The sender-side bank's overdraft ceiling.
        max_debt: i64,
    },

    /// No customer record is resident for the given IBAN.
    #[error("{0} customer not found")]
    CustomerNotFound(Party),

    /// The customer resolved, but its owning bank did not.
    #[error("{0} bank not found")]
    BankNotFound(Party),

    /// One side of a two-account mutation reached disk, the other did
    /// not. In-memory state is consistent; durability is partial.
    #[error("partial persist: {persisted} saved, {failed} not: {source}")]
    PartialPersist {
        /// Account whose record is durable.
        persisted: Iban,
        /// Account whose record failed to persist.
        failed: Iban,
        /// The underlying store failure.
        source: StoreError,
    },

    /// Persistence-layer failure on the main path.
    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Convenience result alias for economy operations.
pub type EconomyResult<T> = std::result::Result<T, EconomyError>;
