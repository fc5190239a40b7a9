//! Core identifier and value types shared across the store and the
//! economy engine.
//!
//! All persisted types are serde-serializable; identifiers are thin
//! newtypes over [`Uuid`] so bank, player, and loan handles cannot be
//! mixed up at call sites.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Unique identifier for a bank aggregate.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct BankId(pub Uuid);

impl BankId {
    /// Create a new random bank ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for BankId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a player (account owner).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    /// Create a new random player ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a loan record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LoanId(pub Uuid);

impl LoanId {
    /// Create a new random loan ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for LoanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key identifying one customer record: a player's account at
/// one specific bank.
///
/// `Ord` compares `(bank, player)` lexicographically, which gives the
/// canonical total order used for two-account lock acquisition in the
/// economy engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CustomerKey {
    /// The bank holding the account.
    pub bank: BankId,
    /// The account owner.
    pub player: PlayerId,
}

// ---------------------------------------------------------------------------
// IBAN
// ---------------------------------------------------------------------------

/// Modulus that reduces each UUID's most-significant bits to an 8-digit
/// decimal field.
const IBAN_FIELD_MOD: i64 = 100_000_000;

/// Synthetic account identifier, the external lookup key for transfers.
///
/// Format: `MC` + 8-digit bank field + 8-digit player field. Both fields
/// are the most-significant 64 bits of the respective UUID reduced modulo
/// 10^8 (absolute value), so the derivation is deterministic but can in
/// theory collide across distinct `(bank, player)` pairs. That limitation
/// is inherited and not corrected here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Iban(pub String);

impl Iban {
    /// Derive the IBAN for `player`'s account at `bank`.
    ///
    /// Pure function of the two identifiers: deriving twice always yields
    /// the identical value, which is what lets `delete_customer` drop the
    /// same index entry `create_customer` registered.
    #[must_use]
    pub fn derive(bank: BankId, player: PlayerId) -> Self {
        let bank_field = (bank.0.as_u64_pair().0 as i64 % IBAN_FIELD_MOD).unsigned_abs();
        let player_field = (player.0.as_u64_pair().0 as i64 % IBAN_FIELD_MOD).unsigned_abs();
        Self(format!("MC{bank_field:08}{player_field:08}"))
    }

    /// The raw IBAN string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Iban {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// World values carried by character records
// ---------------------------------------------------------------------------

/// A position in the game world, including view direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorldPos {
    /// Name of the world/dimension this position belongs to.
    pub world: String,
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Horizontal view angle in degrees.
    pub yaw: f32,
    /// Vertical view angle in degrees.
    pub pitch: f32,
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:.1}, {:.1}, {:.1})", self.world, self.x, self.y, self.z)
    }
}

/// A stack of items occupying one inventory slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    /// Item type identifier (e.g. `minecraft:iron_sword`).
    pub item: String,
    /// Number of items in the stack.
    pub count: u32,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iban_is_deterministic() {
        let bank = BankId::new();
        let player = PlayerId::new();
        assert_eq!(Iban::derive(bank, player), Iban::derive(bank, player));
    }

    #[test]
    fn iban_format() {
        let iban = Iban::derive(BankId::new(), PlayerId::new());
        assert_eq!(iban.as_str().len(), 18);
        assert!(iban.as_str().starts_with("MC"));
        assert!(iban.as_str()[2..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn customer_key_orders_by_bank_then_player() {
        let low = BankId(Uuid::from_u128(1));
        let high = BankId(Uuid::from_u128(2));
        let player = PlayerId(Uuid::from_u128(7));
        let a = CustomerKey { bank: low, player };
        let b = CustomerKey { bank: high, player: PlayerId(Uuid::from_u128(0)) };
        assert!(a < b);
    }
}
