//! Property tests for IBAN derivation and record round-tripping.

use coffer_core::bank::BankCustomer;
use coffer_core::character::Character;
use coffer_core::types::{BankId, Iban, PlayerId};
use proptest::prelude::*;
use uuid::Uuid;

fn bank_id() -> impl Strategy<Value = BankId> {
    any::<u128>().prop_map(|bits| BankId(Uuid::from_u128(bits)))
}

fn player_id() -> impl Strategy<Value = PlayerId> {
    any::<u128>().prop_map(|bits| PlayerId(Uuid::from_u128(bits)))
}

proptest! {
    /// Deriving twice from the same pair always yields the same IBAN.
    #[test]
    fn iban_derivation_is_deterministic(bank in bank_id(), player in player_id()) {
        prop_assert_eq!(Iban::derive(bank, player), Iban::derive(bank, player));
    }

    /// Every IBAN is `MC` followed by exactly sixteen ASCII digits.
    #[test]
    fn iban_shape_is_fixed(bank in bank_id(), player in player_id()) {
        let iban = Iban::derive(bank, player);
        let text = iban.as_str();
        prop_assert_eq!(text.len(), 18);
        prop_assert!(text.starts_with("MC"));
        prop_assert!(text[2..].bytes().all(|b| b.is_ascii_digit()));
    }

    /// A new account's derived IBAN matches a standalone derivation.
    #[test]
    fn customer_carries_the_derived_iban(bank in bank_id(), player in player_id()) {
        let customer = BankCustomer::new(bank, player);
        prop_assert_eq!(customer.iban, Iban::derive(bank, player));
    }

    /// Characters survive an encode/decode cycle byte-exactly.
    #[test]
    fn character_record_round_trips(
        owner in player_id(),
        slot in 0u8..8,
        health in 0.0f32..40.0,
        deaths in any::<u32>(),
    ) {
        let mut character = Character::new(owner, slot);
        character.health = health;
        character.deaths = deaths;

        let bytes = bincode::serialize(&character).expect("encode");
        let decoded: Character = bincode::deserialize(&bytes).expect("decode");
        prop_assert_eq!(decoded, character);
    }
}
