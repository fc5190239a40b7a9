//! Player-character records.

use crate::types::{ItemStack, PlayerId, WorldPos};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Maximum food level the game tracks.
pub const FOOD_LEVEL_MAX: u8 = 20;

/// One playable character owned by a player.
///
/// A player may own several characters (up to the configured per-owner
/// cap); `(owner, slot)` identifies one of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    /// Slot index within the owner's character list.
    pub slot: u8,
    /// The owning player.
    pub owner: PlayerId,
    /// Main inventory, one entry per slot.
    pub inventory: Vec<Option<ItemStack>>,
    /// Armor slots.
    pub armor: Vec<Option<ItemStack>>,
    /// Maximum health in half-hearts.
    pub max_health: f32,
    /// Current health in half-hearts.
    pub health: f32,
    /// Accumulated experience points.
    pub total_experience: u32,
    /// Current food level (0..=20).
    pub food_level: u8,
    /// Where the character first spawns.
    pub spawn: WorldPos,
    /// Where the character respawns after death.
    pub respawn: WorldPos,
    /// Players killed.
    pub player_kills: u32,
    /// Mobs killed.
    pub mob_kills: u32,
    /// Times died.
    pub deaths: u32,
}

impl Character {
    /// Create a fresh character in the given slot with default stats.
    #[must_use]
    pub fn new(owner: PlayerId, slot: u8) -> Self {
        Self {
            slot,
            owner,
            inventory: Vec::new(),
            armor: Vec::new(),
            max_health: 20.0,
            health: 20.0,
            total_experience: 0,
            food_level: FOOD_LEVEL_MAX,
            spawn: WorldPos::default(),
            respawn: WorldPos::default(),
            player_kills: 0,
            mob_kills: 0,
            deaths: 0,
        }
    }

    /// Convert displayed hearts to raw health (one heart = two health).
    #[must_use]
    pub fn hearts_to_health(hearts: f32) -> f32 {
        hearts * 2.0
    }

    /// Convert raw health to displayed hearts.
    #[must_use]
    pub fn health_to_hearts(health: f32) -> f32 {
        health / 2.0
    }

    /// Number of occupied inventory and armor slots.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.inventory.iter().flatten().count() + self.armor.iter().flatten().count()
    }

    /// Templating variables for this character.
    #[must_use]
    pub fn variables(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("character.owner".to_string(), self.owner.to_string()),
            ("character.id".to_string(), self.slot.to_string()),
            (
                "character.inventory_size".to_string(),
                (self.inventory.len() + self.armor.len()).to_string(),
            ),
            ("character.location_spawn".to_string(), self.spawn.to_string()),
            (
                "character.location_respawn".to_string(),
                self.respawn.to_string(),
            ),
            ("character.xp".to_string(), self.total_experience.to_string()),
            (
                "character.hearts_max".to_string(),
                Self::health_to_hearts(self.max_health).to_string(),
            ),
            (
                "character.hearts_current".to_string(),
                Self::health_to_hearts(self.health).to_string(),
            ),
            (
                "character.food_level_current".to_string(),
                self.food_level.to_string(),
            ),
            (
                "character.food_level_max".to_string(),
                FOOD_LEVEL_MAX.to_string(),
            ),
            (
                "character.kills_player".to_string(),
                self.player_kills.to_string(),
            ),
            ("character.kills_mob".to_string(), self.mob_kills.to_string()),
            ("character.deaths".to_string(), self.deaths.to_string()),
        ])
    }
}
