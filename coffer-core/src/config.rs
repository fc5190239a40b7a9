//! Configuration for the coffer store, loadable from TOML.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CofferConfig {
    /// Cache capacities.
    #[serde(default)]
    pub cache: CacheConfig,
    /// Character store limits.
    #[serde(default)]
    pub characters: CharacterLimits,
    /// Background flush sweep settings.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl CofferConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `StoreError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::StoreResult<Self> {
        toml::from_str(toml_str).map_err(|e| crate::error::StoreError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::StoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Bounded-cache capacities. Evicted entities are written back to disk
/// before they leave the cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of banks resident in memory at once.
    #[serde(default = "default_resident_banks")]
    pub resident_banks: usize,
    /// Maximum number of characters resident in memory at once.
    /// Sized to the server's player capacity.
    #[serde(default = "default_resident_characters")]
    pub resident_characters: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            resident_banks: 16,
            resident_characters: 128,
        }
    }
}

/// Limits applied by the character store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterLimits {
    /// Maximum character slots per owning player.
    #[serde(default = "default_max_per_owner")]
    pub max_per_owner: u8,
}

impl Default for CharacterLimits {
    fn default() -> Self {
        Self { max_per_owner: 3 }
    }
}

/// Background flush sweep over cached banks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Whether the sweep thread runs at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Seconds between sweep passes.
    #[serde(default = "default_sweep_interval")]
    pub interval_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

fn default_resident_banks() -> usize {
    16
}

fn default_resident_characters() -> usize {
    128
}

fn default_max_per_owner() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

fn default_sweep_interval() -> u64 {
    300
}
