//! Record encoding.
//!
//! Every entity is persisted as one self-contained binary record. The
//! codec must round-trip exactly; a record that fails to decode is a
//! hard error that propagates to the caller, never a silent "not found".

use crate::error::{StoreError, StoreResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;

/// Encode/decode capability for one entity type.
pub trait RecordCodec<T> {
    /// Encode `value` into a self-contained record.
    ///
    /// # Errors
    /// Returns [`StoreError::Encode`] if the value cannot be serialised.
    fn encode(&self, value: &T) -> StoreResult<Vec<u8>>;

    /// Decode a record back into the entity.
    ///
    /// # Errors
    /// Returns [`StoreError::Decode`] on malformed input.
    fn decode(&self, bytes: &[u8]) -> StoreResult<T>;
}

/// Bincode-backed codec, the default for all entity types.
pub struct BinaryCodec<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> BinaryCodec<T> {
    /// Create a codec for `T`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for BinaryCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Serialize + DeserializeOwned> RecordCodec<T> for BinaryCodec<T> {
    fn encode(&self, value: &T) -> StoreResult<Vec<u8>> {
        bincode::serialize(value).map_err(|e| StoreError::Encode(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> StoreResult<T> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Decode {
            path: String::new(),
            message: e.to_string(),
        })
    }
}
