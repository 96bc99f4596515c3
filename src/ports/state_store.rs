//! State store port (trait).
//! Defines the interface for persisting application state as named string slots.

use anyhow::Result;

/// Port for persisting application state.
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Overwrite the value stored under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}
