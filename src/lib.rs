//! repodesk - repository state store for a source-control front end.
//!
//! The [`store::RepositoryStore`] keeps an observable snapshot of tracked
//! repositories in sync with a version-control backend and persists the list
//! of tracked locations.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod logging;
pub mod ports;
pub mod store;

pub use error::{Operation, StoreError};
pub use store::{RepositoryStore, StoreConfig, SubscriptionId};
