pub mod git;
pub mod state_store;

pub use git::VcsBackend;
pub use state_store::KeyValueStore;
