pub mod git2_adapter;
pub mod memory_state_store;
pub mod sqlite_state_store;

pub use git2_adapter::Git2Backend;
pub use memory_state_store::MemoryStateStore;
pub use sqlite_state_store::SqliteStateStore;
