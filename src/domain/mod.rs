pub mod snapshot;
pub mod types;

pub use snapshot::{RepositoryDetails, RepositorySnapshot};
pub use types::{
    BranchRecord, CommitRecord, Credentials, FileEntry, FileStatusCode, GitVersionInfo,
    RepositoryRecord, RepositoryStatus,
};
