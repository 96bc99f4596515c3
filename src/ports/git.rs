//! Version-control backend port (trait).
//! Defines the operations the store issues without coupling to any implementation.

use crate::domain::{
    BranchRecord, CommitRecord, Credentials, GitVersionInfo, RepositoryRecord, RepositoryStatus,
};
use anyhow::Result;
use async_trait::async_trait;

/// Port for version-control operations on a repository location.
/// Implementations may use git2, shell commands, or test fakes.
/// Errors are opaque messages; the store never inspects them.
#[async_trait]
pub trait VcsBackend: Send + Sync {
    /// Summary record for the repository at `location`.
    async fn repository_info(&self, location: &str) -> Result<RepositoryRecord>;

    /// Working-tree status.
    async fn repository_status(&self, location: &str) -> Result<RepositoryStatus>;

    /// Up to `limit` commits reachable from HEAD, newest first.
    async fn commit_log(&self, location: &str, limit: usize) -> Result<Vec<CommitRecord>>;

    /// Local branches followed by remote-tracking branches.
    async fn branches(&self, location: &str) -> Result<Vec<BranchRecord>>;

    async fn stage_file(&self, location: &str, file_path: &str) -> Result<()>;

    async fn unstage_file(&self, location: &str, file_path: &str) -> Result<()>;

    /// Commit the index, returning the new commit id.
    async fn commit(&self, location: &str, message: &str) -> Result<String>;

    async fn pull(&self, location: &str) -> Result<String>;

    async fn push(&self, location: &str) -> Result<String> {
        self.push_with_credentials(location, &Credentials::default())
            .await
    }

    async fn push_with_credentials(
        &self,
        location: &str,
        credentials: &Credentials,
    ) -> Result<String>;

    async fn checkout_branch(&self, location: &str, branch_name: &str) -> Result<()>;

    async fn clone_repository(&self, url: &str, location: &str) -> Result<String>;

    async fn init_repository(&self, location: &str) -> Result<String>;

    async fn add_remote(&self, location: &str, name: &str, url: &str) -> Result<()>;

    /// Version and location of the installed `git` executable.
    async fn git_version(&self) -> Result<GitVersionInfo>;
}
