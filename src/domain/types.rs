//! Pure data types for the repository domain.
//! No I/O; serde only so snapshots can be printed as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Backend-reported facts about one tracked repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// Unique key: the location the repository was added under.
    pub path: String,
    pub name: String,
    pub current_branch: String,
    pub has_changes: bool,
    pub ahead: usize,
    pub behind: usize,
    pub has_remote: bool,
}

/// Status code of a changed file, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatusCode {
    New,
    Modified,
    Deleted,
    Renamed,
    Untracked,
    Unknown,
}

impl FileStatusCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FileStatusCode::New => "new",
            FileStatusCode::Modified => "modified",
            FileStatusCode::Deleted => "deleted",
            FileStatusCode::Renamed => "renamed",
            FileStatusCode::Untracked => "untracked",
            FileStatusCode::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FileStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One changed file in the working tree or index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub status: FileStatusCode,
    pub staged: bool,
}

/// Working-tree status of a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStatus {
    pub current_branch: String,
    pub files: Vec<FileEntry>,
    pub ahead: usize,
    pub behind: usize,
    pub has_changes: bool,
    pub has_remote: bool,
}

impl RepositoryStatus {
    pub fn staged(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| f.staged)
    }

    pub fn unstaged(&self) -> impl Iterator<Item = &FileEntry> {
        self.files.iter().filter(|f| !f.staged)
    }
}

/// A git commit with metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    pub short_id: String,
    pub message: String,
    pub author: String,
    pub timestamp: i64, // Unix seconds
}

impl CommitRecord {
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    pub fn relative_time(&self) -> String {
        relative_time_since(chrono::Utc::now().timestamp(), self.timestamp)
    }
}

fn relative_time_since(now: i64, then: i64) -> String {
    let diff = now - then;

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        let mins = diff / 60;
        format!("{} minute{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if diff < 86400 {
        let hours = diff / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if diff < 604800 {
        let days = diff / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else if diff < 2592000 {
        let weeks = diff / 604800;
        format!("{} week{} ago", weeks, if weeks == 1 { "" } else { "s" })
    } else {
        let months = diff / 2592000;
        format!("{} month{} ago", months, if months == 1 { "" } else { "s" })
    }
}

/// A local or remote-tracking branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
    pub is_current: bool,
    pub is_remote: bool,
}

/// The `git` executable found on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitVersionInfo {
    /// First line of `git --version`, e.g. `git version 2.43.0`.
    pub version: String,
    /// Resolved executable path, `Unknown` when it is not on `PATH`.
    pub path: String,
}

/// Credentials for pushing over HTTPS.
#[derive(Clone, Default)]
pub struct Credentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}
