//! Errors surfaced by store actions to their callers.
//!
//! Only action-level failures become a [`StoreError`]; sub-fetch failures are
//! absorbed into the snapshot as empty values and never reach this type.

use std::fmt;
use thiserror::Error;

/// Backend operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    RepositoryInfo,
    StageFile,
    UnstageFile,
    Commit,
    Checkout,
    Pull,
    Push,
    Clone,
    Init,
    AddRemote,
    GitVersion,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Operation::RepositoryInfo => "repository info",
            Operation::StageFile => "stage file",
            Operation::UnstageFile => "unstage file",
            Operation::Commit => "commit",
            Operation::Checkout => "checkout",
            Operation::Pull => "pull",
            Operation::Push => "push",
            Operation::Clone => "clone",
            Operation::Init => "init",
            Operation::AddRemote => "add remote",
            Operation::GitVersion => "git version",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend rejected the call. `message` is what lands in `last_error`.
    #[error("{message}")]
    Backend {
        operation: Operation,
        message: String,
    },
}

impl StoreError {
    pub(crate) fn backend(operation: Operation, err: &anyhow::Error) -> Self {
        StoreError::Backend {
            operation,
            message: format!("{:#}", err),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StoreError::Backend { message, .. } => message,
        }
    }

    pub fn operation(&self) -> Operation {
        match self {
            StoreError::Backend { operation, .. } => *operation,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
