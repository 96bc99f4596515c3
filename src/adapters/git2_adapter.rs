//! Git2 implementation of the VcsBackend port.
//! libgit2 is blocking, so every call runs on tokio's blocking pool.

use crate::domain::{
    BranchRecord, CommitRecord, Credentials, FileEntry, FileStatusCode, GitVersionInfo,
    RepositoryRecord, RepositoryStatus,
};
use crate::ports::VcsBackend;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, Cred, ErrorCode, PushOptions, RemoteCallbacks, Repository, Sort, Status,
    StatusOptions,
};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Branch name reported for a repository with no commits yet.
const UNBORN_BRANCH: &str = "main";

#[derive(Debug, Default, Clone, Copy)]
pub struct Git2Backend;

impl Git2Backend {
    pub fn new() -> Self {
        Self
    }
}

async fn blocking<T, F>(op: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .context("git worker task failed")?
}

fn open(location: &str) -> Result<Repository> {
    Repository::open(location)
        .with_context(|| format!("Failed to open git repository at {}", location))
}

/// Shorthand name of HEAD, or `None` while HEAD is unborn.
fn head_branch(repo: &Repository) -> Result<Option<String>> {
    match repo.head() {
        Ok(head) => Ok(Some(head.shorthand().unwrap_or("HEAD").to_string())),
        Err(e) if e.code() == ErrorCode::UnbornBranch => Ok(None),
        Err(e) => Err(e).context("Failed to get HEAD"),
    }
}

fn has_remote(repo: &Repository) -> bool {
    repo.remotes().map(|r| !r.is_empty()).unwrap_or(false)
}

fn ahead_behind(repo: &Repository, branch_name: &str) -> (usize, usize) {
    let Ok(local) = repo.find_branch(branch_name, BranchType::Local) else {
        return (0, 0);
    };
    let Ok(upstream) = local.upstream() else {
        return (0, 0);
    };
    let (Some(local_oid), Some(upstream_oid)) = (local.get().target(), upstream.get().target())
    else {
        return (0, 0);
    };

    repo.graph_ahead_behind(local_oid, upstream_oid)
        .unwrap_or((0, 0))
}

fn status_code(status: Status) -> FileStatusCode {
    match status {
        s if s.contains(Status::INDEX_NEW) => FileStatusCode::New,
        s if s.contains(Status::INDEX_MODIFIED) => FileStatusCode::Modified,
        s if s.contains(Status::INDEX_DELETED) => FileStatusCode::Deleted,
        s if s.contains(Status::INDEX_RENAMED) => FileStatusCode::Renamed,
        s if s.contains(Status::WT_MODIFIED) => FileStatusCode::Modified,
        s if s.contains(Status::WT_DELETED) => FileStatusCode::Deleted,
        s if s.contains(Status::WT_NEW) => FileStatusCode::Untracked,
        _ => FileStatusCode::Unknown,
    }
}

fn is_staged(status: Status) -> bool {
    status.intersects(
        Status::INDEX_NEW
            | Status::INDEX_MODIFIED
            | Status::INDEX_DELETED
            | Status::INDEX_RENAMED
            | Status::INDEX_TYPECHANGE,
    )
}

fn repository_info(location: &str) -> Result<RepositoryRecord> {
    let repo = open(location)?;
    let current_branch = head_branch(&repo)?.unwrap_or_else(|| UNBORN_BRANCH.to_string());

    let name = Path::new(location)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("Unknown")
        .to_string();

    let mut opts = StatusOptions::new();
    opts.include_untracked(true);
    let statuses = repo
        .statuses(Some(&mut opts))
        .context("Failed to read repository status")?;

    let (ahead, behind) = ahead_behind(&repo, &current_branch);

    Ok(RepositoryRecord {
        path: location.to_string(),
        name,
        current_branch,
        has_changes: !statuses.is_empty(),
        ahead,
        behind,
        has_remote: has_remote(&repo),
    })
}

fn repository_status(location: &str) -> Result<RepositoryStatus> {
    let repo = open(location)?;
    let current_branch = head_branch(&repo)?.unwrap_or_else(|| UNBORN_BRANCH.to_string());

    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .recurse_untracked_dirs(true);

    let statuses = repo
        .statuses(Some(&mut opts))
        .context("Failed to read repository status")?;

    let mut files = Vec::new();
    for entry in statuses.iter() {
        let path = entry.path().unwrap_or("").to_string();

        // Only files; deleted paths don't exist and are kept
        if Path::new(location).join(&path).is_dir() {
            continue;
        }

        let status = entry.status();
        files.push(FileEntry {
            path,
            status: status_code(status),
            staged: is_staged(status),
        });
    }

    let (ahead, behind) = ahead_behind(&repo, &current_branch);

    Ok(RepositoryStatus {
        current_branch,
        has_changes: !files.is_empty() || ahead > 0 || behind > 0,
        files,
        ahead,
        behind,
        has_remote: has_remote(&repo),
    })
}

fn commit_log(location: &str, limit: usize) -> Result<Vec<CommitRecord>> {
    let repo = open(location)?;
    // push_head on an unborn HEAD reports NotFound, not UnbornBranch
    if head_branch(&repo)?.is_none() {
        return Ok(Vec::new());
    }

    let mut revwalk = repo.revwalk()?;
    revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::TIME)?;
    revwalk.push_head().context("Failed to walk from HEAD")?;

    let mut commits = Vec::new();
    for oid in revwalk.take(limit) {
        let oid = oid?;
        let commit = repo.find_commit(oid)?;

        commits.push(CommitRecord {
            id: oid.to_string(),
            short_id: format!("{:.7}", oid),
            message: commit.message().unwrap_or("").to_string(),
            author: commit.author().name().unwrap_or("Unknown").to_string(),
            timestamp: commit.time().seconds(),
        });
    }

    Ok(commits)
}

fn branches(location: &str) -> Result<Vec<BranchRecord>> {
    let repo = open(location)?;

    let Some(current_branch) = head_branch(&repo)? else {
        return Ok(vec![BranchRecord {
            name: UNBORN_BRANCH.to_string(),
            is_current: true,
            is_remote: false,
        }]);
    };

    let mut branches = Vec::new();
    for (branch_type, is_remote) in [(BranchType::Local, false), (BranchType::Remote, true)] {
        for branch in repo.branches(Some(branch_type))? {
            let (branch, _) = branch?;
            if let Some(name) = branch.name()? {
                branches.push(BranchRecord {
                    name: name.to_string(),
                    is_current: !is_remote && name == current_branch,
                    is_remote,
                });
            }
        }
    }

    Ok(branches)
}

fn stage_file(location: &str, file_path: &str) -> Result<()> {
    let repo = open(location)?;
    let mut index = repo.index()?;
    index
        .add_path(Path::new(file_path))
        .with_context(|| format!("Failed to stage {}", file_path))?;
    index.write()?;
    Ok(())
}

fn unstage_file(location: &str, file_path: &str) -> Result<()> {
    let repo = open(location)?;

    match repo.head() {
        Ok(head) => {
            let head_commit = head.peel_to_commit()?;
            repo.reset_default(Some(head_commit.as_object()), [Path::new(file_path)])
                .with_context(|| format!("Failed to unstage {}", file_path))?;
        }
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            // Nothing to reset to yet
            let mut index = repo.index()?;
            index
                .remove_path(Path::new(file_path))
                .with_context(|| format!("Failed to unstage {}", file_path))?;
            index.write()?;
        }
        Err(e) => return Err(e).context("Failed to get HEAD"),
    }

    Ok(())
}

fn commit(location: &str, message: &str) -> Result<String> {
    let repo = open(location)?;
    let mut index = repo.index()?;
    let tree_id = index.write_tree()?;
    let tree = repo.find_tree(tree_id)?;
    let signature = repo
        .signature()
        .context("No commit identity configured (user.name / user.email)")?;

    let oid = match repo.head() {
        Ok(head) => {
            let parent = head.peel_to_commit()?;
            repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])?
        }
        Err(e) if e.code() == ErrorCode::UnbornBranch => {
            repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[])?
        }
        Err(e) => return Err(e).context("Failed to get HEAD"),
    };

    Ok(oid.to_string())
}

fn pull(location: &str) -> Result<String> {
    let repo = open(location)?;

    let mut remote = repo.find_remote("origin").context("No 'origin' remote")?;
    remote
        .fetch(&["HEAD"], None, None)
        .context("Failed to fetch from origin")?;

    let fetch_head = repo.find_reference("FETCH_HEAD")?;
    let fetch_commit = repo.reference_to_annotated_commit(&fetch_head)?;
    let (analysis, _) = repo.merge_analysis(&[&fetch_commit])?;

    if analysis.is_up_to_date() {
        return Ok("Already up to date".to_string());
    }
    if !analysis.is_fast_forward() {
        return Ok("Merge required (not performed)".to_string());
    }

    let branch = head_branch(&repo)?.unwrap_or_else(|| UNBORN_BRANCH.to_string());
    let refname = format!("refs/heads/{}", branch);
    let mut reference = repo.find_reference(&refname)?;
    reference.set_target(fetch_commit.id(), "Fast-Forward")?;
    repo.set_head(&refname)?;

    let mut checkout = CheckoutBuilder::new();
    checkout.force();
    repo.checkout_head(Some(&mut checkout))?;

    Ok("Fast-forward successful".to_string())
}

fn push(location: &str, credentials: &Credentials) -> Result<String> {
    let repo = open(location)?;
    let mut remote = repo.find_remote("origin").context("No 'origin' remote")?;

    let branch_name = head_branch(&repo)?.ok_or_else(|| anyhow!("Nothing to push yet"))?;
    let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch_name);

    let username = credentials.username.clone();
    let password = credentials.password.clone();
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |_url, username_from_url, _allowed_types| {
        match (&username, &password) {
            (Some(user), Some(pass)) => Cred::userpass_plaintext(user, pass),
            _ => Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")),
        }
    });

    let mut push_options = PushOptions::new();
    push_options.remote_callbacks(callbacks);

    if let Err(e) = remote.push(&[refspec.as_str()], Some(&mut push_options)) {
        let msg = e.to_string();
        if msg.contains("401") || msg.contains("403") || msg.contains("authentication") {
            return Err(anyhow!(
                "Authentication failed. Check that your username and access token are valid and allowed to push."
            ));
        }
        return Err(e).context("Failed to push to origin");
    }

    if let Ok(mut branch) = repo.find_branch(&branch_name, BranchType::Local) {
        let upstream = format!("origin/{}", branch_name);
        if let Err(e) = branch.set_upstream(Some(upstream.as_str())) {
            debug!(branch = %branch_name, error = %e, "could not set upstream");
        }
    }

    Ok("Push successful".to_string())
}

fn checkout_branch(location: &str, branch_name: &str) -> Result<()> {
    let repo = open(location)?;
    let refname = format!("refs/heads/{}", branch_name);
    let target = repo
        .revparse_single(&refname)
        .with_context(|| format!("No local branch named {}", branch_name))?;

    repo.checkout_tree(&target, None)?;
    repo.set_head(&refname)?;
    Ok(())
}

fn clone_repository(url: &str, location: &str) -> Result<String> {
    Repository::clone(url, location).with_context(|| format!("Failed to clone {}", url))?;
    Ok(format!("Successfully cloned repository to {}", location))
}

fn init_repository(location: &str) -> Result<String> {
    Repository::init(location)
        .with_context(|| format!("Failed to initialize repository at {}", location))?;
    Ok(format!("Successfully initialized repository at {}", location))
}

fn add_remote(location: &str, name: &str, url: &str) -> Result<()> {
    let repo = open(location)?;
    repo.remote(name, url)
        .with_context(|| format!("Failed to add remote {}", name))?;
    Ok(())
}

fn git_version() -> Result<GitVersionInfo> {
    let output = Command::new("git")
        .arg("--version")
        .output()
        .context("Failed to execute git")?;
    if !output.status.success() {
        bail!("git --version exited with {}", output.status);
    }

    let path = find_executable("git", std::env::var_os("PATH"))
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(GitVersionInfo {
        version: first_line(&String::from_utf8_lossy(&output.stdout)),
        path,
    })
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or("").trim().to_string()
}

/// First directory in `path_var` holding an executable called `name`.
fn find_executable(name: &str, path_var: Option<OsString>) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{}.exe", name)
    } else {
        name.to_string()
    };

    std::env::split_paths(&path_var?)
        .map(|dir| dir.join(&file_name))
        .find(|candidate| candidate.is_file())
}

#[async_trait]
impl VcsBackend for Git2Backend {
    async fn repository_info(&self, location: &str) -> Result<RepositoryRecord> {
        let location = location.to_string();
        blocking(move || repository_info(&location)).await
    }

    async fn repository_status(&self, location: &str) -> Result<RepositoryStatus> {
        let location = location.to_string();
        blocking(move || repository_status(&location)).await
    }

    async fn commit_log(&self, location: &str, limit: usize) -> Result<Vec<CommitRecord>> {
        let location = location.to_string();
        blocking(move || commit_log(&location, limit)).await
    }

    async fn branches(&self, location: &str) -> Result<Vec<BranchRecord>> {
        let location = location.to_string();
        blocking(move || branches(&location)).await
    }

    async fn stage_file(&self, location: &str, file_path: &str) -> Result<()> {
        let (location, file_path) = (location.to_string(), file_path.to_string());
        blocking(move || stage_file(&location, &file_path)).await
    }

    async fn unstage_file(&self, location: &str, file_path: &str) -> Result<()> {
        let (location, file_path) = (location.to_string(), file_path.to_string());
        blocking(move || unstage_file(&location, &file_path)).await
    }

    async fn commit(&self, location: &str, message: &str) -> Result<String> {
        let (location, message) = (location.to_string(), message.to_string());
        blocking(move || commit(&location, &message)).await
    }

    async fn pull(&self, location: &str) -> Result<String> {
        let location = location.to_string();
        blocking(move || pull(&location)).await
    }

    async fn push_with_credentials(
        &self,
        location: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        let location = location.to_string();
        let credentials = credentials.clone();
        blocking(move || push(&location, &credentials)).await
    }

    async fn checkout_branch(&self, location: &str, branch_name: &str) -> Result<()> {
        let (location, branch_name) = (location.to_string(), branch_name.to_string());
        blocking(move || checkout_branch(&location, &branch_name)).await
    }

    async fn clone_repository(&self, url: &str, location: &str) -> Result<String> {
        let (url, location) = (url.to_string(), location.to_string());
        blocking(move || clone_repository(&url, &location)).await
    }

    async fn init_repository(&self, location: &str) -> Result<String> {
        let location = location.to_string();
        blocking(move || init_repository(&location)).await
    }

    async fn add_remote(&self, location: &str, name: &str, url: &str) -> Result<()> {
        let (location, name, url) = (location.to_string(), name.to_string(), url.to_string());
        blocking(move || add_remote(&location, &name, &url)).await
    }

    async fn git_version(&self) -> Result<GitVersionInfo> {
        blocking(git_version).await
    }
}
