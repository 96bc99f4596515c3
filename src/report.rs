//! Plain-text rendering of snapshot pieces for the terminal.

use repodesk::domain::{
    BranchRecord, CommitRecord, FileEntry, GitVersionInfo, RepositoryRecord, RepositoryStatus,
};

pub fn repository_line(repo: &RepositoryRecord) -> String {
    let mut flags = String::new();
    if repo.has_changes {
        flags.push('*');
    }
    if repo.ahead > 0 {
        flags.push_str(&format!(" ↑{}", repo.ahead));
    }
    if repo.behind > 0 {
        flags.push_str(&format!(" ↓{}", repo.behind));
    }
    if !repo.has_remote {
        flags.push_str(" (local)");
    }

    format!(
        "{:<24} {:<20} {:<10} {}",
        repo.name,
        repo.current_branch,
        flags.trim(),
        repo.path
    )
}

pub fn repositories(repos: &[RepositoryRecord]) -> String {
    if repos.is_empty() {
        return "No repositories tracked. Add one with `repodesk add <path>`.".to_string();
    }
    repos
        .iter()
        .map(repository_line)
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn status(status: &RepositoryStatus) -> String {
    let mut out = format!("On branch {}", status.current_branch);
    if status.ahead > 0 || status.behind > 0 {
        out.push_str(&format!(
            " (ahead {}, behind {})",
            status.ahead, status.behind
        ));
    }
    out.push('\n');

    if status.files.is_empty() {
        out.push_str("Working tree clean\n");
        return out;
    }

    section(&mut out, "Staged", status.staged());
    section(&mut out, "Unstaged", status.unstaged());
    out
}

fn section<'a>(out: &mut String, title: &str, files: impl Iterator<Item = &'a FileEntry>) {
    let mut files = files.peekable();
    if files.peek().is_none() {
        return;
    }
    out.push_str(&format!("{}:\n", title));
    for file in files {
        out.push_str(&format!("  {:<10} {}\n", file.status.as_str(), file.path));
    }
}

pub fn git_version(info: &GitVersionInfo) -> String {
    format!("{} ({})", info.version, info.path)
}

pub fn commits(commits: &[CommitRecord]) -> String {
    commits
        .iter()
        .map(|c| {
            format!(
                "{} {:<16} {:<16} {}",
                c.short_id,
                c.relative_time(),
                c.author,
                c.summary()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn branches(branches: &[BranchRecord]) -> String {
    branches
        .iter()
        .map(|b| {
            let marker = if b.is_current { '*' } else { ' ' };
            if b.is_remote {
                format!("{} [{}]", marker, b.name)
            } else {
                format!("{} {}", marker, b.name)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use repodesk::domain::FileStatusCode;

    fn make_repo() -> RepositoryRecord {
        RepositoryRecord {
            path: "/work/app".to_string(),
            name: "app".to_string(),
            current_branch: "main".to_string(),
            has_changes: true,
            ahead: 2,
            behind: 0,
            has_remote: true,
        }
    }

    #[test]
    fn repository_line_shows_flags() {
        let line = repository_line(&make_repo());
        assert!(line.starts_with("app"));
        assert!(line.contains("* ↑2"));
        assert!(line.ends_with("/work/app"));
    }

    #[test]
    fn empty_repository_list_has_hint() {
        assert!(repositories(&[]).contains("repodesk add"));
    }

    #[test]
    fn status_groups_staged_and_unstaged() {
        let repo_status = RepositoryStatus {
            current_branch: "main".to_string(),
            files: vec![
                FileEntry {
                    path: "a.rs".to_string(),
                    status: FileStatusCode::New,
                    staged: true,
                },
                FileEntry {
                    path: "b.rs".to_string(),
                    status: FileStatusCode::Untracked,
                    staged: false,
                },
            ],
            ahead: 0,
            behind: 0,
            has_changes: true,
            has_remote: false,
        };

        let text = status(&repo_status);
        let staged = text.find("Staged:").unwrap();
        let unstaged = text.find("Unstaged:").unwrap();
        assert!(staged < unstaged);
        assert!(text.contains("new        a.rs"));
        assert!(text.contains("untracked  b.rs"));
    }

    #[test]
    fn branches_mark_current_and_remote() {
        let text = branches(&[
            BranchRecord {
                name: "main".to_string(),
                is_current: true,
                is_remote: false,
            },
            BranchRecord {
                name: "origin/main".to_string(),
                is_current: false,
                is_remote: true,
            },
        ]);
        assert_eq!(text, "* main\n  [origin/main]");
    }

    #[test]
    fn git_version_shows_path() {
        let info = GitVersionInfo {
            version: "git version 2.43.0".to_string(),
            path: "/usr/bin/git".to_string(),
        };
        assert_eq!(git_version(&info), "git version 2.43.0 (/usr/bin/git)");
    }
}
