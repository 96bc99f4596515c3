//! repodesk - track local git repositories and act on them from one place.

mod report;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use repodesk::adapters::{Git2Backend, MemoryStateStore, SqliteStateStore};
use repodesk::config::Config;
use repodesk::domain::{Credentials, RepositorySnapshot};
use repodesk::ports::KeyValueStore;
use repodesk::{logging, RepositoryStore};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Parser, Debug)]
#[command(name = "repodesk")]
#[command(about = "Track local git repositories and act on them from one place")]
#[command(version)]
struct Args {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Keep the repository list in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tracked repositories
    List,
    /// Start tracking a repository
    Add { path: PathBuf },
    /// Stop tracking a repository
    Remove { path: PathBuf },
    /// Show status, recent commits and branches
    Show { path: PathBuf },
    /// Re-read a repository's summary
    Refresh { path: PathBuf },
    /// Stage a file
    Stage { path: PathBuf, file: String },
    /// Unstage a file
    Unstage { path: PathBuf, file: String },
    /// Commit staged changes
    Commit {
        path: PathBuf,
        #[arg(short, long)]
        message: String,
    },
    /// Fast-forward from origin
    Pull { path: PathBuf },
    /// Push the current branch to origin
    Push {
        path: PathBuf,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Switch to a local branch
    Checkout { path: PathBuf, branch: String },
    /// Clone a remote and track it
    Clone { url: String, path: PathBuf },
    /// Create a new repository and track it
    Init { path: PathBuf },
    /// Add a named remote
    Remote {
        path: PathBuf,
        name: String,
        url: String,
    },
    /// Show which git executable is installed
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load()?;
    logging::init(args.verbose, config.log_filter.as_deref())?;

    let persistence = open_persistence(&config, args.ephemeral);
    let store = RepositoryStore::new(
        Arc::new(Git2Backend::new()),
        persistence,
        config.store_config(),
    );
    store.load_repositories().await;

    run(&store, &args).await
}

fn open_persistence(config: &Config, ephemeral: bool) -> Option<Arc<dyn KeyValueStore>> {
    if ephemeral {
        return Some(Arc::new(MemoryStateStore::new()));
    }

    let opened = config
        .database_path()
        .and_then(|path| SqliteStateStore::open(&path));
    match opened {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            warn!(
                "Could not open state database: {:#}. Tracked repositories will not persist.",
                e
            );
            None
        }
    }
}

async fn run(store: &RepositoryStore, args: &Args) -> Result<()> {
    match &args.command {
        Command::List => {
            let snapshot = store.snapshot();
            emit(args.json, &snapshot.repositories, || {
                report::repositories(&snapshot.repositories)
            })?;
        }
        Command::Add { path } => {
            let location = location(path)?;
            store.add_repository(&location).await?;
            show_record(store, &location, args.json)?;
        }
        Command::Remove { path } => {
            let location = location(path)?;
            if !store.snapshot().is_tracked(&location) {
                bail!("{} is not tracked", location);
            }
            store.remove_repository(&location);
            println!("Removed {}", location);
        }
        Command::Show { path } => {
            let location = tracked(store, path)?;
            store.select_repository(&location).await;
            let snapshot = store.snapshot();
            if args.json {
                print_json(&snapshot)?;
            } else {
                println!("{}", details_text(&snapshot));
            }
        }
        Command::Refresh { path } => {
            let location = tracked(store, path)?;
            store.refresh_repository(&location).await;
            show_record(store, &location, args.json)?;
        }
        Command::Stage { path, file } => {
            let location = tracked(store, path)?;
            store.stage_file(&location, file).await?;
            println!("Staged {}", file);
        }
        Command::Unstage { path, file } => {
            let location = tracked(store, path)?;
            store.unstage_file(&location, file).await?;
            println!("Unstaged {}", file);
        }
        Command::Commit { path, message } => {
            let location = tracked(store, path)?;
            match store.commit(&location, message).await {
                Some(id) => println!("Committed {}", id),
                None => bail!(last_error(store)),
            }
        }
        Command::Pull { path } => {
            let location = tracked(store, path)?;
            println!("{}", store.pull(&location).await?);
        }
        Command::Push {
            path,
            username,
            password,
        } => {
            let location = tracked(store, path)?;
            let credentials = Credentials {
                username: username.clone(),
                password: password.clone(),
            };
            println!("{}", store.push_with_credentials(&location, &credentials).await?);
        }
        Command::Checkout { path, branch } => {
            let location = tracked(store, path)?;
            store.checkout_branch(&location, branch).await;
            if store.snapshot().last_error.is_some() {
                bail!(last_error(store));
            }
            println!("Switched to {}", branch);
        }
        Command::Clone { url, path } => {
            let location = location(path)?;
            store.clone_repository(url, &location).await?;
            show_record(store, &location, args.json)?;
        }
        Command::Init { path } => {
            let location = location(path)?;
            store.init_repository(&location).await?;
            show_record(store, &location, args.json)?;
        }
        Command::Remote { path, name, url } => {
            let location = tracked(store, path)?;
            store.add_remote(&location, name, url).await?;
            println!("Added remote {} -> {}", name, url);
        }
        Command::Doctor => {
            let info = store.git_version().await?;
            emit(args.json, &info, || report::git_version(&info))?;
        }
    }
    Ok(())
}

/// Absolute form of `path`, resolved against the working directory when it
/// does not exist yet (clone and init targets).
fn location(path: &Path) -> Result<String> {
    let absolute = match path.canonicalize() {
        Ok(p) => p,
        Err(_) if path.is_absolute() => path.to_path_buf(),
        Err(_) => std::env::current_dir()
            .context("Failed to read current directory")?
            .join(path),
    };
    debug!("resolved {} to {}", path.display(), absolute.display());
    Ok(absolute.to_string_lossy().into_owned())
}

fn tracked(store: &RepositoryStore, path: &Path) -> Result<String> {
    let location = location(path)?;
    if !store.snapshot().is_tracked(&location) {
        bail!(
            "{} is not tracked. Add it with `repodesk add {}`",
            location,
            path.display()
        );
    }
    Ok(location)
}

fn last_error(store: &RepositoryStore) -> String {
    store
        .snapshot()
        .last_error
        .unwrap_or_else(|| "Operation failed".to_string())
}

fn show_record(store: &RepositoryStore, location: &str, json: bool) -> Result<()> {
    let snapshot = store.snapshot();
    match snapshot.repository(location) {
        Some(record) => emit(json, record, || report::repository_line(record)),
        None => bail!("{} is not tracked", location),
    }
}

fn details_text(snapshot: &RepositorySnapshot) -> String {
    let mut sections = Vec::new();
    match snapshot.status() {
        Some(status) => sections.push(report::status(status)),
        None => sections.push("Status unavailable\n".to_string()),
    }
    if !snapshot.commits().is_empty() {
        sections.push(format!("Commits:\n{}\n", report::commits(snapshot.commits())));
    }
    if !snapshot.branches().is_empty() {
        sections.push(format!("Branches:\n{}", report::branches(snapshot.branches())));
    }
    sections.join("\n")
}

fn emit<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    if json {
        print_json(value)
    } else {
        println!("{}", text());
        Ok(())
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to encode JSON")?;
    println!("{}", text);
    Ok(())
}
