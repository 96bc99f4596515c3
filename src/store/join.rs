//! Best-effort join for independent sub-fetches.
//!
//! Each fetch settles on its own: a failure is logged and replaced by the
//! field's failure value, and never cancels or rolls back its siblings.

use crate::domain::RepositoryDetails;
use crate::ports::VcsBackend;
use std::future::Future;
use tracing::warn;

/// Value a field takes when the fetch that fills it fails.
pub trait FailureDefault {
    fn on_failure() -> Self;
}

impl<T> FailureDefault for Option<T> {
    fn on_failure() -> Self {
        None
    }
}

impl<T> FailureDefault for Vec<T> {
    fn on_failure() -> Self {
        Vec::new()
    }
}

/// Await `fetch`, falling back to the failure value on error.
pub async fn settle<T, F>(what: &'static str, location: &str, fetch: F) -> T
where
    F: Future<Output = anyhow::Result<T>>,
    T: FailureDefault,
{
    match fetch.await {
        Ok(value) => value,
        Err(e) => {
            let error = format!("{:#}", e);
            warn!(location, what, %error, "sub-fetch failed, using empty value");
            T::on_failure()
        }
    }
}

/// Status, commit page and branches for `location`, fetched concurrently.
pub async fn fetch_details(
    backend: &dyn VcsBackend,
    location: &str,
    page_size: usize,
) -> RepositoryDetails {
    let (status, commits, branches) = tokio::join!(
        settle("status", location, async {
            backend.repository_status(location).await.map(Some)
        }),
        settle("commits", location, backend.commit_log(location, page_size)),
        settle("branches", location, backend.branches(location)),
    );

    RepositoryDetails {
        status,
        commits,
        branches,
    }
}
