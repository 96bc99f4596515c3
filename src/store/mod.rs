//! Repository store.
//!
//! Owns the single [`RepositorySnapshot`], runs actions against the backend and
//! folds their outcomes back into the snapshot, then broadcasts the new
//! snapshot to every observer. Locks are never held across an `.await`.
//!
//! Every change bumps a version. Observers are called one delivery at a time
//! and never receive a snapshot older than one they have already seen.

pub mod join;

use crate::domain::{Credentials, GitVersionInfo, RepositoryDetails, RepositorySnapshot};
use crate::error::{Operation, Result, StoreError};
use crate::ports::{KeyValueStore, VcsBackend};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

/// Commits fetched per history page.
pub const DEFAULT_COMMIT_PAGE_SIZE: usize = 50;
/// Slot the tracked location list is persisted under.
pub const DEFAULT_PERSISTENCE_KEY: &str = "repositories";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub commit_page_size: usize,
    pub persistence_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            commit_page_size: DEFAULT_COMMIT_PAGE_SIZE,
            persistence_key: DEFAULT_PERSISTENCE_KEY.to_string(),
        }
    }
}

pub type Observer = Arc<dyn Fn(&RepositorySnapshot) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct StoreState {
    snapshot: RepositorySnapshot,
    version: u64,
    /// Loading actions currently running; `is_loading` mirrors `in_flight > 0`.
    in_flight: usize,
    next_generation: u64,
    /// Generation of the newest detail batch applied (or invalidated) per location.
    applied_generation: HashMap<String, u64>,
    /// Detail batches still being fetched, per location.
    batches: HashMap<String, usize>,
}

impl StoreState {
    fn take_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn begin_batch(&mut self, location: &str) -> u64 {
        *self.batches.entry(location.to_string()).or_default() += 1;
        self.take_generation()
    }

    fn end_batch(&mut self, location: &str) {
        if let Some(count) = self.batches.get_mut(location) {
            *count -= 1;
            if *count == 0 {
                self.batches.remove(location);
            }
        }
    }

    /// Forget cached details and generations of a location nobody can see
    /// anymore: untracked, unselected and with no batch in flight.
    fn prune(&mut self, location: &str) {
        if self.batches.contains_key(location)
            || self.snapshot.is_tracked(location)
            || self.snapshot.selected_repository.as_deref() == Some(location)
        {
            return;
        }
        self.applied_generation.remove(location);
        self.snapshot.details.remove(location);
    }
}

struct Subscriber {
    id: SubscriptionId,
    observer: Observer,
    /// Version of the last snapshot delivered to this observer.
    seen: u64,
}

pub struct RepositoryStore {
    backend: Arc<dyn VcsBackend>,
    persistence: Option<Arc<dyn KeyValueStore>>,
    config: StoreConfig,
    state: Mutex<StoreState>,
    observers: Mutex<Vec<Subscriber>>,
    /// Held while observers run, so deliveries never interleave.
    delivery: Mutex<()>,
    next_subscription: AtomicU64,
}

/// Keeps the loading flag raised for the duration of an action, including
/// when the action's future is dropped early.
struct Loading<'a> {
    store: &'a RepositoryStore,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.store
            .update(|state| state.in_flight = state.in_flight.saturating_sub(1));
    }
}

/// One in-flight detail fetch. Dropped unapplied (the action was cancelled),
/// it still releases its slot so the location can be pruned.
struct Batch<'a> {
    store: &'a RepositoryStore,
    location: String,
    generation: u64,
    applied: bool,
}

impl Drop for Batch<'_> {
    fn drop(&mut self) {
        if self.applied {
            return;
        }
        let mut state = self.store.lock_state();
        state.end_batch(&self.location);
        state.prune(&self.location);
    }
}

impl RepositoryStore {
    /// `persistence` is `None` when the environment has nowhere to persist;
    /// every persistence operation is then a no-op.
    pub fn new(
        backend: Arc<dyn VcsBackend>,
        persistence: Option<Arc<dyn KeyValueStore>>,
        config: StoreConfig,
    ) -> Self {
        Self {
            backend,
            persistence,
            config,
            state: Mutex::new(StoreState {
                snapshot: RepositorySnapshot::default(),
                version: 0,
                in_flight: 0,
                next_generation: 0,
                applied_generation: HashMap::new(),
                batches: HashMap::new(),
            }),
            observers: Mutex::new(Vec::new()),
            delivery: Mutex::new(()),
            next_subscription: AtomicU64::new(0),
        }
    }

    // ─── Observation ───

    pub fn snapshot(&self) -> RepositorySnapshot {
        self.lock_state().snapshot.clone()
    }

    /// Register `observer`. It is called right away with the current snapshot
    /// and again after every change until unsubscribed.
    ///
    /// Observers run while the store holds its delivery lock and must not
    /// call back into the store.
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&RepositorySnapshot) + Send + Sync + 'static,
    {
        let _delivery = self.lock_delivery();
        let (version, current) = {
            let state = self.lock_state();
            (state.version, state.snapshot.clone())
        };

        let id = SubscriptionId(self.next_subscription.fetch_add(1, Ordering::Relaxed));
        let observer: Observer = Arc::new(observer);
        self.lock_observers().push(Subscriber {
            id,
            observer: observer.clone(),
            seen: version,
        });

        observer(&current);
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.lock_observers();
        let before = observers.len();
        observers.retain(|subscriber| subscriber.id != id);
        observers.len() != before
    }

    /// Drop every observer. Actions keep working but notify nobody.
    pub fn dispose(&self) {
        self.lock_observers().clear();
    }

    // ─── Actions ───

    /// Start tracking `location`. Already-tracked locations are ignored
    /// without a backend call.
    pub async fn add_repository(&self, location: &str) -> Result<()> {
        let (_loading, tracked) = self.start_loading(|state| state.snapshot.is_tracked(location));
        if tracked {
            info!(location, "repository already tracked");
            return Ok(());
        }

        self.track(location).await
    }

    /// Stop tracking `location`. Never fails; unknown locations are a no-op.
    pub fn remove_repository(&self, location: &str) {
        let removed = self.update(|state| {
            let removed = state.snapshot.remove_location(location);
            if state.batches.contains_key(location) {
                // In-flight detail batches for this location must not resurrect it
                let generation = state.take_generation();
                state
                    .applied_generation
                    .insert(location.to_string(), generation);
            } else {
                state.prune(location);
            }
            removed
        });

        if removed {
            info!(location, "repository removed");
        }
        self.persist_locations();
    }

    /// Focus `location` and fetch its status, commit page and branches.
    /// Sub-fetch failures leave the matching field empty; this never fails.
    pub async fn select_repository(&self, location: &str) {
        debug!(location, "selecting repository");
        let (_loading, generation) = self.start_loading(|state| {
            let previous = state
                .snapshot
                .selected_repository
                .replace(location.to_string());
            let generation = state.begin_batch(location);
            if let Some(previous) = previous {
                state.prune(&previous);
            }
            generation
        });

        let batch = self.batch(location, generation);
        let details = self.fetch_details(location).await;
        self.apply_details(batch, details);
    }

    /// Re-fetch the record for `location` in place, plus its details when it
    /// is the selected repository. Failures are logged and otherwise ignored.
    pub async fn refresh_repository(&self, location: &str) {
        let record = match self.backend.repository_info(location).await {
            Ok(record) => record,
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(location, %error, "refresh failed");
                return;
            }
        };

        let generation = self.update(|state| {
            state.snapshot.replace_record(record);
            let selected = state.snapshot.selected_repository.as_deref() == Some(location);
            selected.then(|| state.begin_batch(location))
        });

        if let Some(generation) = generation {
            let batch = self.batch(location, generation);
            let details = self.fetch_details(location).await;
            self.apply_details(batch, details);
        }
    }

    pub async fn stage_file(&self, location: &str, file_path: &str) -> Result<()> {
        match self.backend.stage_file(location, file_path).await {
            Ok(()) => {
                self.refresh_repository(location).await;
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::StageFile, location, &e)),
        }
    }

    pub async fn unstage_file(&self, location: &str, file_path: &str) -> Result<()> {
        match self.backend.unstage_file(location, file_path).await {
            Ok(()) => {
                self.refresh_repository(location).await;
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::UnstageFile, location, &e)),
        }
    }

    /// Commit the index. Returns the new commit id, or `None` when the commit
    /// failed; the failure is only recorded in `last_error`.
    pub async fn commit(&self, location: &str, message: &str) -> Option<String> {
        match self.backend.commit(location, message).await {
            Ok(id) => {
                info!(location, commit = %id, "committed");
                self.refresh_repository(location).await;
                Some(id)
            }
            Err(e) => {
                self.fail(Operation::Commit, location, &e);
                None
            }
        }
    }

    pub async fn pull(&self, location: &str) -> Result<String> {
        let (_loading, ()) = self.start_loading(|_| ());
        match self.backend.pull(location).await {
            Ok(outcome) => {
                self.refresh_repository(location).await;
                Ok(outcome)
            }
            Err(e) => Err(self.fail(Operation::Pull, location, &e)),
        }
    }

    pub async fn push(&self, location: &str) -> Result<String> {
        let (_loading, ()) = self.start_loading(|_| ());
        let result = self.backend.push(location).await;
        self.finish_push(location, result).await
    }

    pub async fn push_with_credentials(
        &self,
        location: &str,
        credentials: &Credentials,
    ) -> Result<String> {
        let (_loading, ()) = self.start_loading(|_| ());
        let result = self
            .backend
            .push_with_credentials(location, credentials)
            .await;
        self.finish_push(location, result).await
    }

    /// Switch branches. Failures are recorded in `last_error`, not returned.
    pub async fn checkout_branch(&self, location: &str, branch_name: &str) {
        let (_loading, ()) = self.start_loading(|_| ());
        match self.backend.checkout_branch(location, branch_name).await {
            Ok(()) => {
                info!(location, branch = branch_name, "checked out");
                self.refresh_repository(location).await;
            }
            Err(e) => {
                self.fail(Operation::Checkout, location, &e);
            }
        }
    }

    /// Clone `url` into `location` and start tracking it.
    pub async fn clone_repository(&self, url: &str, location: &str) -> Result<String> {
        let (_loading, ()) = self.start_loading(|_| ());
        let outcome = self
            .backend
            .clone_repository(url, location)
            .await
            .map_err(|e| self.fail(Operation::Clone, location, &e))?;

        self.track(location).await?;
        Ok(outcome)
    }

    /// Create a new repository at `location` and start tracking it.
    pub async fn init_repository(&self, location: &str) -> Result<String> {
        let (_loading, ()) = self.start_loading(|_| ());
        let outcome = self
            .backend
            .init_repository(location)
            .await
            .map_err(|e| self.fail(Operation::Init, location, &e))?;

        self.track(location).await?;
        Ok(outcome)
    }

    pub async fn add_remote(&self, location: &str, name: &str, url: &str) -> Result<()> {
        match self.backend.add_remote(location, name, url).await {
            Ok(()) => {
                self.refresh_repository(location).await;
                Ok(())
            }
            Err(e) => Err(self.fail(Operation::AddRemote, location, &e)),
        }
    }

    /// Rebuild the repository list from the persisted locations, one at a
    /// time. Locations that fail to load are logged and skipped.
    pub async fn load_repositories(&self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };

        let locations = match persistence.get(&self.config.persistence_key) {
            Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(locations) => locations,
                Err(e) => {
                    warn!(error = %e, "persisted repository list is malformed, ignoring it");
                    Vec::new()
                }
            },
            Ok(None) => return,
            Err(e) => {
                let error = format!("{:#}", e);
                warn!(%error, "could not read persisted repository list");
                return;
            }
        };

        for location in locations {
            if self.lock_state().snapshot.is_tracked(&location) {
                continue;
            }
            match self.backend.repository_info(&location).await {
                Ok(record) => {
                    self.update(|state| state.snapshot.push_record(record));
                }
                Err(e) => {
                    let error = format!("{:#}", e);
                    error!(location = %location, %error, "failed to load repository");
                }
            }
        }

        self.persist_locations();
    }

    pub fn clear_error(&self) {
        self.update(|state| state.snapshot.last_error = None);
    }

    /// Version of the installed `git`. A diagnostic query: the snapshot is
    /// left untouched.
    pub async fn git_version(&self) -> Result<GitVersionInfo> {
        self.backend.git_version().await.map_err(|e| {
            let failure = StoreError::backend(Operation::GitVersion, &e);
            warn!(error = %failure, "could not query git version");
            failure
        })
    }

    // ─── Internals ───

    /// Fetch the record for an untracked `location` and append it.
    async fn track(&self, location: &str) -> Result<()> {
        let record = self
            .backend
            .repository_info(location)
            .await
            .map_err(|e| self.fail(Operation::RepositoryInfo, location, &e))?;

        if self.update(|state| state.snapshot.push_record(record)) {
            info!(location, "repository added");
            self.persist_locations();
        }
        Ok(())
    }

    async fn finish_push(
        &self,
        location: &str,
        result: anyhow::Result<String>,
    ) -> Result<String> {
        match result {
            Ok(outcome) => {
                self.refresh_repository(location).await;
                Ok(outcome)
            }
            Err(e) => Err(self.fail(Operation::Push, location, &e)),
        }
    }

    async fn fetch_details(&self, location: &str) -> RepositoryDetails {
        join::fetch_details(self.backend.as_ref(), location, self.config.commit_page_size).await
    }

    fn batch(&self, location: &str, generation: u64) -> Batch<'_> {
        Batch {
            store: self,
            location: location.to_string(),
            generation,
            applied: false,
        }
    }

    /// Store a detail batch unless a newer batch for the same location has
    /// already landed.
    fn apply_details(&self, mut batch: Batch<'_>, details: RepositoryDetails) {
        batch.applied = true;
        let (location, generation) = (batch.location.as_str(), batch.generation);

        let applied = self.update(|state| {
            state.end_batch(location);
            let latest = state.applied_generation.get(location).copied().unwrap_or(0);
            let newer = generation > latest;
            if newer {
                state
                    .applied_generation
                    .insert(location.to_string(), generation);
                state.snapshot.details.insert(location.to_string(), details);
            }
            state.prune(location);
            newer
        });

        if !applied {
            debug!(location, generation, "discarding superseded detail batch");
        }
    }

    /// Record an action-level failure in `last_error` and build the error
    /// handed back to callers that propagate it.
    fn fail(&self, operation: Operation, location: &str, err: &anyhow::Error) -> StoreError {
        let failure = StoreError::backend(operation, err);
        error!(location, operation = %operation, error = %failure, "action failed");
        let message = failure.message().to_string();
        self.update(|state| state.snapshot.last_error = Some(message));
        failure
    }

    fn persist_locations(&self) {
        let Some(persistence) = self.persistence.as_ref() else {
            return;
        };

        let locations = self.lock_state().snapshot.locations();
        let result = serde_json::to_string(&locations)
            .map_err(anyhow::Error::from)
            .and_then(|raw| persistence.set(&self.config.persistence_key, &raw));

        if let Err(e) = result {
            let error = format!("{:#}", e);
            warn!(%error, "could not persist repository list");
        }
    }

    /// Raise the loading flag, clear `last_error` and run `prepare`, all in
    /// one observable update.
    fn start_loading<R>(&self, prepare: impl FnOnce(&mut StoreState) -> R) -> (Loading<'_>, R) {
        let result = self.update(|state| {
            state.in_flight += 1;
            state.snapshot.last_error = None;
            prepare(state)
        });
        (Loading { store: self }, result)
    }

    /// Apply `change` to the state and notify observers of the result.
    fn update<R>(&self, change: impl FnOnce(&mut StoreState) -> R) -> R {
        let notify = !self.lock_observers().is_empty();
        let (result, pending) = {
            let mut state = self.lock_state();
            let result = change(&mut state);
            state.snapshot.is_loading = state.in_flight > 0;
            state.version += 1;
            (result, notify.then(|| (state.version, state.snapshot.clone())))
        };

        if let Some((version, snapshot)) = pending {
            self.notify(version, &snapshot);
        }
        result
    }

    /// Deliver `snapshot` to every observer that has not already seen a newer
    /// one. A delivery that lost the race to a newer one is skipped.
    fn notify(&self, version: u64, snapshot: &RepositorySnapshot) {
        let _delivery = self.lock_delivery();
        let due: Vec<Observer> = self
            .lock_observers()
            .iter_mut()
            .filter(|subscriber| subscriber.seen < version)
            .map(|subscriber| {
                subscriber.seen = version;
                subscriber.observer.clone()
            })
            .collect();

        for observer in due {
            observer(snapshot);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_observers(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_delivery(&self) -> MutexGuard<'_, ()> {
        self.delivery.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
