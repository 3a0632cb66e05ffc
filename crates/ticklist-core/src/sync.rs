use std::collections::BTreeSet;

use chrono::Utc;
use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::SyncError;
use crate::hooks::{Mutation, invalidated_views};
use crate::service::{ServiceError, TodoService};
use crate::todo::{Status, Todo, TodoId};
use crate::view::{TodoRow, ViewEntry, ViewKey, partition_holds};

#[derive(Debug)]
struct ViewCache {
    all: ViewEntry,
    pending: ViewEntry,
    completed: ViewEntry,
}

impl ViewCache {
    fn new() -> Self {
        Self {
            all: ViewEntry::new(ViewKey::All),
            pending: ViewEntry::new(ViewKey::Pending),
            completed: ViewEntry::new(ViewKey::Completed),
        }
    }

    fn get(&self, key: ViewKey) -> &ViewEntry {
        match key {
            ViewKey::All => &self.all,
            ViewKey::Pending => &self.pending,
            ViewKey::Completed => &self.completed,
        }
    }

    fn get_mut(&mut self, key: ViewKey) -> &mut ViewEntry {
        match key {
            ViewKey::All => &mut self.all,
            ViewKey::Pending => &mut self.pending,
            ViewKey::Completed => &mut self.completed,
        }
    }
}

/// Outcome of refetching the views invalidated by a successful mutation.
///
/// The mutation itself has been applied remotely whatever this reports;
/// `failures` lists the views still showing their previous contents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub refreshed: Vec<ViewKey>,
    pub failures: Vec<SyncError>,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Three filtered views of one remote todo collection.
///
/// Each view is cached independently and only changes when one of its own
/// fetches completes. Mutations never touch the cache directly: after the
/// remote acknowledges one, the views it invalidates are refetched.
///
/// Operations take `&self`; several may be in flight on one executor.
pub struct ViewSync<S> {
    service: S,
    cache: RwLock<ViewCache>,
}

impl<S> ViewSync<S>
where
    S: TodoService,
{
    pub fn new(service: S) -> Self {
        Self {
            service,
            cache: RwLock::new(ViewCache::new()),
        }
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Fetches the todos whose status is in `statuses` and stores them as
    /// that view's contents. On failure the view keeps its last data.
    #[instrument(skip(self))]
    pub async fn list_by_status(&self, statuses: &BTreeSet<Status>) -> Result<Vec<Todo>, SyncError> {
        let key = ViewKey::from_statuses(statuses).ok_or(SyncError::EmptyFilter)?;
        self.fetch(key).await
    }

    pub async fn refresh(&self, key: ViewKey) -> Result<(), SyncError> {
        self.fetch(key).await.map(|_| ())
    }

    /// Fetches all three views concurrently.
    #[instrument(skip(self))]
    pub async fn load_all(&self) -> Reconciliation {
        self.reconcile(&ViewKey::ALL).await
    }

    /// Sends the opposite of `todo.status` for `todo.id`.
    #[instrument(skip(self, todo), fields(id = todo.id, status = %todo.status))]
    pub async fn toggle_status(&self, todo: &Todo) -> Result<Reconciliation, SyncError> {
        let next = todo.status.toggled();
        self.service
            .update_status(todo.id, next)
            .await
            .map_err(|err| rejected(todo.id, err))?;
        info!(id = todo.id, from = %todo.status, to = %next, "status updated");

        Ok(self
            .after_success(Mutation::UpdateStatus {
                id: todo.id,
                status: next,
            })
            .await)
    }

    #[instrument(skip(self))]
    pub async fn delete_todo(&self, id: TodoId) -> Result<Reconciliation, SyncError> {
        self.service
            .delete(id)
            .await
            .map_err(|err| rejected(id, err))?;
        info!(id, "todo deleted");

        Ok(self.after_success(Mutation::Delete { id }).await)
    }

    #[instrument(skip(self, body), fields(body_len = body.len()))]
    pub async fn create_todo(&self, body: &str) -> Result<(Todo, Reconciliation), SyncError> {
        let todo = self.service.create(body).await.map_err(|err| {
            let err = SyncError::from_mutation(err);
            warn!(error = %err, "create failed; views unchanged");
            err
        })?;
        info!(id = todo.id, "todo created");

        let reconciliation = self.after_success(Mutation::Create { id: todo.id }).await;
        Ok((todo, reconciliation))
    }

    /// Last-known contents of a view.
    pub fn view(&self, key: ViewKey) -> Vec<Todo> {
        self.cache.read().get(key).data.clone()
    }

    pub fn entry(&self, key: ViewKey) -> ViewEntry {
        self.cache.read().get(key).clone()
    }

    pub fn rows(&self, key: ViewKey) -> Vec<TodoRow> {
        self.view(key).into_iter().map(TodoRow::from).collect()
    }

    /// Looks a todo up in the cached `all` view.
    pub fn find(&self, id: TodoId) -> Option<Todo> {
        self.cache.read().all.data.iter().find(|t| t.id == id).cloned()
    }

    pub fn is_partitioned(&self) -> bool {
        let cache = self.cache.read();
        partition_holds(&cache.all.data, &cache.pending.data, &cache.completed.data)
    }

    async fn after_success(&self, mutation: Mutation) -> Reconciliation {
        let keys = invalidated_views(mutation.kind());
        debug!(
            kind = %mutation.kind(),
            id = mutation.id(),
            views = ?keys,
            "invalidating views"
        );
        self.reconcile(keys).await
    }

    async fn reconcile(&self, keys: &[ViewKey]) -> Reconciliation {
        let results = join_all(keys.iter().map(|&key| async move { (key, self.fetch(key).await) })).await;

        let mut out = Reconciliation::default();
        for (key, result) in results {
            match result {
                Ok(_) => out.refreshed.push(key),
                Err(err) => out.failures.push(err),
            }
        }

        if out.is_complete() && !self.is_partitioned() {
            // Possible when another mutation lands between two of the refetches.
            warn!("views disagree after refetch; next invalidation will settle them");
        }
        out
    }

    #[instrument(skip(self, key), fields(view = %key))]
    async fn fetch(&self, key: ViewKey) -> Result<Vec<Todo>, SyncError> {
        let ticket = self.cache.write().get_mut(key).begin_fetch();
        let result = self.service.list(&key.statuses()).await;

        let mut cache = self.cache.write();
        let entry = cache.get_mut(key);
        match result {
            Ok(todos) => {
                if entry.apply(ticket, todos.clone(), Utc::now()) {
                    debug!(ticket, count = todos.len(), "view refreshed");
                } else {
                    debug!(ticket, "discarding superseded response");
                }
                Ok(todos)
            }
            Err(err) => {
                let err = SyncError::from_fetch(key, err);
                if entry.record_failure(ticket, err.to_string()) {
                    warn!(ticket, error = %err, "fetch failed; keeping last-known data");
                }
                Err(err)
            }
        }
    }
}

fn rejected(id: TodoId, err: ServiceError) -> SyncError {
    let err = SyncError::from_mutation(err);
    warn!(id, error = %err, "mutation failed; views unchanged");
    err
}
