use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::todo::{Status, Todo, TodoId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("todo {0} not found")]
    NotFound(TodoId),

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("remote collection unavailable: {0}")]
    Unavailable(String),
}

/// The remote todo collection consumed by `ViewSync`.
///
/// `list` returns todos in the collection's own order, which callers treat
/// as insertion order. The mutating calls either fully apply or fail.
#[async_trait]
pub trait TodoService: Send + Sync {
    async fn list(&self, statuses: &BTreeSet<Status>) -> Result<Vec<Todo>, ServiceError>;

    async fn create(&self, body: &str) -> Result<Todo, ServiceError>;

    async fn update_status(&self, id: TodoId, status: Status) -> Result<(), ServiceError>;

    async fn delete(&self, id: TodoId) -> Result<(), ServiceError>;
}

#[async_trait]
impl<T> TodoService for Arc<T>
where
    T: TodoService + ?Sized,
{
    async fn list(&self, statuses: &BTreeSet<Status>) -> Result<Vec<Todo>, ServiceError> {
        (**self).list(statuses).await
    }

    async fn create(&self, body: &str) -> Result<Todo, ServiceError> {
        (**self).create(body).await
    }

    async fn update_status(&self, id: TodoId, status: Status) -> Result<(), ServiceError> {
        (**self).update_status(id, status).await
    }

    async fn delete(&self, id: TodoId) -> Result<(), ServiceError> {
        (**self).delete(id).await
    }
}

/// Validation shared by the bundled service implementations.
pub(crate) fn validate_body(body: &str) -> Result<String, ServiceError> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::Rejected("todo body must not be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

/// Ids are never reused, so a stale request naming a deleted todo cannot
/// hit one created later.
pub(crate) fn next_id(todos: &[Todo], last_issued: TodoId) -> Result<TodoId, ServiceError> {
    highest_id(todos)
        .max(last_issued)
        .checked_add(1)
        .ok_or_else(|| ServiceError::Rejected("id space exhausted".to_string()))
}

pub(crate) fn highest_id(todos: &[Todo]) -> TodoId {
    todos.iter().map(|t| t.id).max().unwrap_or(0)
}

pub(crate) fn filter_by_status(todos: &[Todo], statuses: &BTreeSet<Status>) -> Vec<Todo> {
    todos
        .iter()
        .filter(|t| statuses.contains(&t.status))
        .cloned()
        .collect()
}
