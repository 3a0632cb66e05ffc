use std::collections::BTreeSet;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::service::{
    ServiceError, TodoService, filter_by_status, highest_id, next_id, validate_body,
};
use crate::todo::{Status, Todo, TodoId};

/// A process-local todo collection. Stands in for the remote service in
/// tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryTodoService {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    todos: Vec<Todo>,
    last_issued: TodoId,
}

impl InMemoryTodoService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_todos(todos: Vec<Todo>) -> Self {
        let last_issued = highest_id(&todos);
        Self {
            state: Mutex::new(State { todos, last_issued }),
        }
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.state.lock().todos.clone()
    }
}

#[async_trait]
impl TodoService for InMemoryTodoService {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, statuses: &BTreeSet<Status>) -> Result<Vec<Todo>, ServiceError> {
        let state = self.state.lock();
        let out = filter_by_status(&state.todos, statuses);
        debug!(count = out.len(), "listed todos");
        Ok(out)
    }

    #[instrument(level = "debug", skip(self, body), fields(body_len = body.len()))]
    async fn create(&self, body: &str) -> Result<Todo, ServiceError> {
        let body = validate_body(body)?;
        let mut state = self.state.lock();
        let id = next_id(&state.todos, state.last_issued)?;
        state.last_issued = id;
        let todo = Todo::new_pending(id, body);
        state.todos.push(todo.clone());
        Ok(todo)
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_status(&self, id: TodoId, status: Status) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let todo = state
            .todos
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(ServiceError::NotFound(id))?;
        todo.status = status;
        Ok(())
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, id: TodoId) -> Result<(), ServiceError> {
        let mut state = self.state.lock();
        let idx = state
            .todos
            .iter()
            .position(|t| t.id == id)
            .ok_or(ServiceError::NotFound(id))?;
        state.todos.remove(idx);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;
    use crate::view::ViewKey;

    #[test]
    fn create_allocates_increasing_ids_and_rejects_blank_bodies() {
        let service = InMemoryTodoService::new();
        block_on(async {
            let a = service.create("  buy milk ").await.expect("create a");
            let b = service.create("call mom").await.expect("create b");
            assert_eq!((a.id, b.id), (1, 2));
            assert_eq!(a.body, "buy milk");
            assert_eq!(a.status, Status::Pending);

            let err = service.create("   ").await.expect_err("blank body");
            assert!(matches!(err, ServiceError::Rejected(_)));
        });
        assert_eq!(service.snapshot().len(), 2);
    }

    #[test]
    fn exhausted_id_space_is_a_rejection() {
        let service = InMemoryTodoService::with_todos(vec![Todo::new_pending(TodoId::MAX, "last")]);
        let err = block_on(service.create("one too many")).expect_err("no ids left");
        assert_eq!(err, ServiceError::Rejected("id space exhausted".to_string()));
        assert_eq!(service.snapshot().len(), 1);
    }

    #[test]
    fn list_filters_and_keeps_insertion_order() {
        let service = InMemoryTodoService::with_todos(vec![
            Todo::new_pending(5, "e"),
            Todo {
                id: 2,
                body: "b".to_string(),
                status: Status::Completed,
            },
            Todo::new_pending(9, "i"),
        ]);

        let pending = block_on(service.list(&ViewKey::Pending.statuses())).expect("list");
        assert_eq!(pending.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 9]);

        let all = block_on(service.list(&ViewKey::All.statuses())).expect("list");
        assert_eq!(all.iter().map(|t| t.id).collect::<Vec<_>>(), vec![5, 2, 9]);
    }

    #[test]
    fn mutations_on_unknown_ids_fail_with_not_found() {
        let service = InMemoryTodoService::with_todos(vec![Todo::new_pending(1, "a")]);
        block_on(async {
            assert_eq!(
                service.update_status(4, Status::Completed).await,
                Err(ServiceError::NotFound(4))
            );
            assert_eq!(service.delete(4).await, Err(ServiceError::NotFound(4)));
            service.delete(1).await.expect("delete existing");
            assert_eq!(service.delete(1).await, Err(ServiceError::NotFound(1)));

            let fresh = service.create("again").await.expect("create");
            assert_eq!(fresh.id, 2);
            service.delete(fresh.id).await.expect("delete fresh");
            let newer = service.create("once more").await.expect("create");
            assert_eq!(newer.id, 3);
        });
    }
}
