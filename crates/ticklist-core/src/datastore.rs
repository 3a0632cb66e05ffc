use std::collections::BTreeSet;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use parking_lot::Mutex;
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::service::{ServiceError, TodoService, filter_by_status, next_id, validate_body};
use crate::todo::{Status, Todo, TodoId};

/// A todo collection kept in `todos.data` (one JSON object per line) under
/// a data directory. Every mutation rewrites the file atomically.
/// `seq.data` holds the last id handed out.
#[derive(Debug)]
pub struct FileTodoService {
    pub data_dir: PathBuf,
    pub todos_path: PathBuf,
    pub seq_path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTodoService {
    #[instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let todos_path = data_dir.join("todos.data");
        let seq_path = data_dir.join("seq.data");
        for path in [&todos_path, &seq_path] {
            if !path.exists() {
                fs::write(path, "")
                    .with_context(|| format!("failed to create {}", path.display()))?;
            }
        }

        info!(
            data_dir = %data_dir.display(),
            todos = %todos_path.display(),
            seq = %seq_path.display(),
            "opened todo datastore"
        );

        Ok(Self {
            data_dir,
            todos_path,
            seq_path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn load(&self) -> anyhow::Result<Vec<Todo>> {
        load_jsonl(&self.todos_path).context("failed to load todos.data")
    }

    fn save(&self, todos: &[Todo]) -> anyhow::Result<()> {
        save_jsonl_atomic(&self.todos_path, todos).context("failed to save todos.data")
    }

    fn last_issued(&self) -> anyhow::Result<TodoId> {
        let raw = fs::read_to_string(&self.seq_path)
            .with_context(|| format!("failed reading {}", self.seq_path.display()))?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(0);
        }
        trimmed
            .parse()
            .with_context(|| format!("corrupt id sequence in {}", self.seq_path.display()))
    }

    fn record_issued(&self, id: TodoId) -> anyhow::Result<()> {
        fs::write(&self.seq_path, id.to_string())
            .with_context(|| format!("failed writing {}", self.seq_path.display()))
    }

    /// Loads, edits and saves the collection under the write lock.
    fn modify<T>(
        &self,
        edit: impl FnOnce(&mut Vec<Todo>) -> Result<T, ServiceError>,
    ) -> Result<T, ServiceError> {
        let _guard = self.write_lock.lock();
        let mut todos = self.load().map_err(unavailable)?;
        let out = edit(&mut todos)?;
        self.save(&todos).map_err(unavailable)?;
        Ok(out)
    }
}

fn unavailable(err: anyhow::Error) -> ServiceError {
    ServiceError::Unavailable(format!("{err:#}"))
}

#[async_trait]
impl TodoService for FileTodoService {
    #[instrument(level = "debug", skip(self))]
    async fn list(&self, statuses: &BTreeSet<Status>) -> Result<Vec<Todo>, ServiceError> {
        let todos = self.load().map_err(unavailable)?;
        Ok(filter_by_status(&todos, statuses))
    }

    #[instrument(level = "debug", skip(self, body), fields(body_len = body.len()))]
    async fn create(&self, body: &str) -> Result<Todo, ServiceError> {
        let body = validate_body(body)?;
        self.modify(|todos| {
            let id = next_id(todos, self.last_issued().map_err(unavailable)?)?;
            self.record_issued(id).map_err(unavailable)?;
            let todo = Todo::new_pending(id, body);
            todos.push(todo.clone());
            Ok(todo)
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_status(&self, id: TodoId, status: Status) -> Result<(), ServiceError> {
        self.modify(|todos| {
            let todo = todos
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or(ServiceError::NotFound(id))?;
            todo.status = status;
            Ok(())
        })
    }

    #[instrument(level = "debug", skip(self))]
    async fn delete(&self, id: TodoId) -> Result<(), ServiceError> {
        self.modify(|todos| {
            let idx = todos
                .iter()
                .position(|t| t.id == id)
                .ok_or(ServiceError::NotFound(id))?;
            todos.remove(idx);
            Ok(())
        })
    }
}

#[instrument(skip(path))]
fn load_jsonl(path: &Path) -> anyhow::Result<Vec<Todo>> {
    debug!(file = %path.display(), "loading jsonl");
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);

    let mut out = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let todo: Todo = serde_json::from_str(trimmed)
            .with_context(|| format!("failed parsing {} line {}", path.display(), idx + 1))?;
        out.push(todo);
    }

    debug!(count = out.len(), "loaded todos from jsonl");
    Ok(out)
}

#[instrument(skip(path, todos))]
fn save_jsonl_atomic(path: &Path, todos: &[Todo]) -> anyhow::Result<()> {
    debug!(file = %path.display(), count = todos.len(), "saving jsonl atomically");

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = NamedTempFile::new_in(dir)?;
    for todo in todos {
        let serialized = serde_json::to_string(todo)?;
        writeln!(temp, "{serialized}")?;
    }
    temp.flush()?;

    temp.persist(path)
        .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

    Ok(())
}
