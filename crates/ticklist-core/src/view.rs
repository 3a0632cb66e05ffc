use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};

use crate::todo::{Status, Todo, TodoId};

/// Names one of the three filtered projections of the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ViewKey {
    All,
    Pending,
    Completed,
}

impl ViewKey {
    pub const ALL: [ViewKey; 3] = [ViewKey::All, ViewKey::Pending, ViewKey::Completed];

    /// The status filter sent to the remote `list` call for this view.
    pub fn statuses(self) -> BTreeSet<Status> {
        match self {
            ViewKey::All => Status::ALL.into_iter().collect(),
            ViewKey::Pending => BTreeSet::from([Status::Pending]),
            ViewKey::Completed => BTreeSet::from([Status::Completed]),
        }
    }

    /// Every non-empty status set names exactly one view.
    pub fn from_statuses(statuses: &BTreeSet<Status>) -> Option<Self> {
        match (
            statuses.contains(&Status::Pending),
            statuses.contains(&Status::Completed),
        ) {
            (true, true) => Some(ViewKey::All),
            (true, false) => Some(ViewKey::Pending),
            (false, true) => Some(ViewKey::Completed),
            (false, false) => None,
        }
    }

    pub fn admits(self, status: Status) -> bool {
        match self {
            ViewKey::All => true,
            ViewKey::Pending => status == Status::Pending,
            ViewKey::Completed => status == Status::Completed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewKey::All => "all",
            ViewKey::Pending => "pending",
            ViewKey::Completed => "completed",
        }
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ViewKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(ViewKey::All),
            "pending" => Ok(ViewKey::Pending),
            "completed" | "done" => Ok(ViewKey::Completed),
            other => Err(anyhow!("unknown view: {other} (expected all, pending or completed)")),
        }
    }
}

/// Cached result of the most recent fetch of one view.
///
/// Fetches are numbered as they are issued. A response is only applied when
/// its ticket is newer than the last applied one, so a slow response never
/// overwrites data from a fetch that was issued after it.
#[derive(Debug, Clone)]
pub struct ViewEntry {
    pub key: ViewKey,
    pub data: Vec<Todo>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    issued: u64,
    applied: u64,
}

impl ViewEntry {
    pub fn new(key: ViewKey) -> Self {
        Self {
            key,
            data: Vec::new(),
            last_fetched_at: None,
            last_error: None,
            issued: 0,
            applied: 0,
        }
    }

    /// True when the last fetch failed and `data` is from an earlier one.
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }

    pub(crate) fn begin_fetch(&mut self) -> u64 {
        self.issued += 1;
        self.issued
    }

    pub(crate) fn apply(&mut self, ticket: u64, data: Vec<Todo>, now: DateTime<Utc>) -> bool {
        if ticket <= self.applied {
            return false;
        }
        self.applied = ticket;
        self.data = data;
        self.last_fetched_at = Some(now);
        self.last_error = None;
        true
    }

    pub(crate) fn record_failure(&mut self, ticket: u64, reason: String) -> bool {
        if ticket <= self.applied {
            return false;
        }
        self.applied = ticket;
        self.last_error = Some(reason);
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VisualState {
    pub checked: bool,
    pub strikethrough: bool,
    pub emphasized: bool,
}

/// Appearance of a todo row. Depends on the status only, never on the view
/// the row is shown in.
pub fn status_to_visual_state(status: Status) -> VisualState {
    match status {
        Status::Completed => VisualState {
            checked: true,
            strikethrough: true,
            emphasized: true,
        },
        Status::Pending => VisualState {
            checked: false,
            strikethrough: false,
            emphasized: false,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodoRow {
    pub todo: Todo,
    pub visual: VisualState,
}

impl From<Todo> for TodoRow {
    fn from(todo: Todo) -> Self {
        let visual = status_to_visual_state(todo.status);
        Self { todo, visual }
    }
}

/// Checks `all = pending ∪ completed` and `pending ∩ completed = ∅` by id,
/// and that each filtered view only holds todos its filter admits.
pub fn partition_holds(all: &[Todo], pending: &[Todo], completed: &[Todo]) -> bool {
    if pending.iter().any(|t| !ViewKey::Pending.admits(t.status))
        || completed.iter().any(|t| !ViewKey::Completed.admits(t.status))
    {
        return false;
    }

    let pending_ids: HashSet<TodoId> = pending.iter().map(|t| t.id).collect();
    let completed_ids: HashSet<TodoId> = completed.iter().map(|t| t.id).collect();
    if !pending_ids.is_disjoint(&completed_ids) {
        return false;
    }

    let all_ids: HashSet<TodoId> = all.iter().map(|t| t.id).collect();
    let union: HashSet<TodoId> = pending_ids.union(&completed_ids).copied().collect();
    all_ids == union && all_ids.len() == all.len()
}
