use std::fmt;

use crate::todo::{Status, TodoId};
use crate::view::ViewKey;

/// A mutation that was acknowledged by the remote collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Create { id: TodoId },
    UpdateStatus { id: TodoId, status: Status },
    Delete { id: TodoId },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationKind {
    Create,
    UpdateStatus,
    Delete,
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Mutation::Create { .. } => MutationKind::Create,
            Mutation::UpdateStatus { .. } => MutationKind::UpdateStatus,
            Mutation::Delete { .. } => MutationKind::Delete,
        }
    }

    pub fn id(&self) -> TodoId {
        match *self {
            Mutation::Create { id }
            | Mutation::UpdateStatus { id, .. }
            | Mutation::Delete { id } => id,
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MutationKind::Create => "create",
            MutationKind::UpdateStatus => "update-status",
            MutationKind::Delete => "delete",
        })
    }
}

/// Views to refetch once a mutation of `kind` has succeeded.
///
/// A status change moves a todo between the filtered views, and create or
/// delete changes membership of `all` plus one filtered view, so every kind
/// invalidates all three.
pub fn invalidated_views(kind: MutationKind) -> &'static [ViewKey] {
    match kind {
        MutationKind::Create | MutationKind::UpdateStatus | MutationKind::Delete => &ViewKey::ALL,
    }
}
