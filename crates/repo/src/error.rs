use thiserror::Error;

use crate::node::NodeId;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("no node at path: {0}")]
    UnknownPath(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// A sibling with that name already exists under the parent.
    #[error("duplicate child name {name:?} under {parent}")]
    DuplicateName { parent: NodeId, name: String },

    /// A staged expectation no longer held when the session committed:
    /// another session changed the item in between.
    #[error("conflict on {path}: {reason}")]
    Conflict { path: String, reason: String },
}

impl Error {
    #[inline]
    pub fn conflict(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Conflict {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
