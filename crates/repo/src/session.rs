//! Storage port for the tree repository.
//!
//! Callers stage mutations on a [`Session`] and make them visible with
//! a single [`Session::save`] call; until then nothing is observable
//! from other sessions, and a session always reads its own staged
//! writes. Backends are injected through the [`Repository`] trait.

use async_trait::async_trait;

use crate::node::{NodeId, Value};
use crate::Error;

#[async_trait]
pub trait Session: Send {
    /// Resolve an absolute path (`/a/b/c`) to a node, if present.
    async fn node_by_path(&self, path: &str) -> Result<Option<NodeId>, Error>;

    async fn node_exists(&self, id: NodeId) -> Result<bool, Error>;

    async fn node_name(&self, id: NodeId) -> Result<String, Error>;

    async fn parent(&self, id: NodeId) -> Result<Option<NodeId>, Error>;

    /// Direct children as `(name, id)` pairs, in insertion order.
    async fn children(&self, id: NodeId) -> Result<Vec<(String, NodeId)>, Error>;

    /// Stage creation of a child node. The id is assigned immediately
    /// so references to the node can be staged before commit.
    async fn create_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error>;

    /// Stage a rename. Tree position and identity are unaffected.
    async fn rename_node(&mut self, id: NodeId, name: &str) -> Result<(), Error>;

    /// Walk `path` from the root, staging creation of any missing
    /// segment, and return the terminal node.
    async fn ensure_path(&mut self, path: &str) -> Result<NodeId, Error>;

    async fn property(&self, id: NodeId, key: &str) -> Result<Option<Value>, Error>;

    async fn set_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<(), Error>;

    /// Stage a compare-and-set write: at commit time the committed
    /// value must still equal `expect` (`None` = absent), otherwise
    /// the whole commit fails with [`Error::Conflict`] and nothing is
    /// applied. `expect` is what the caller observed *before* staging
    /// its own changes to the key.
    async fn checked_set_property(
        &mut self,
        id: NodeId,
        key: &str,
        value: Value,
        expect: Option<Value>,
    ) -> Result<(), Error>;

    async fn remove_property(&mut self, id: NodeId, key: &str) -> Result<(), Error>;

    /// Commit all staged mutations atomically. On error nothing was
    /// applied; the staged set is kept so the caller can inspect or
    /// drop the session.
    async fn save(&mut self) -> Result<(), Error>;
}

#[async_trait]
pub trait Repository: Send + Sync {
    type Session: Session;

    /// Open a session on the named workspace, creating the workspace
    /// on first login.
    async fn session(&self, workspace: &str) -> Result<Self::Session, Error>;
}
