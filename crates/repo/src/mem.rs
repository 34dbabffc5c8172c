//! In-memory repository backend.
//!
//! This is primarily a reference implementation and is also what the
//! test suites run against. Workspaces are created on first login and
//! shared between sessions; each session keeps a staged-operation
//! overlay and commits it with a two-phase save: validate every
//! expectation under the write lock, then apply all operations. A
//! failed validation applies nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::node::{path_segments, NodeId, Value};
use crate::session::{Repository, Session};
use crate::Error;

// ─────────────────────────────────────────────────────────────────────────────
// Committed workspace state
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct StoredNode {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: HashMap<String, Value>,
}

#[derive(Debug)]
struct WorkspaceState {
    root: NodeId,
    nodes: HashMap<NodeId, StoredNode>,
}

impl WorkspaceState {
    fn new() -> Self {
        let root = Uuid::new_v4();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            StoredNode {
                name: String::new(),
                parent: None,
                children: Vec::new(),
                properties: HashMap::new(),
            },
        );
        Self { root, nodes }
    }

    fn child_by_name(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        let node = self.nodes.get(&parent)?;
        node.children
            .iter()
            .copied()
            .find(|c| self.nodes.get(c).map(|n| n.name.as_str()) == Some(name))
    }

    /// Absolute path of a committed node, for error messages.
    fn path_of(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cur = Some(id);
        while let Some(c) = cur {
            match self.nodes.get(&c) {
                Some(node) => {
                    if node.parent.is_some() {
                        segments.push(node.name.clone());
                    }
                    cur = node.parent;
                }
                None => break,
            }
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository
// ─────────────────────────────────────────────────────────────────────────────

type SharedWorkspace = Arc<RwLock<WorkspaceState>>;

/// Shared in-memory repository. Cheap to clone via `Arc` at the
/// caller's side; all sessions on the same workspace name observe the
/// same committed state.
#[derive(Default)]
pub struct MemoryRepo {
    workspaces: RwLock<HashMap<String, SharedWorkspace>>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryRepo {
    type Session = MemorySession;

    async fn session(&self, workspace: &str) -> Result<MemorySession, Error> {
        let shared = {
            let mut workspaces = self.workspaces.write();
            workspaces
                .entry(workspace.to_owned())
                .or_insert_with(|| Arc::new(RwLock::new(WorkspaceState::new())))
                .clone()
        };
        Ok(MemorySession::new(shared))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct StagedNode {
    name: String,
    parent: NodeId,
}

#[derive(Debug, Clone)]
enum PropChange {
    Set {
        value: Value,
        /// `Some(observed)` marks a compare-and-set write; the commit
        /// validates `observed` against the committed value.
        expect: Option<Option<Value>>,
    },
    Remove,
}

pub struct MemorySession {
    state: SharedWorkspace,
    /// Nodes staged for creation, ids assigned at stage time.
    created: HashMap<NodeId, StagedNode>,
    /// Stage order of created nodes; parents always precede children.
    creation_order: Vec<NodeId>,
    /// Children appended per parent (committed or staged parents).
    child_adds: HashMap<NodeId, Vec<NodeId>>,
    prop_changes: HashMap<NodeId, HashMap<String, PropChange>>,
    renames: HashMap<NodeId, String>,
}

impl MemorySession {
    fn new(state: SharedWorkspace) -> Self {
        Self {
            state,
            created: HashMap::new(),
            creation_order: Vec::new(),
            child_adds: HashMap::new(),
            prop_changes: HashMap::new(),
            renames: HashMap::new(),
        }
    }

    fn known(&self, id: NodeId) -> bool {
        self.created.contains_key(&id) || self.state.read().nodes.contains_key(&id)
    }

    fn view_name(&self, id: NodeId) -> Result<String, Error> {
        if let Some(name) = self.renames.get(&id) {
            return Ok(name.clone());
        }
        if let Some(node) = self.created.get(&id) {
            return Ok(node.name.clone());
        }
        let state = self.state.read();
        state
            .nodes
            .get(&id)
            .map(|n| n.name.clone())
            .ok_or(Error::UnknownNode(id))
    }

    fn view_parent(&self, id: NodeId) -> Result<Option<NodeId>, Error> {
        if let Some(node) = self.created.get(&id) {
            return Ok(Some(node.parent));
        }
        let state = self.state.read();
        state
            .nodes
            .get(&id)
            .map(|n| n.parent)
            .ok_or(Error::UnknownNode(id))
    }

    fn view_children(&self, id: NodeId) -> Result<Vec<NodeId>, Error> {
        let mut children = if self.created.contains_key(&id) {
            Vec::new()
        } else {
            let state = self.state.read();
            state
                .nodes
                .get(&id)
                .map(|n| n.children.clone())
                .ok_or(Error::UnknownNode(id))?
        };
        if let Some(staged) = self.child_adds.get(&id) {
            children.extend(staged.iter().copied());
        }
        Ok(children)
    }

    fn view_child_by_name(&self, parent: NodeId, name: &str) -> Result<Option<NodeId>, Error> {
        for child in self.view_children(parent)? {
            if self.view_name(child)? == name {
                return Ok(Some(child));
            }
        }
        Ok(None)
    }

    fn view_property(&self, id: NodeId, key: &str) -> Result<Option<Value>, Error> {
        if let Some(changes) = self.prop_changes.get(&id) {
            if let Some(change) = changes.get(key) {
                return Ok(match change {
                    PropChange::Set { value, .. } => Some(value.clone()),
                    PropChange::Remove => None,
                });
            }
        }
        if self.created.contains_key(&id) {
            return Ok(None);
        }
        let state = self.state.read();
        state
            .nodes
            .get(&id)
            .map(|n| n.properties.get(key).cloned())
            .ok_or(Error::UnknownNode(id))
    }

    fn stage_set(
        &mut self,
        id: NodeId,
        key: &str,
        value: Value,
        expect: Option<Option<Value>>,
    ) -> Result<(), Error> {
        if !self.known(id) {
            return Err(Error::UnknownNode(id));
        }
        let changes = self.prop_changes.entry(id).or_default();
        let kept_expect = match changes.get(key) {
            // A later unchecked write keeps the first observation.
            Some(PropChange::Set { expect: prior, .. }) => prior.clone().or(expect),
            _ => expect,
        };
        changes.insert(
            key.to_owned(),
            PropChange::Set {
                value,
                expect: kept_expect,
            },
        );
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn node_by_path(&self, path: &str) -> Result<Option<NodeId>, Error> {
        let segments = path_segments(path)?;
        let mut cur = self.state.read().root;
        for segment in segments {
            match self.view_child_by_name(cur, segment)? {
                Some(next) => cur = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cur))
    }

    async fn node_exists(&self, id: NodeId) -> Result<bool, Error> {
        Ok(self.known(id))
    }

    async fn node_name(&self, id: NodeId) -> Result<String, Error> {
        self.view_name(id)
    }

    async fn parent(&self, id: NodeId) -> Result<Option<NodeId>, Error> {
        self.view_parent(id)
    }

    async fn children(&self, id: NodeId) -> Result<Vec<(String, NodeId)>, Error> {
        let mut out = Vec::new();
        for child in self.view_children(id)? {
            out.push((self.view_name(child)?, child));
        }
        Ok(out)
    }

    async fn create_node(&mut self, parent: NodeId, name: &str) -> Result<NodeId, Error> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidPath(name.to_owned()));
        }
        if !self.known(parent) {
            return Err(Error::UnknownNode(parent));
        }
        if self.view_child_by_name(parent, name)?.is_some() {
            return Err(Error::DuplicateName {
                parent,
                name: name.to_owned(),
            });
        }
        let id = Uuid::new_v4();
        self.created.insert(
            id,
            StagedNode {
                name: name.to_owned(),
                parent,
            },
        );
        self.creation_order.push(id);
        self.child_adds.entry(parent).or_default().push(id);
        Ok(id)
    }

    async fn rename_node(&mut self, id: NodeId, name: &str) -> Result<(), Error> {
        if name.is_empty() || name.contains('/') {
            return Err(Error::InvalidPath(name.to_owned()));
        }
        let Some(parent) = self.view_parent(id)? else {
            return Err(Error::InvalidPath("/".to_owned()));
        };
        if let Some(existing) = self.view_child_by_name(parent, name)? {
            if existing != id {
                return Err(Error::DuplicateName {
                    parent,
                    name: name.to_owned(),
                });
            }
        }
        if let Some(staged) = self.created.get_mut(&id) {
            staged.name = name.to_owned();
        } else {
            self.renames.insert(id, name.to_owned());
        }
        Ok(())
    }

    async fn ensure_path(&mut self, path: &str) -> Result<NodeId, Error> {
        let segments: Vec<String> = path_segments(path)?
            .into_iter()
            .map(str::to_owned)
            .collect();
        let mut cur = self.state.read().root;
        for segment in segments {
            cur = match self.view_child_by_name(cur, &segment)? {
                Some(next) => next,
                None => self.create_node(cur, &segment).await?,
            };
        }
        Ok(cur)
    }

    async fn property(&self, id: NodeId, key: &str) -> Result<Option<Value>, Error> {
        self.view_property(id, key)
    }

    async fn set_property(&mut self, id: NodeId, key: &str, value: Value) -> Result<(), Error> {
        self.stage_set(id, key, value, None)
    }

    async fn checked_set_property(
        &mut self,
        id: NodeId,
        key: &str,
        value: Value,
        expect: Option<Value>,
    ) -> Result<(), Error> {
        self.stage_set(id, key, value, Some(expect))
    }

    async fn remove_property(&mut self, id: NodeId, key: &str) -> Result<(), Error> {
        if !self.known(id) {
            return Err(Error::UnknownNode(id));
        }
        self.prop_changes
            .entry(id)
            .or_default()
            .insert(key.to_owned(), PropChange::Remove);
        Ok(())
    }

    async fn save(&mut self) -> Result<(), Error> {
        let mut state = self.state.write();

        // Phase 1: validate against the committed state.
        for (id, staged) in &self.created {
            if let Some(parent) = state.nodes.get(&staged.parent) {
                let taken = parent
                    .children
                    .iter()
                    .any(|c| state.nodes.get(c).map(|n| n.name.as_str()) == Some(&staged.name));
                if taken {
                    return Err(Error::Conflict {
                        path: format!("{}/{}", state.path_of(staged.parent), staged.name),
                        reason: "node was created concurrently".to_owned(),
                    });
                }
            } else if !self.created.contains_key(&staged.parent) {
                return Err(Error::UnknownNode(*id));
            }
        }
        for (id, name) in &self.renames {
            let Some(node) = state.nodes.get(id) else {
                return Err(Error::UnknownNode(*id));
            };
            if let Some(parent) = node.parent {
                let taken = state
                    .child_by_name(parent, name)
                    .is_some_and(|other| other != *id);
                if taken {
                    return Err(Error::Conflict {
                        path: format!("{}/{}", state.path_of(parent), name),
                        reason: "name was taken concurrently".to_owned(),
                    });
                }
            }
        }
        for (id, changes) in &self.prop_changes {
            let committed = state.nodes.get(id);
            if committed.is_none() && !self.created.contains_key(id) {
                return Err(Error::UnknownNode(*id));
            }
            for (key, change) in changes {
                if let PropChange::Set {
                    expect: Some(observed),
                    ..
                } = change
                {
                    let current = committed.and_then(|n| n.properties.get(key));
                    if current != observed.as_ref() {
                        let path = committed
                            .map(|_| state.path_of(*id))
                            .unwrap_or_else(|| "<new node>".to_owned());
                        return Err(Error::Conflict {
                            path: format!("{path}@{key}"),
                            reason: "value changed since it was read".to_owned(),
                        });
                    }
                }
            }
        }

        // Phase 2: apply. Creation order guarantees parents first.
        for id in &self.creation_order {
            let staged = &self.created[id];
            state.nodes.insert(
                *id,
                StoredNode {
                    name: staged.name.clone(),
                    parent: Some(staged.parent),
                    children: Vec::new(),
                    properties: HashMap::new(),
                },
            );
            if let Some(parent) = state.nodes.get_mut(&staged.parent) {
                parent.children.push(*id);
            }
        }
        for (id, name) in self.renames.drain() {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.name = name;
            }
        }
        for (id, changes) in self.prop_changes.drain() {
            let Some(node) = state.nodes.get_mut(&id) else {
                continue;
            };
            for (key, change) in changes {
                match change {
                    PropChange::Set { value, .. } => {
                        node.properties.insert(key, value);
                    }
                    PropChange::Remove => {
                        node.properties.remove(&key);
                    }
                }
            }
        }
        debug!(created = self.creation_order.len(), "session committed");
        self.created.clear();
        self.creation_order.clear();
        self.child_adds.clear();
        Ok(())
    }
}
