//! Node identities, classification and node cursors

use crate::error::Result;
use crate::tree::Tree;
use chrono::{DateTime, Utc};
use enumset::EnumSetType;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a tree instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(pub Ulid);

impl TreeId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for TreeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TreeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a node, stable for the node's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub Ulid);

impl NodeId {
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    pub fn from_string(s: &str) -> std::result::Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-owning reference to a node: the tree that created it plus the node id.
///
/// Handles are cheap to copy and never keep a node alive. Once the node is
/// deleted the handle is stale and every tree operation treats it as unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeHandle {
    pub tree: TreeId,
    pub node: NodeId,
}

impl std::fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.node)
    }
}

/// Structural classification of a node.
///
/// Root status takes precedence: a parentless node is a root even when it
/// has children.
#[derive(Debug, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumSetType)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Branch,
    Leaf,
}

impl NodeKind {
    pub fn classify(parent_count: usize, child_count: usize) -> Self {
        match (parent_count, child_count) {
            (0, _) => Self::Root,
            (_, 0) => Self::Leaf,
            _ => Self::Branch,
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Root => "root",
            Self::Branch => "branch",
            Self::Leaf => "leaf",
        };
        f.write_str(name)
    }
}

/// How a candidate node relates to a tree for an intended linkage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    /// Belongs to another tree, or no longer exists
    Unrelated,
    /// Belongs to this tree but does not hold the intended linkage yet
    Related,
    /// Already holds the intended linkage
    AlreadyOwned,
}

/// Storage for one node inside its tree
#[derive(Debug, Clone)]
pub(crate) struct NodeRecord<V> {
    pub(crate) value: V,
    pub(crate) parents: Vec<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) seq: u64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
}

impl<V> NodeRecord<V> {
    pub(crate) fn new(value: V, seq: u64) -> Self {
        let now = Utc::now();
        Self {
            value,
            parents: Vec::new(),
            children: Vec::new(),
            seq,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn kind(&self) -> NodeKind {
        NodeKind::classify(self.parents.len(), self.children.len())
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Read-only view of a live node
pub struct NodeRef<'a, V> {
    tree: &'a Tree<V>,
    handle: NodeHandle,
    record: &'a NodeRecord<V>,
}

impl<'a, V> NodeRef<'a, V> {
    pub(crate) fn new(tree: &'a Tree<V>, handle: NodeHandle, record: &'a NodeRecord<V>) -> Self {
        Self {
            tree,
            handle,
            record,
        }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn id(&self) -> NodeId {
        self.handle.node
    }

    pub fn value(&self) -> &'a V {
        &self.record.value
    }

    pub fn kind(&self) -> NodeKind {
        self.record.kind()
    }

    pub fn is_root(&self) -> bool {
        self.kind() == NodeKind::Root
    }

    pub fn is_branch(&self) -> bool {
        self.kind() == NodeKind::Branch
    }

    pub fn is_leaf(&self) -> bool {
        self.kind() == NodeKind::Leaf
    }

    /// First parent, if any
    pub fn parent(&self) -> Option<NodeHandle> {
        self.record.parents.first().map(|id| self.tree.handle(*id))
    }

    pub fn parents(&self) -> Vec<NodeHandle> {
        self.tree.parents_of(self.handle)
    }

    pub fn children(&self) -> Vec<NodeHandle> {
        self.tree.children_of(self.handle)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.record.created_at
    }

    /// Last time the node's linkage changed
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.record.updated_at
    }

    pub fn is_descendant_of(&self, candidate_ancestor: NodeHandle) -> bool {
        self.tree.is_descendant_of(self.handle, candidate_ancestor)
    }
}

/// Mutable cursor on a live node.
///
/// Every structural change is validated and applied by the owning tree.
pub struct NodeMut<'a, V> {
    tree: &'a mut Tree<V>,
    handle: NodeHandle,
}

impl<'a, V> NodeMut<'a, V> {
    pub(crate) fn new(tree: &'a mut Tree<V>, handle: NodeHandle) -> Self {
        Self { tree, handle }
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn value(&self) -> Option<&V> {
        self.tree.value(self.handle)
    }

    pub fn value_mut(&mut self) -> Option<&mut V> {
        self.tree.value_mut(self.handle)
    }

    pub fn kind(&self) -> Option<NodeKind> {
        self.tree.kind_of(self.handle)
    }

    /// Create a new node holding `value` as a child of this node
    pub fn add_child(&mut self, value: V) -> Result<NodeHandle> {
        self.tree.add_child(self.handle, value)
    }

    pub fn can_reparent_to(&self, target: Option<NodeHandle>) -> bool {
        self.tree.can_reparent_to(self.handle, target)
    }

    pub fn request_reparent(&mut self, target: Option<NodeHandle>) -> Result<bool> {
        self.tree.request_reparent(self.handle, target)
    }

    pub fn add_parent(&mut self, parent: NodeHandle) -> Result<bool> {
        self.tree.add_parent(self.handle, parent)
    }

    pub fn remove_parent(&mut self, parent: NodeHandle) -> Result<bool> {
        self.tree.remove_parent(self.handle, parent)
    }

    pub fn is_descendant_of(&self, candidate_ancestor: NodeHandle) -> bool {
        self.tree.is_descendant_of(self.handle, candidate_ancestor)
    }

    pub fn can_delete(&self) -> bool {
        self.tree.can_delete(self.handle, false)
    }

    /// Delete this node, consuming the cursor
    pub fn delete(self, delete_children_recursively: bool) -> Result<bool> {
        self.tree.delete_node(self.handle, delete_children_recursively)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(NodeKind::classify(0, 0), NodeKind::Root);
        assert_eq!(NodeKind::classify(0, 3), NodeKind::Root);
        assert_eq!(NodeKind::classify(1, 0), NodeKind::Leaf);
        assert_eq!(NodeKind::classify(2, 1), NodeKind::Branch);
    }

    #[test]
    fn test_node_id_round_trips_through_string() {
        let id = NodeId::new();
        let parsed = NodeId::from_string(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(NodeKind::Branch.to_string(), "branch");
    }
}
