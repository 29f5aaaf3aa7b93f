//! The tree: owns every node, enforces the configured policies and
//! publishes change sets for its observable views

use crate::change::{ChangeSet, Feeds, PendingChanges, Subscription, ViewKind};
use crate::config::TreeConfig;
use crate::error::{Error, Rejection, Result};
use crate::node::{NodeHandle, NodeId, NodeKind, NodeMut, NodeRecord, NodeRef, Relationship, TreeId};
use std::collections::{HashMap, HashSet, VecDeque};

/// Observable hierarchy of values of type `V`.
///
/// Nodes are only created through the tree and are addressed with
/// [`NodeHandle`]s. Structural operations validate first and mutate
/// second: a rejected operation leaves the tree untouched and emits
/// nothing. Policy rejections are reported as `Ok(false)` (or `None`);
/// errors are reserved for handles that do not belong to this tree.
#[derive(Debug)]
pub struct Tree<V> {
    id: TreeId,
    config: TreeConfig,
    nodes: HashMap<NodeId, NodeRecord<V>>,
    roots: Vec<NodeId>,
    next_seq: u64,
    feeds: Feeds,
}

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new(TreeConfig::default())
    }
}

impl<V> Tree<V> {
    pub fn new(config: TreeConfig) -> Self {
        let id = TreeId::new();
        tracing::debug!("Created tree {} with {:?}", id, config);
        Self {
            id,
            config,
            nodes: HashMap::new(),
            roots: Vec::new(),
            next_seq: 0,
            feeds: Feeds::default(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn handle(&self, id: NodeId) -> NodeHandle {
        NodeHandle {
            tree: self.id,
            node: id,
        }
    }

    pub(crate) fn record(&self, id: NodeId) -> Option<&NodeRecord<V>> {
        self.nodes.get(&id)
    }

    /// Check that `handle` names a live node of this tree
    pub(crate) fn resolve(&self, handle: NodeHandle) -> Result<NodeId> {
        if handle.tree != self.id {
            return Err(Error::ForeignNode {
                node: handle,
                tree: self.id,
            });
        }
        if !self.nodes.contains_key(&handle.node) {
            return Err(Error::UnknownNode(handle));
        }
        Ok(handle.node)
    }

    /// Identity-based membership test
    pub fn does_node_belong_to_tree(&self, node: NodeHandle) -> bool {
        self.resolve(node).is_ok()
    }

    pub fn node(&self, handle: NodeHandle) -> Option<NodeRef<'_, V>> {
        let id = self.resolve(handle).ok()?;
        let record = self.nodes.get(&id)?;
        Some(NodeRef::new(self, handle, record))
    }

    pub fn node_mut(&mut self, handle: NodeHandle) -> Option<NodeMut<'_, V>> {
        self.resolve(handle).ok()?;
        Some(NodeMut::new(self, handle))
    }

    pub fn value(&self, node: NodeHandle) -> Option<&V> {
        let id = self.resolve(node).ok()?;
        self.nodes.get(&id).map(|r| &r.value)
    }

    /// Mutable access to a node's value; value edits are not structural
    /// and publish nothing
    pub fn value_mut(&mut self, node: NodeHandle) -> Option<&mut V> {
        let id = self.resolve(node).ok()?;
        self.nodes.get_mut(&id).map(|r| &mut r.value)
    }

    pub fn kind_of(&self, node: NodeHandle) -> Option<NodeKind> {
        let id = self.resolve(node).ok()?;
        self.nodes.get(&id).map(NodeRecord::kind)
    }

    /// First parent of `node`.
    ///
    /// Returns `None` for roots and for handles that are not live nodes of
    /// this tree.
    pub fn parent_of(&self, node: NodeHandle) -> Option<NodeHandle> {
        let id = self.resolve(node).ok()?;
        self.nodes[&id].parents.first().map(|p| self.handle(*p))
    }

    /// Every parent of `node`; empty for roots and foreign or stale handles
    pub fn parents_of(&self, node: NodeHandle) -> Vec<NodeHandle> {
        match self.resolve(node) {
            Ok(id) => self.nodes[&id].parents.iter().map(|p| self.handle(*p)).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Direct children of `node`; empty for leaves and foreign or stale
    /// handles
    pub fn children_of(&self, node: NodeHandle) -> Vec<NodeHandle> {
        match self.resolve(node) {
            Ok(id) => self.nodes[&id].children.iter().map(|c| self.handle(*c)).collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Root nodes in the order they became roots
    pub fn root_nodes(&self) -> Vec<NodeHandle> {
        self.roots.iter().map(|id| self.handle(*id)).collect()
    }

    /// Every node in creation order
    pub fn nodes(&self) -> Vec<NodeHandle> {
        let mut ids: Vec<(u64, NodeId)> = self.nodes.iter().map(|(id, r)| (r.seq, *id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| self.handle(id)).collect()
    }

    /// Whether `candidate_ancestor` appears on any ancestor chain of `node`
    pub fn is_descendant_of(&self, node: NodeHandle, candidate_ancestor: NodeHandle) -> bool {
        match (self.resolve(node), self.resolve(candidate_ancestor)) {
            (Ok(node), Ok(ancestor)) => self.has_ancestor(node, ancestor),
            _ => false,
        }
    }

    pub(crate) fn has_ancestor(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut visited = HashSet::new();
        let mut queue: VecDeque<NodeId> = self.nodes[&node].parents.iter().copied().collect();

        while let Some(current) = queue.pop_front() {
            if current == ancestor {
                return true;
            }
            if !visited.insert(current) {
                continue;
            }
            if let Some(record) = self.nodes.get(&current) {
                queue.extend(record.parents.iter().copied());
            }
        }
        false
    }

    /// Classify `candidate` against an intended linkage: under
    /// `intended_parent`, or as a root for `None`
    pub fn relationship_of(
        &self,
        candidate: NodeHandle,
        intended_parent: Option<NodeHandle>,
    ) -> Relationship {
        let Ok(id) = self.resolve(candidate) else {
            return Relationship::Unrelated;
        };
        let parents = &self.nodes[&id].parents;
        let owned = match intended_parent {
            None => parents.is_empty(),
            Some(parent) => parent.tree == self.id && parents.contains(&parent.node),
        };
        if owned {
            Relationship::AlreadyOwned
        } else {
            Relationship::Related
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Roots
    // ─────────────────────────────────────────────────────────────────────────

    /// Whether another parentless node may be added right now
    pub fn can_add_root_node(&self) -> bool {
        !self.config.single_root || self.roots.is_empty()
    }

    /// Create a new root node.
    ///
    /// Returns `None` when the tree is single-root and already has a root.
    pub fn create_root_node(&mut self, value: V) -> Option<NodeHandle> {
        if !self.can_add_root_node() {
            tracing::debug!("Rejected root creation in {}: {}", self.id, Rejection::RootLimit);
            return None;
        }

        let mut pending = PendingChanges::default();
        let id = self.insert_record(value, &mut pending);
        self.roots.push(id);
        pending.added(ViewKind::RootNodes, self.handle(id));
        tracing::debug!("Created root node {} in {}", id, self.id);

        self.feeds.publish(pending);
        Some(self.handle(id))
    }

    /// Register an existing node of this tree as a root, detaching it from
    /// its parents.
    ///
    /// Returns `false` without mutation for nodes of other trees, for
    /// nodes that already are roots, for node kinds that may not be
    /// reparented, and when a single-root tree already has a root.
    pub fn add_root_node_to_tree(&mut self, candidate: NodeHandle) -> bool {
        match self.relationship_of(candidate, None) {
            Relationship::Unrelated => {
                tracing::debug!("Rejected root registration of {}: {}", candidate, Rejection::Unrelated);
                false
            }
            Relationship::AlreadyOwned => {
                tracing::debug!("Rejected root registration of {}: already a root", candidate);
                false
            }
            Relationship::Related => {
                if let Err(reason) = self.validate_reparent(candidate.node, None) {
                    tracing::debug!("Rejected root registration of {}: {}", candidate, reason);
                    return false;
                }
                let mut pending = PendingChanges::default();
                self.set_parents(candidate.node, Vec::new(), &mut pending);
                tracing::debug!("Registered {} as a root of {}", candidate, self.id);
                self.feeds.publish(pending);
                true
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Node operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a new node holding `value` under `parent`
    pub fn add_child(&mut self, parent: NodeHandle, value: V) -> Result<NodeHandle> {
        let parent_id = self.resolve(parent)?;

        let mut pending = PendingChanges::default();
        let id = self.insert_record(value, &mut pending);
        self.link(parent_id, id, &mut pending);
        tracing::debug!("Added child {} under {}", id, parent_id);

        self.feeds.publish(pending);
        Ok(self.handle(id))
    }

    /// Why reparenting `node` under `target` (or to root for `None`) would
    /// be refused, if it would
    pub fn check_reparent(
        &self,
        node: NodeHandle,
        target: Option<NodeHandle>,
    ) -> std::result::Result<(), Rejection> {
        let id = self.resolve(node).map_err(|_| Rejection::Unrelated)?;
        let target = match target {
            Some(t) => Some(self.resolve(t).map_err(|_| Rejection::Unrelated)?),
            None => None,
        };
        self.validate_reparent(id, target)
    }

    pub fn can_reparent_to(&self, node: NodeHandle, target: Option<NodeHandle>) -> bool {
        self.check_reparent(node, target).is_ok()
    }

    /// Replace the whole parent linkage of `node` with `target`, or make it
    /// a root for `None`.
    ///
    /// Reparenting to the linkage the node already has is accepted and
    /// publishes nothing.
    pub fn request_reparent(&mut self, node: NodeHandle, target: Option<NodeHandle>) -> Result<bool> {
        let id = self.resolve(node)?;
        let target_id = target.map(|t| self.resolve(t)).transpose()?;

        if let Err(reason) = self.validate_reparent(id, target_id) {
            tracing::debug!("Rejected reparent of {} to {:?}: {}", id, target_id, reason);
            return Ok(false);
        }

        let mut pending = PendingChanges::default();
        self.set_parents(id, target_id.into_iter().collect(), &mut pending);
        tracing::debug!("Reparented {} to {:?}", id, target_id);

        self.feeds.publish(pending);
        Ok(true)
    }

    fn validate_reparent(
        &self,
        id: NodeId,
        target: Option<NodeId>,
    ) -> std::result::Result<(), Rejection> {
        let record = &self.nodes[&id];
        let kind = record.kind();
        if !self.config.can_reparent_kind(kind) {
            return Err(Rejection::KindNotReparentable(kind));
        }

        match target {
            Some(target) => {
                if target == id {
                    return Err(Rejection::SelfParent);
                }
                if !self.config.allow_circular && self.has_ancestor(target, id) {
                    return Err(Rejection::WouldCreateCycle);
                }
                Ok(())
            }
            None if record.parents.is_empty() => Ok(()),
            None if !self.can_add_root_node() => Err(Rejection::RootLimit),
            None => Ok(()),
        }
    }

    /// Why linking `parent` as an additional parent of `node` would be
    /// refused, if it would
    pub fn check_add_parent(
        &self,
        node: NodeHandle,
        parent: NodeHandle,
    ) -> std::result::Result<(), Rejection> {
        let id = self.resolve(node).map_err(|_| Rejection::Unrelated)?;
        let parent = self.resolve(parent).map_err(|_| Rejection::Unrelated)?;
        self.validate_add_parent(id, parent)
    }

    fn validate_add_parent(&self, id: NodeId, parent: NodeId) -> std::result::Result<(), Rejection> {
        let record = &self.nodes[&id];
        let kind = record.kind();
        if !self.config.can_reparent_kind(kind) {
            return Err(Rejection::KindNotReparentable(kind));
        }
        if parent == id {
            return Err(Rejection::SelfParent);
        }
        if record.parents.contains(&parent) {
            return Err(Rejection::AlreadyLinked);
        }
        if !record.parents.is_empty() && !self.config.allow_multiple_parents {
            return Err(Rejection::MultipleParents);
        }
        if !self.config.allow_circular && self.has_ancestor(parent, id) {
            return Err(Rejection::WouldCreateCycle);
        }
        Ok(())
    }

    /// Link `parent` as an additional parent of `node`, keeping its
    /// existing parents
    pub fn add_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<bool> {
        let id = self.resolve(node)?;
        let parent_id = self.resolve(parent)?;

        if let Err(reason) = self.validate_add_parent(id, parent_id) {
            tracing::debug!("Rejected linking {} under {}: {}", id, parent_id, reason);
            return Ok(false);
        }

        let mut parents = self.nodes[&id].parents.clone();
        parents.push(parent_id);
        let mut pending = PendingChanges::default();
        self.set_parents(id, parents, &mut pending);
        tracing::debug!("Linked {} under {}", id, parent_id);

        self.feeds.publish(pending);
        Ok(true)
    }

    /// Why unlinking `parent` from `node` would be refused, if it would
    pub fn check_remove_parent(
        &self,
        node: NodeHandle,
        parent: NodeHandle,
    ) -> std::result::Result<(), Rejection> {
        let id = self.resolve(node).map_err(|_| Rejection::Unrelated)?;
        let parent = self.resolve(parent).map_err(|_| Rejection::Unrelated)?;
        self.validate_remove_parent(id, parent)
    }

    fn validate_remove_parent(&self, id: NodeId, parent: NodeId) -> std::result::Result<(), Rejection> {
        let record = &self.nodes[&id];
        let kind = record.kind();
        if !self.config.can_reparent_kind(kind) {
            return Err(Rejection::KindNotReparentable(kind));
        }
        if !record.parents.contains(&parent) {
            return Err(Rejection::NotLinked);
        }
        if record.parents.len() == 1 && !self.can_add_root_node() {
            return Err(Rejection::RootLimit);
        }
        Ok(())
    }

    /// Unlink one parent of `node`; a node losing its last parent becomes
    /// a root
    pub fn remove_parent(&mut self, node: NodeHandle, parent: NodeHandle) -> Result<bool> {
        let id = self.resolve(node)?;
        let parent_id = self.resolve(parent)?;

        if let Err(reason) = self.validate_remove_parent(id, parent_id) {
            tracing::debug!("Rejected unlinking {} from {}: {}", id, parent_id, reason);
            return Ok(false);
        }

        let parents = self.nodes[&id]
            .parents
            .iter()
            .copied()
            .filter(|p| *p != parent_id)
            .collect();
        let mut pending = PendingChanges::default();
        self.set_parents(id, parents, &mut pending);
        tracing::debug!("Unlinked {} from {}", id, parent_id);

        self.feeds.publish(pending);
        Ok(true)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Deletion
    // ─────────────────────────────────────────────────────────────────────────

    /// Why deleting `node` would be refused, if it would
    pub fn check_delete(&self, node: NodeHandle, recursive: bool) -> std::result::Result<(), Rejection> {
        let id = self.resolve(node).map_err(|_| Rejection::Unrelated)?;
        self.validate_delete(id, recursive)
    }

    pub fn can_delete(&self, node: NodeHandle, recursive: bool) -> bool {
        self.check_delete(node, recursive).is_ok()
    }

    fn validate_delete(&self, id: NodeId, recursive: bool) -> std::result::Result<(), Rejection> {
        let record = &self.nodes[&id];
        let kind = record.kind();
        if !self.config.can_delete_kind(kind) {
            return Err(Rejection::KindNotDeletable(kind));
        }
        if recursive || !self.config.single_root {
            return Ok(());
        }

        // Children left without any parent become roots. In a circular
        // tree this can happen even when the deleted node is not a root.
        let promoted = self
            .promotions(id)
            .filter(|(_, parents)| parents.is_empty())
            .count();
        let remaining = self.roots.iter().filter(|r| **r != id).count();
        if remaining + promoted > 1 {
            return Err(Rejection::RootLimit);
        }
        Ok(())
    }

    /// New parent lists for the direct children of `id` once it is gone
    fn promotions(&self, id: NodeId) -> impl Iterator<Item = (NodeId, Vec<NodeId>)> + '_ {
        let record = &self.nodes[&id];
        record.children.iter().map(move |child| {
            let mut parents: Vec<NodeId> = Vec::new();
            for p in &self.nodes[child].parents {
                if *p == id {
                    for inherited in &record.parents {
                        if inherited != child && !parents.contains(inherited) {
                            parents.push(*inherited);
                        }
                    }
                } else if !parents.contains(p) {
                    parents.push(*p);
                }
            }
            (*child, parents)
        })
    }

    /// Remove `node` from the tree.
    ///
    /// With `recursive` every descendant is removed too. Otherwise each
    /// direct child takes over the deleted node's parents, or becomes a
    /// root when the deleted node was one.
    pub fn delete_node(&mut self, node: NodeHandle, recursive: bool) -> Result<bool> {
        let id = self.resolve(node)?;

        if let Err(reason) = self.validate_delete(id, recursive) {
            tracing::debug!("Rejected deletion of {}: {}", id, reason);
            return Ok(false);
        }

        let mut pending = PendingChanges::default();
        if recursive {
            let doomed = self.subtree(id);
            for gone in &doomed {
                pending.removed(ViewKind::AllNodes, self.handle(*gone));
            }
            // Deepest first, so every parent still exists when its child
            // is unlinked.
            for gone in doomed.iter().rev() {
                self.remove_record(*gone, &mut pending);
            }
            tracing::debug!("Deleted {} and {} descendant(s)", id, doomed.len() - 1);
        } else {
            let promotions: Vec<(NodeId, Vec<NodeId>)> = self.promotions(id).collect();
            for (child, parents) in promotions {
                self.set_parents(child, parents, &mut pending);
            }
            pending.removed(ViewKind::AllNodes, self.handle(id));
            self.remove_record(id, &mut pending);
            tracing::debug!("Deleted {}", id);
        }

        self.feeds.publish(pending);
        Ok(true)
    }

    /// `id` followed by every descendant in breadth-first order
    fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut order = vec![id];
        let mut visited: HashSet<NodeId> = HashSet::from([id]);
        let mut cursor = 0;

        while cursor < order.len() {
            let current = order[cursor];
            cursor += 1;
            for child in &self.nodes[&current].children {
                if visited.insert(*child) {
                    order.push(*child);
                }
            }
        }
        order
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Observable views
    // ─────────────────────────────────────────────────────────────────────────

    /// Observe the root nodes
    pub fn connect_root_nodes(&mut self) -> Subscription {
        let initial = ChangeSet::initial(self.root_nodes());
        self.feeds.subscribe(ViewKind::RootNodes, initial)
    }

    /// Observe every node of the tree
    pub fn connect_to_nodes(&mut self) -> Subscription {
        let initial = ChangeSet::initial(self.nodes());
        self.feeds.subscribe(ViewKind::AllNodes, initial)
    }

    /// Observe the direct children of `node`.
    ///
    /// The subscription ends when `node` is deleted.
    pub fn connect_to_child_nodes(&mut self, node: NodeHandle) -> Result<Subscription> {
        let id = self.resolve(node)?;
        let initial = ChangeSet::initial(self.children_of(node));
        Ok(self.feeds.subscribe(ViewKind::ChildNodes(id), initial))
    }

    /// Number of live subscribers of a view
    pub fn subscriber_count(&self, view: ViewKind) -> usize {
        self.feeds.subscriber_count(view)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Primitives: callers validate before mutating
    // ─────────────────────────────────────────────────────────────────────────

    fn insert_record(&mut self, value: V, pending: &mut PendingChanges) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, NodeRecord::new(value, self.next_seq));
        self.next_seq += 1;
        pending.added(ViewKind::AllNodes, self.handle(id));
        id
    }

    fn link(&mut self, parent: NodeId, child: NodeId, pending: &mut PendingChanges) {
        let mut parents = self.nodes[&child].parents.clone();
        parents.push(parent);
        self.set_parents(child, parents, pending);
    }

    /// Replace the parent list of `id`, keeping child lists, the root list
    /// and the affected views in step
    fn set_parents(&mut self, id: NodeId, parents: Vec<NodeId>, pending: &mut PendingChanges) {
        let handle = self.handle(id);
        let Some(record) = self.nodes.get_mut(&id) else {
            return;
        };
        if record.parents == parents {
            return;
        }
        let old = std::mem::replace(&mut record.parents, parents.clone());
        record.touch();

        for gone in old.iter().filter(|p| !parents.contains(p)) {
            if let Some(parent) = self.nodes.get_mut(gone) {
                parent.children.retain(|c| *c != id);
                parent.touch();
            }
            pending.removed(ViewKind::ChildNodes(*gone), handle);
        }
        for new in parents.iter().filter(|p| !old.contains(p)) {
            if let Some(parent) = self.nodes.get_mut(new) {
                parent.children.push(id);
                parent.touch();
            }
            pending.added(ViewKind::ChildNodes(*new), handle);
        }

        match (old.is_empty(), parents.is_empty()) {
            (true, false) => {
                self.roots.retain(|r| *r != id);
                pending.removed(ViewKind::RootNodes, handle);
            }
            (false, true) => {
                self.roots.push(id);
                pending.added(ViewKind::RootNodes, handle);
            }
            _ => {}
        }
    }

    /// Drop one record, unlinking it from surviving parents and children
    fn remove_record(&mut self, id: NodeId, pending: &mut PendingChanges) {
        let handle = self.handle(id);
        let Some(record) = self.nodes.remove(&id) else {
            return;
        };

        for parent in &record.parents {
            if let Some(p) = self.nodes.get_mut(parent) {
                p.children.retain(|c| *c != id);
                p.touch();
                pending.removed(ViewKind::ChildNodes(*parent), handle);
            }
        }
        for child in &record.children {
            if let Some(c) = self.nodes.get_mut(child) {
                c.parents.retain(|p| *p != id);
                c.touch();
            }
        }
        // Parent lists of doomed nodes shrink during a recursive delete, so
        // membership comes from the root list.
        if self.roots.contains(&id) {
            self.roots.retain(|r| *r != id);
            pending.removed(ViewKind::RootNodes, handle);
        }
        pending.close_children_of(id);
    }
}
