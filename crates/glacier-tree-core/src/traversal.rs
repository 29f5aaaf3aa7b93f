//! Traversal over a tree's linkage
//!
//! Every walk is guarded against cycles, so the iterators terminate on
//! trees configured with `allow_circular`.

use crate::node::{NodeHandle, NodeId, NodeKind};
use crate::tree::Tree;
use std::collections::{HashSet, VecDeque};

/// Breadth-first iterator over every node below a start node
pub struct Descendants<'a, V> {
    tree: &'a Tree<V>,
    visited: HashSet<NodeId>,
    queue: VecDeque<NodeId>,
}

impl<'a, V> Iterator for Descendants<'a, V> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.queue.pop_front()?;
        if let Some(record) = self.tree.record(current) {
            for child in &record.children {
                if self.visited.insert(*child) {
                    self.queue.push_back(*child);
                }
            }
        }
        Some(self.tree.handle(current))
    }
}

/// A node reached by [`Tree::walk`], with its distance from the root the
/// walk started at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkEntry {
    pub depth: usize,
    pub node: NodeHandle,
}

/// Pre-order walk from every root.
///
/// A node with several parents is visited once under each of them; a child
/// already on the current path is skipped.
pub struct Walk<'a, V> {
    tree: &'a Tree<V>,
    stack: Vec<(NodeId, usize)>,
    path: Vec<NodeId>,
}

impl<'a, V> Iterator for Walk<'a, V> {
    type Item = WalkEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let (current, depth) = self.stack.pop()?;
        self.path.truncate(depth);
        self.path.push(current);

        if let Some(record) = self.tree.record(current) {
            // Push children in reverse order for left-to-right traversal
            for child in record.children.iter().rev() {
                if !self.path.contains(child) {
                    self.stack.push((*child, depth + 1));
                }
            }
        }
        Some(WalkEntry {
            depth,
            node: self.tree.handle(current),
        })
    }
}

impl<V> Tree<V> {
    /// Every node reachable through child links from `node`, excluding
    /// `node` itself. Empty for foreign or stale handles.
    pub fn descendants(&self, node: NodeHandle) -> Descendants<'_, V> {
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        if let Ok(id) = self.resolve(node) {
            visited.insert(id);
            if let Some(record) = self.record(id) {
                for child in &record.children {
                    if visited.insert(*child) {
                        queue.push_back(*child);
                    }
                }
            }
        }
        Descendants {
            tree: self,
            visited,
            queue,
        }
    }

    /// Every node reachable through parent links from `node`, nearest
    /// first
    pub fn ancestors(&self, node: NodeHandle) -> Vec<NodeHandle> {
        let Ok(start) = self.resolve(node) else {
            return Vec::new();
        };
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        let mut queue: VecDeque<NodeId> = VecDeque::from([start]);
        let mut found = Vec::new();

        while let Some(current) = queue.pop_front() {
            let Some(record) = self.record(current) else {
                continue;
            };
            for parent in &record.parents {
                if visited.insert(*parent) {
                    found.push(self.handle(*parent));
                    queue.push_back(*parent);
                }
            }
        }
        found
    }

    /// Number of links on the shortest path from `node` up to a root.
    ///
    /// `None` for foreign or stale handles and for nodes with no path to a
    /// root (possible only in circular trees).
    pub fn depth(&self, node: NodeHandle) -> Option<usize> {
        let start = self.resolve(node).ok()?;
        let mut visited: HashSet<NodeId> = HashSet::from([start]);
        let mut queue: VecDeque<(NodeId, usize)> = VecDeque::from([(start, 0)]);

        while let Some((current, depth)) = queue.pop_front() {
            let record = self.record(current)?;
            if record.parents.is_empty() {
                return Some(depth);
            }
            for parent in &record.parents {
                if visited.insert(*parent) {
                    queue.push_back((*parent, depth + 1));
                }
            }
        }
        None
    }

    /// Every node classified as a leaf, in creation order
    pub fn leaf_nodes(&self) -> Vec<NodeHandle> {
        self.nodes()
            .into_iter()
            .filter(|h| self.kind_of(*h) == Some(NodeKind::Leaf))
            .collect()
    }

    /// Pre-order walk over the hierarchy, root by root
    pub fn walk(&self) -> Walk<'_, V> {
        let stack = self
            .root_nodes()
            .into_iter()
            .rev()
            .map(|h| (h.node, 0))
            .collect();
        Walk {
            tree: self,
            stack,
            path: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::config::TreeConfig;
    use crate::node::NodeHandle;
    use crate::tree::Tree;

    // a
    // ├── b
    // │   └── d
    // └── c
    // e
    fn create_test_tree() -> (Tree<&'static str>, Vec<NodeHandle>) {
        let mut tree = Tree::new(TreeConfig::new().allow_multiple_parents());
        let a = tree.create_root_node("a").unwrap();
        let b = tree.add_child(a, "b").unwrap();
        let c = tree.add_child(a, "c").unwrap();
        let d = tree.add_child(b, "d").unwrap();
        let e = tree.create_root_node("e").unwrap();
        (tree, vec![a, b, c, d, e])
    }

    fn values(tree: &Tree<&'static str>, handles: impl IntoIterator<Item = NodeHandle>) -> Vec<&'static str> {
        handles.into_iter().map(|h| *tree.value(h).unwrap()).collect()
    }

    #[test]
    fn test_descendants_breadth_first() {
        let (tree, nodes) = create_test_tree();
        assert_eq!(values(&tree, tree.descendants(nodes[0])), vec!["b", "c", "d"]);
        assert_eq!(tree.descendants(nodes[3]).count(), 0);
    }

    #[test]
    fn test_ancestors_follow_every_parent() {
        let (mut tree, nodes) = create_test_tree();
        tree.add_parent(nodes[3], nodes[4]).unwrap();
        assert_eq!(values(&tree, tree.ancestors(nodes[3])), vec!["b", "e", "a"]);
        assert!(tree.ancestors(nodes[0]).is_empty());
    }

    #[test]
    fn test_depth() {
        let (mut tree, nodes) = create_test_tree();
        assert_eq!(tree.depth(nodes[0]), Some(0));
        assert_eq!(tree.depth(nodes[3]), Some(2));

        tree.add_parent(nodes[3], nodes[4]).unwrap();
        assert_eq!(tree.depth(nodes[3]), Some(1));
    }

    #[test]
    fn test_depth_without_root_path() {
        let mut tree = Tree::new(TreeConfig::new().allow_circular());
        let a = tree.create_root_node("a").unwrap();
        let b = tree.add_child(a, "b").unwrap();
        tree.request_reparent(a, Some(b)).unwrap();

        assert_eq!(tree.depth(a), None);
        assert_eq!(tree.descendants(a).count(), 1);
        assert_eq!(tree.walk().count(), 0);
    }

    #[test]
    fn test_leaf_nodes() {
        let (tree, _) = create_test_tree();
        assert_eq!(values(&tree, tree.leaf_nodes()), vec!["c", "d"]);
    }

    #[test]
    fn test_walk_pre_order() {
        let (mut tree, nodes) = create_test_tree();
        tree.add_parent(nodes[3], nodes[4]).unwrap();

        let entries: Vec<(usize, &str)> = tree
            .walk()
            .map(|e| (e.depth, *tree.value(e.node).unwrap()))
            .collect();
        assert_eq!(
            entries,
            vec![(0, "a"), (1, "b"), (2, "d"), (1, "c"), (0, "e"), (1, "d")]
        );
    }
}
