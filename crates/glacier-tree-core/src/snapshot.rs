//! Serializable point-in-time copy of a tree

use crate::config::TreeConfig;
use crate::error::Result;
use crate::node::{NodeId, NodeKind, TreeId};
use crate::tree::Tree;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One node as captured by a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot<V> {
    pub id: NodeId,
    pub kind: NodeKind,
    pub value: V,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tree configuration, roots and nodes (in creation order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot<V> {
    pub tree: TreeId,
    pub config: TreeConfig,
    pub roots: Vec<NodeId>,
    pub nodes: Vec<NodeSnapshot<V>>,
}

impl<V: Serialize> TreeSnapshot<V> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl<V> TreeSnapshot<V> {
    pub fn node(&self, id: NodeId) -> Option<&NodeSnapshot<V>> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

impl<V: Clone> Tree<V> {
    pub fn snapshot(&self) -> TreeSnapshot<V> {
        let nodes = self
            .nodes()
            .into_iter()
            .filter_map(|handle| {
                let record = self.record(handle.node)?;
                Some(NodeSnapshot {
                    id: handle.node,
                    kind: record.kind(),
                    value: record.value.clone(),
                    parents: record.parents.clone(),
                    children: record.children.clone(),
                    created_at: record.created_at,
                    updated_at: record.updated_at,
                })
            })
            .collect();

        TreeSnapshot {
            tree: self.id(),
            config: self.config().clone(),
            roots: self.root_nodes().into_iter().map(|h| h.node).collect(),
            nodes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_captures_structure() {
        let mut tree = Tree::new(TreeConfig::new().single_root());
        let root = tree.create_root_node("root".to_string()).unwrap();
        let child = tree.add_child(root, "child".to_string()).unwrap();

        let snapshot = tree.snapshot();
        assert_eq!(snapshot.tree, tree.id());
        assert_eq!(snapshot.roots, vec![root.node]);
        assert_eq!(snapshot.nodes.len(), 2);

        let node = snapshot.node(child.node).unwrap();
        assert_eq!(node.kind, NodeKind::Leaf);
        assert_eq!(node.parents, vec![root.node]);
        assert_eq!(snapshot.node(root.node).unwrap().children, vec![child.node]);
    }

    #[test]
    fn test_snapshot_json() {
        let mut tree = Tree::default();
        tree.create_root_node(42u32).unwrap();

        let json = tree.snapshot().to_json().unwrap();
        assert!(json.contains("\"kind\": \"root\""));
        assert!(json.contains("\"value\": 42"));
        assert!(!json.contains("\"parents\""));

        let parsed: TreeSnapshot<u32> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nodes[0].value, 42);
    }
}
