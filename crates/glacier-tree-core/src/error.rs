//! Error types for the hierarchy engine

use crate::node::{NodeHandle, NodeKind, TreeId};
use thiserror::Error;

/// Result type alias using the engine's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Precondition violations and (de)serialization failures.
///
/// Policy rejections are not errors; see [`Rejection`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("Node {node} belongs to tree {}, not tree {tree}", .node.tree)]
    ForeignNode { node: NodeHandle, tree: TreeId },

    #[error("Node not found (deleted or never created): {0}")]
    UnknownNode(NodeHandle),

    #[error("Invalid tree configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Could not encode tree configuration: {0}")]
    ConfigEncode(#[from] toml::ser::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reason a structural change was refused by the tree's policy.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    #[error("{0} nodes may not be reparented in this tree")]
    KindNotReparentable(NodeKind),

    #[error("{0} nodes may not be deleted in this tree")]
    KindNotDeletable(NodeKind),

    #[error("a node cannot be its own parent")]
    SelfParent,

    #[error("target is a descendant of the node")]
    WouldCreateCycle,

    #[error("tree allows a single root and one already exists")]
    RootLimit,

    #[error("tree does not allow multiple parents")]
    MultipleParents,

    #[error("nodes are already linked")]
    AlreadyLinked,

    #[error("nodes are not linked")]
    NotLinked,

    #[error("node belongs to another tree")]
    Unrelated,
}
