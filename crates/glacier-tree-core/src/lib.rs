//! GlacierKit Tree Core - Observable hierarchy engine
//!
//! This crate provides a generic hierarchy of values with configurable
//! structural policies (single or multiple roots, cycles, multiple
//! parents, which node classes may be moved or deleted) and push-based
//! change feeds for the root nodes, all nodes and the children of any
//! node.

pub mod change;
pub mod config;
pub mod error;
pub mod live;
pub mod node;
pub mod snapshot;
pub mod traversal;
pub mod tree;

pub use change::{Change, ChangeFeed, ChangeKind, ChangeSet, Subscription, ViewKind};
pub use config::{NodeKindSet, TreeConfig};
pub use error::{Error, Rejection, Result};
pub use live::LiveView;
pub use node::{NodeHandle, NodeId, NodeKind, NodeMut, NodeRef, Relationship, TreeId};
pub use snapshot::{NodeSnapshot, TreeSnapshot};
pub use traversal::{Descendants, Walk, WalkEntry};
pub use tree::Tree;
