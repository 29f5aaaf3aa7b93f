//! Tree policy configuration

use crate::error::Result;
use crate::node::NodeKind;
use enumset::EnumSet;
use serde::{Deserialize, Serialize};

/// Set of node classes a policy applies to
pub type NodeKindSet = EnumSet<NodeKind>;

/// Policy set fixed at tree construction.
///
/// ```toml
/// single_root = true
/// allow_circular = false
/// allow_multiple_parents = false
/// reparentable = ["branch", "leaf"]
/// deletable = ["branch", "leaf"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// At most one parentless node at any time
    pub single_root: bool,

    /// Nodes may be linked under their own descendants
    pub allow_circular: bool,

    /// Nodes may have more than one parent
    pub allow_multiple_parents: bool,

    /// Node classes that may be reparented
    pub reparentable: NodeKindSet,

    /// Node classes that may be deleted
    pub deletable: NodeKindSet,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            single_root: false,
            allow_circular: false,
            allow_multiple_parents: false,
            reparentable: EnumSet::all(),
            deletable: EnumSet::all(),
        }
    }
}

impl TreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict the tree to a single root node
    pub fn single_root(mut self) -> Self {
        self.single_root = true;
        self
    }

    pub fn allow_circular(mut self) -> Self {
        self.allow_circular = true;
        self
    }

    pub fn allow_multiple_parents(mut self) -> Self {
        self.allow_multiple_parents = true;
        self
    }

    pub fn with_reparentable(mut self, kinds: impl Into<NodeKindSet>) -> Self {
        self.reparentable = kinds.into();
        self
    }

    pub fn with_deletable(mut self, kinds: impl Into<NodeKindSet>) -> Self {
        self.deletable = kinds.into();
        self
    }

    pub fn can_reparent_kind(&self, kind: NodeKind) -> bool {
        self.reparentable.contains(kind)
    }

    pub fn can_delete_kind(&self, kind: NodeKind) -> bool {
        self.deletable.contains(kind)
    }

    /// Parse a configuration from TOML; missing keys take their defaults
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_permissive_multi_root() {
        let config = TreeConfig::default();
        assert!(!config.single_root);
        assert!(!config.allow_circular);
        assert!(!config.allow_multiple_parents);
        assert_eq!(config.reparentable, EnumSet::all());
        assert_eq!(config.deletable, EnumSet::all());
    }

    #[test]
    fn test_builder() {
        let config = TreeConfig::new()
            .single_root()
            .with_reparentable(NodeKind::Branch | NodeKind::Leaf)
            .with_deletable(NodeKind::Leaf);

        assert!(config.single_root);
        assert!(!config.can_reparent_kind(NodeKind::Root));
        assert!(config.can_reparent_kind(NodeKind::Leaf));
        assert!(config.can_delete_kind(NodeKind::Leaf));
        assert!(!config.can_delete_kind(NodeKind::Branch));
    }

    #[test]
    fn test_parse_toml_with_defaults() {
        let config = TreeConfig::from_toml_str(
            r#"
            single_root = true
            deletable = ["leaf"]
            "#,
        )
        .unwrap();

        assert!(config.single_root);
        assert_eq!(config.deletable, EnumSet::only(NodeKind::Leaf));
        assert_eq!(config.reparentable, EnumSet::all());
    }

    #[test]
    fn test_toml_output_lists_kind_names() {
        let config = TreeConfig::new().with_reparentable(NodeKind::Root | NodeKind::Leaf);
        let text = config.to_toml_string().unwrap();

        assert!(text.contains("\"root\""));
        assert!(text.contains("\"leaf\""));
        assert_eq!(TreeConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(TreeConfig::from_toml_str(r#"deletable = ["trunk"]"#).is_err());
    }
}
