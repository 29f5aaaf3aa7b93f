//! CLI configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use glacier_tree_core::TreeConfig;

/// Default location of the tree configuration file
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("glacier-tree")
        .join("tree.toml")
}

/// Resolve the tree configuration.
///
/// An explicit path must exist. Without one, the default file is used
/// when present and the built-in defaults otherwise.
pub fn load_tree_config(explicit: Option<&Path>) -> anyhow::Result<TreeConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = config_file_path();
            if !default.exists() {
                tracing::debug!("No config at {:?}, using defaults", default);
                return Ok(TreeConfig::default());
            }
            default
        }
    };

    tracing::debug!("Loading tree config from {:?}", path);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    TreeConfig::from_toml_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Write `config` to `path`, creating parent directories
pub fn save_tree_config(config: &TreeConfig, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, config.to_toml_string()?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use glacier_tree_core::NodeKind;

    #[test]
    fn test_explicit_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tree.toml");
        let config = TreeConfig::new()
            .single_root()
            .with_deletable(NodeKind::Leaf);

        save_tree_config(&config, &path).unwrap();
        assert_eq!(load_tree_config(Some(&path)).unwrap(), config);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_tree_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
