//! Scripted hierarchy scenarios
//!
//! A scenario is a TOML file with an optional `[config]` table and a list
//! of `[[step]]` tables. Nodes are addressed by unique names; watchers
//! connect to a view and report every change set they observe.

use std::collections::HashMap;

use anyhow::{bail, Context};
use glacier_tree_core::{
    ChangeKind, NodeHandle, NodeId, NodeKind, Rejection, Relationship, Subscription, Tree,
    TreeConfig,
};
use serde::{Deserialize, Serialize};

/// Scenario file contents
#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub config: Option<TreeConfig>,

    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

impl Scenario {
    pub fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

/// View a watcher connects to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchTarget {
    Roots,
    All,
    Children,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    CreateRoot {
        name: String,
    },
    AddChild {
        parent: String,
        name: String,
    },
    AddRoot {
        node: String,
    },
    Delete {
        node: String,
        #[serde(default)]
        recursive: bool,
    },
    Reparent {
        node: String,
        #[serde(default)]
        to: Option<String>,
    },
    AddParent {
        node: String,
        parent: String,
    },
    RemoveParent {
        node: String,
        parent: String,
    },
    Watch {
        label: String,
        view: WatchTarget,
        #[serde(default)]
        node: Option<String>,
    },
    Unwatch {
        label: String,
    },
}

impl Step {
    pub fn describe(&self) -> String {
        match self {
            Self::CreateRoot { name } => format!("create_root {}", name),
            Self::AddChild { parent, name } => format!("add_child {} under {}", name, parent),
            Self::AddRoot { node } => format!("add_root {}", node),
            Self::Delete { node, recursive } => {
                if *recursive {
                    format!("delete {} (recursive)", node)
                } else {
                    format!("delete {}", node)
                }
            }
            Self::Reparent { node, to } => match to {
                Some(to) => format!("reparent {} under {}", node, to),
                None => format!("reparent {} to root", node),
            },
            Self::AddParent { node, parent } => format!("add_parent {} to {}", parent, node),
            Self::RemoveParent { node, parent } => format!("remove_parent {} from {}", parent, node),
            Self::Watch { label, view, node } => match node {
                Some(node) => format!("watch {} = {:?} of {}", label, view, node),
                None => format!("watch {} = {:?}", label, view),
            },
            Self::Unwatch { label } => format!("unwatch {}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Accepted,
    Rejected { reason: String },
}

impl From<std::result::Result<(), Rejection>> for Outcome {
    fn from(check: std::result::Result<(), Rejection>) -> Self {
        match check {
            Ok(()) => Self::Accepted,
            Err(reason) => Self::Rejected {
                reason: reason.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedChange {
    pub kind: ChangeKind,
    pub node: String,
}

impl NamedChange {
    pub fn sign(&self) -> char {
        match self.kind {
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        }
    }
}

/// Change sets one watcher received during one step, flattened
#[derive(Debug, Clone, Serialize)]
pub struct Observed {
    pub watcher: String,
    pub sets: usize,
    pub changes: Vec<NamedChange>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub description: String,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub observed: Vec<Observed>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeLine {
    pub depth: usize,
    pub name: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub config: TreeConfig,
    pub steps: Vec<StepReport>,
    pub tree: Vec<TreeLine>,
}

impl RunReport {
    pub fn rejected_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, Outcome::Rejected { .. }))
            .count()
    }
}

struct Watcher {
    label: String,
    subscription: Subscription,
}

/// Executes scenario steps against a tree of named nodes
pub struct ScenarioRunner {
    tree: Tree<String>,
    handles: HashMap<String, NodeHandle>,
    names: HashMap<NodeId, String>,
    watchers: Vec<Watcher>,
}

impl ScenarioRunner {
    pub fn new(config: TreeConfig) -> Self {
        Self {
            tree: Tree::new(config),
            handles: HashMap::new(),
            names: HashMap::new(),
            watchers: Vec::new(),
        }
    }

    /// Run every step; policy rejections are reported, unknown names and
    /// foreign nodes abort the run
    pub fn run(mut self, steps: &[Step]) -> anyhow::Result<RunReport> {
        let mut reports = Vec::with_capacity(steps.len());
        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            let outcome = self
                .apply(step)
                .with_context(|| format!("step {} ({}) failed", index, step.describe()))?;
            tracing::info!("Step {}: {} -> {:?}", index, step.describe(), outcome);
            reports.push(StepReport {
                index,
                description: step.describe(),
                outcome,
                observed: self.collect_observations(),
            });
        }

        Ok(RunReport {
            config: self.tree.config().clone(),
            steps: reports,
            tree: self.render_tree(),
        })
    }

    fn handle(&self, name: &str) -> anyhow::Result<NodeHandle> {
        self.handles
            .get(name)
            .copied()
            .with_context(|| format!("unknown node '{}'", name))
    }

    fn register(&mut self, name: &str, handle: NodeHandle) {
        self.handles.insert(name.to_string(), handle);
        self.names.insert(handle.node, name.to_string());
    }

    fn ensure_new_name(&self, name: &str) -> anyhow::Result<()> {
        if self.handles.contains_key(name) {
            bail!("node name '{}' is already in use", name);
        }
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<Outcome> {
        match step {
            Step::CreateRoot { name } => {
                self.ensure_new_name(name)?;
                match self.tree.create_root_node(name.clone()) {
                    Some(handle) => {
                        self.register(name, handle);
                        Ok(Outcome::Accepted)
                    }
                    None => Ok(Outcome::from(Err::<(), _>(Rejection::RootLimit))),
                }
            }
            Step::AddChild { parent, name } => {
                self.ensure_new_name(name)?;
                let parent = self.handle(parent)?;
                let handle = self.tree.add_child(parent, name.clone())?;
                self.register(name, handle);
                Ok(Outcome::Accepted)
            }
            Step::AddRoot { node } => {
                let node = self.handle(node)?;
                let relationship = self.tree.relationship_of(node, None);
                if self.tree.add_root_node_to_tree(node) {
                    return Ok(Outcome::Accepted);
                }
                let reason = match relationship {
                    Relationship::Unrelated => Rejection::Unrelated.to_string(),
                    Relationship::AlreadyOwned => "node is already a root".to_string(),
                    Relationship::Related => match self.tree.check_reparent(node, None) {
                        Err(reason) => reason.to_string(),
                        Ok(()) => Rejection::RootLimit.to_string(),
                    },
                };
                Ok(Outcome::Rejected { reason })
            }
            Step::Delete { node, recursive } => {
                let node = self.handle(node)?;
                let check = self.tree.check_delete(node, *recursive);
                let deleted = self.tree.delete_node(node, *recursive)?;
                debug_assert_eq!(deleted, check.is_ok());
                Ok(check.into())
            }
            Step::Reparent { node, to } => {
                let node = self.handle(node)?;
                let target = to.as_deref().map(|t| self.handle(t)).transpose()?;
                let check = self.tree.check_reparent(node, target);
                self.tree.request_reparent(node, target)?;
                Ok(check.into())
            }
            Step::AddParent { node, parent } => {
                let node = self.handle(node)?;
                let parent = self.handle(parent)?;
                let check = self.tree.check_add_parent(node, parent);
                self.tree.add_parent(node, parent)?;
                Ok(check.into())
            }
            Step::RemoveParent { node, parent } => {
                let node = self.handle(node)?;
                let parent = self.handle(parent)?;
                let check = self.tree.check_remove_parent(node, parent);
                self.tree.remove_parent(node, parent)?;
                Ok(check.into())
            }
            Step::Watch { label, view, node } => {
                if self.watchers.iter().any(|w| &w.label == label) {
                    bail!("watcher '{}' already exists", label);
                }
                let subscription = match (view, node) {
                    (WatchTarget::Roots, _) => self.tree.connect_root_nodes(),
                    (WatchTarget::All, _) => self.tree.connect_to_nodes(),
                    (WatchTarget::Children, Some(node)) => {
                        let node = self.handle(node)?;
                        self.tree.connect_to_child_nodes(node)?
                    }
                    (WatchTarget::Children, None) => bail!("children watcher needs a node"),
                };
                self.watchers.push(Watcher {
                    label: label.clone(),
                    subscription,
                });
                Ok(Outcome::Accepted)
            }
            Step::Unwatch { label } => {
                let Some(pos) = self.watchers.iter().position(|w| &w.label == label) else {
                    bail!("no watcher named '{}'", label);
                };
                let mut watcher = self.watchers.remove(pos);
                watcher.subscription.dispose();
                Ok(Outcome::Accepted)
            }
        }
    }

    fn name_of(&self, id: NodeId) -> String {
        self.names
            .get(&id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn collect_observations(&mut self) -> Vec<Observed> {
        let names = &self.names;
        let mut observed = Vec::new();
        for watcher in &mut self.watchers {
            let sets = watcher.subscription.drain();
            if sets.is_empty() {
                continue;
            }
            let changes = sets
                .iter()
                .flat_map(|set| set.iter())
                .map(|c| NamedChange {
                    kind: c.kind,
                    node: names
                        .get(&c.node.node)
                        .cloned()
                        .unwrap_or_else(|| c.node.node.to_string()),
                })
                .collect();
            observed.push(Observed {
                watcher: watcher.label.clone(),
                sets: sets.len(),
                changes,
            });
        }
        observed
    }

    fn render_tree(&self) -> Vec<TreeLine> {
        self.tree
            .walk()
            .filter_map(|entry| {
                Some(TreeLine {
                    depth: entry.depth,
                    name: self.name_of(entry.node.node),
                    kind: self.tree.kind_of(entry.node)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
        [config]
        single_root = false

        [[step]]
        op = "create_root"
        name = "R1"

        [[step]]
        op = "create_root"
        name = "R2"

        [[step]]
        op = "create_root"
        name = "R3"

        [[step]]
        op = "add_child"
        parent = "R1"
        name = "C1"

        [[step]]
        op = "add_child"
        parent = "C1"
        name = "G1"

        [[step]]
        op = "watch"
        label = "roots"
        view = "roots"

        [[step]]
        op = "watch"
        label = "all"
        view = "all"

        [[step]]
        op = "delete"
        node = "R2"

        [[step]]
        op = "delete"
        node = "C1"
        recursive = true
    "#;

    #[test]
    fn test_parse_scenario() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        assert_eq!(scenario.steps.len(), 9);
        assert!(matches!(scenario.steps[3], Step::AddChild { .. }));
        assert!(matches!(
            scenario.steps[8],
            Step::Delete {
                recursive: true,
                ..
            }
        ));
    }

    #[test]
    fn test_run_scenario_reports_observations() {
        let scenario = Scenario::from_toml_str(SCENARIO).unwrap();
        let report = ScenarioRunner::new(scenario.config.unwrap())
            .run(&scenario.steps)
            .unwrap();

        assert_eq!(report.rejected_count(), 0);

        let watch_roots = &report.steps[5].observed;
        assert_eq!(watch_roots.len(), 1);
        let names: Vec<&str> = watch_roots[0].changes.iter().map(|c| c.node.as_str()).collect();
        assert_eq!(names, vec!["R1", "R2", "R3"]);

        let delete_r2 = &report.steps[7].observed;
        assert_eq!(delete_r2.len(), 2);
        assert!(delete_r2
            .iter()
            .all(|o| o.changes.len() == 1 && o.changes[0].node == "R2"));

        let delete_c1 = &report.steps[8].observed;
        assert_eq!(delete_c1.len(), 1);
        assert_eq!(delete_c1[0].watcher, "all");
        assert_eq!(delete_c1[0].sets, 1);
        let removed: Vec<&str> = delete_c1[0].changes.iter().map(|c| c.node.as_str()).collect();
        assert_eq!(removed, vec!["C1", "G1"]);

        let tree: Vec<&str> = report.tree.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(tree, vec!["R1", "R3"]);
    }

    #[test]
    fn test_rejections_are_reported() {
        let steps = vec![
            Step::CreateRoot { name: "root".into() },
            Step::CreateRoot { name: "other".into() },
            Step::AddChild {
                parent: "root".into(),
                name: "child".into(),
            },
            Step::Reparent {
                node: "root".into(),
                to: Some("child".into()),
            },
        ];
        let report = ScenarioRunner::new(TreeConfig::new().single_root())
            .run(&steps)
            .unwrap();

        assert_eq!(report.rejected_count(), 2);
        assert_eq!(
            report.steps[1].outcome,
            Outcome::Rejected {
                reason: Rejection::RootLimit.to_string()
            }
        );
        assert_eq!(
            report.steps[3].outcome,
            Outcome::Rejected {
                reason: Rejection::WouldCreateCycle.to_string()
            }
        );
    }

    #[test]
    fn test_add_root_reports_policy_reason() {
        let steps = vec![
            Step::CreateRoot { name: "root".into() },
            Step::AddChild {
                parent: "root".into(),
                name: "leaf".into(),
            },
            Step::AddRoot { node: "leaf".into() },
            Step::AddRoot { node: "root".into() },
        ];
        let config = TreeConfig::new().with_reparentable(NodeKind::Root);
        let report = ScenarioRunner::new(config).run(&steps).unwrap();

        assert_eq!(
            report.steps[2].outcome,
            Outcome::Rejected {
                reason: Rejection::KindNotReparentable(NodeKind::Leaf).to_string()
            }
        );
        assert_eq!(
            report.steps[3].outcome,
            Outcome::Rejected {
                reason: "node is already a root".to_string()
            }
        );
        let kinds: Vec<NodeKind> = report.tree.iter().map(|l| l.kind).collect();
        assert_eq!(kinds, vec![NodeKind::Root, NodeKind::Leaf]);
    }

    #[test]
    fn test_unknown_node_aborts_run() {
        let steps = vec![Step::Delete {
            node: "ghost".into(),
            recursive: false,
        }];
        let err = ScenarioRunner::new(TreeConfig::default())
            .run(&steps)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("unknown node 'ghost'"));
    }

    #[test]
    fn test_deleted_node_is_a_precondition_failure() {
        let steps = vec![
            Step::CreateRoot { name: "a".into() },
            Step::Delete {
                node: "a".into(),
                recursive: false,
            },
            Step::AddChild {
                parent: "a".into(),
                name: "b".into(),
            },
        ];
        let err = ScenarioRunner::new(TreeConfig::default())
            .run(&steps)
            .unwrap_err();
        assert!(format!("{:#}", err).contains("step 3"));
    }

    #[test]
    fn test_unwatch_stops_reporting() {
        let steps = vec![
            Step::Watch {
                label: "all".into(),
                view: WatchTarget::All,
                node: None,
            },
            Step::CreateRoot { name: "a".into() },
            Step::Unwatch { label: "all".into() },
            Step::CreateRoot { name: "b".into() },
        ];
        let report = ScenarioRunner::new(TreeConfig::default())
            .run(&steps)
            .unwrap();

        assert_eq!(report.steps[1].observed.len(), 1);
        assert!(report.steps[3].observed.is_empty());
    }
}
