//! Materialized mirror of an observed view

use crate::change::{ChangeKind, ChangeSet, Subscription, ViewKind};
use crate::node::NodeHandle;

/// Collection kept current by applying the change sets of a
/// [`Subscription`], the way a bound UI list mirrors a view.
///
/// Members keep the order in which they were added.
#[derive(Debug)]
pub struct LiveView {
    subscription: Subscription,
    members: Vec<NodeHandle>,
}

impl LiveView {
    pub fn new(subscription: Subscription) -> Self {
        Self {
            subscription,
            members: Vec::new(),
        }
    }

    pub fn view(&self) -> ViewKind {
        self.subscription.view()
    }

    /// Apply every pending change set; returns the number of changes
    /// applied
    pub fn sync(&mut self) -> usize {
        let mut applied = 0;
        while let Some(set) = self.subscription.try_next() {
            applied += self.apply(&set);
        }
        applied
    }

    /// Wait for the next change set and apply it together with anything
    /// else already pending; `None` once the view is closed
    pub async fn changed(&mut self) -> Option<usize> {
        let set = self.subscription.next_change_set().await?;
        let applied = self.apply(&set);
        Some(applied + self.sync())
    }

    fn apply(&mut self, set: &ChangeSet) -> usize {
        for change in set {
            match change.kind {
                ChangeKind::Added => {
                    if !self.members.contains(&change.node) {
                        self.members.push(change.node);
                    }
                }
                ChangeKind::Removed => self.members.retain(|m| *m != change.node),
            }
        }
        set.len()
    }

    pub fn members(&self) -> &[NodeHandle] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: NodeHandle) -> bool {
        self.members.contains(&node)
    }

    /// Stop following the view; current members are kept
    pub fn dispose(&mut self) {
        self.subscription.dispose();
    }
}
