//! Change sets and per-view change feeds
//!
//! Each node collection view (all nodes, root nodes, children of one node)
//! owns a [`ChangeFeed`]. Connecting to a view creates a [`Subscription`]
//! whose first change set is the view's current contents; after that every
//! mutation touching the view pushes exactly one change set to every
//! connected subscriber, synchronously and in mutation order.

use crate::node::{NodeHandle, NodeId};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// A node collection that can be observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    AllNodes,
    RootNodes,
    ChildNodes(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
}

/// One membership transition of one node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    pub node: NodeHandle,
}

impl Change {
    pub fn added(node: NodeHandle) -> Self {
        Self {
            kind: ChangeKind::Added,
            node,
        }
    }

    pub fn removed(node: NodeHandle) -> Self {
        Self {
            kind: ChangeKind::Removed,
            node,
        }
    }
}

/// Ordered batch of changes produced by a single mutation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    /// Initial batch announcing every current member as added
    pub fn initial(members: impl IntoIterator<Item = NodeHandle>) -> Self {
        Self::new(members.into_iter().map(Change::added).collect())
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn added(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Added)
            .map(|c| c.node)
    }

    pub fn removed(&self) -> impl Iterator<Item = NodeHandle> + '_ {
        self.changes
            .iter()
            .filter(|c| c.kind == ChangeKind::Removed)
            .map(|c| c.node)
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Fan-out of change sets to the subscribers of one view
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: Vec<UnboundedSender<ChangeSet>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect a new subscriber; `initial` is delivered first
    pub fn subscribe(&mut self, view: ViewKind, initial: ChangeSet) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        // The receiver is alive, so the send cannot fail.
        let _ = tx.send(initial);
        self.subscribers.push(tx);
        Subscription::new(view, rx)
    }

    /// Push a change set to every connected subscriber, dropping the
    /// ones that have disconnected
    pub fn publish(&mut self, set: &ChangeSet) {
        if set.is_empty() {
            return;
        }
        self.subscribers.retain(|tx| tx.send(set.clone()).is_ok());
    }

    /// Number of subscribers still connected
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.iter().filter(|tx| !tx.is_closed()).count()
    }
}

/// Receiving end of a view connection.
///
/// Dropping the subscription disconnects it; [`Subscription::dispose`]
/// does the same explicitly and may be called any number of times.
#[derive(Debug)]
pub struct Subscription {
    view: ViewKind,
    rx: UnboundedReceiver<ChangeSet>,
    disposed: bool,
}

impl Subscription {
    fn new(view: ViewKind, rx: UnboundedReceiver<ChangeSet>) -> Self {
        Self {
            view,
            rx,
            disposed: false,
        }
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    /// Next pending change set, without waiting
    pub fn try_next(&mut self) -> Option<ChangeSet> {
        if self.disposed {
            return None;
        }
        self.rx.try_recv().ok()
    }

    /// Every pending change set, without waiting
    pub fn drain(&mut self) -> Vec<ChangeSet> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// Wait for the next change set; `None` once the view is closed or
    /// the subscription disposed
    pub async fn next_change_set(&mut self) -> Option<ChangeSet> {
        if self.disposed {
            return None;
        }
        self.rx.recv().await
    }

    /// Disconnect from the view and discard anything still buffered
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        tracing::trace!("Disposed subscription to {:?}", self.view);
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Stream for Subscription {
    type Item = ChangeSet;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.disposed {
            return Poll::Ready(None);
        }
        self.rx.poll_recv(cx)
    }
}

/// Feeds for every observable view of one tree
#[derive(Debug, Default)]
pub(crate) struct Feeds {
    all: ChangeFeed,
    roots: ChangeFeed,
    children: HashMap<NodeId, ChangeFeed>,
}

impl Feeds {
    pub(crate) fn subscribe(&mut self, view: ViewKind, initial: ChangeSet) -> Subscription {
        match view {
            ViewKind::AllNodes => self.all.subscribe(view, initial),
            ViewKind::RootNodes => self.roots.subscribe(view, initial),
            ViewKind::ChildNodes(id) => self.children.entry(id).or_default().subscribe(view, initial),
        }
    }

    pub(crate) fn subscriber_count(&self, view: ViewKind) -> usize {
        match view {
            ViewKind::AllNodes => self.all.subscriber_count(),
            ViewKind::RootNodes => self.roots.subscriber_count(),
            ViewKind::ChildNodes(id) => self
                .children
                .get(&id)
                .map_or(0, ChangeFeed::subscriber_count),
        }
    }

    /// Deliver accumulated changes, then close the child views of
    /// deleted nodes
    pub(crate) fn publish(&mut self, pending: PendingChanges) {
        if pending.is_empty() {
            return;
        }
        for (view, changes) in pending.views {
            let set = ChangeSet::new(changes);
            tracing::trace!("Publishing {} change(s) to {:?}", set.len(), view);
            match view {
                ViewKind::AllNodes => self.all.publish(&set),
                ViewKind::RootNodes => self.roots.publish(&set),
                ViewKind::ChildNodes(id) => {
                    if let Some(feed) = self.children.get_mut(&id) {
                        feed.publish(&set);
                    }
                }
            }
        }
        for id in pending.closed {
            self.children.remove(&id);
        }
        self.children.retain(|_, feed| feed.subscriber_count() > 0);
    }
}

/// Changes collected while a mutation is applied, grouped per view in
/// first-touched order
#[derive(Debug, Default)]
pub(crate) struct PendingChanges {
    views: Vec<(ViewKind, Vec<Change>)>,
    closed: Vec<NodeId>,
}

impl PendingChanges {
    pub(crate) fn push(&mut self, view: ViewKind, change: Change) {
        match self.views.iter_mut().find(|(v, _)| *v == view) {
            Some((_, changes)) => changes.push(change),
            None => self.views.push((view, vec![change])),
        }
    }

    pub(crate) fn added(&mut self, view: ViewKind, node: NodeHandle) {
        self.push(view, Change::added(node));
    }

    pub(crate) fn removed(&mut self, view: ViewKind, node: NodeHandle) {
        self.push(view, Change::removed(node));
    }

    /// Mark the child view of a deleted node for closing
    pub(crate) fn close_children_of(&mut self, id: NodeId) {
        self.closed.push(id);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.views.is_empty() && self.closed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::TreeId;
    use futures::StreamExt;

    fn handle() -> NodeHandle {
        NodeHandle {
            tree: TreeId::new(),
            node: NodeId::new(),
        }
    }

    #[test]
    fn test_initial_batch_comes_first() {
        let mut feed = ChangeFeed::new();
        let a = handle();
        let mut sub = feed.subscribe(ViewKind::AllNodes, ChangeSet::initial([a]));

        let b = handle();
        feed.publish(&ChangeSet::new(vec![Change::added(b)]));

        let initial = sub.try_next().unwrap();
        assert_eq!(initial.added().collect::<Vec<_>>(), vec![a]);
        let next = sub.try_next().unwrap();
        assert_eq!(next.added().collect::<Vec<_>>(), vec![b]);
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_empty_sets_are_not_published() {
        let mut feed = ChangeFeed::new();
        let mut sub = feed.subscribe(ViewKind::RootNodes, ChangeSet::default());
        assert!(sub.try_next().unwrap().is_empty());

        feed.publish(&ChangeSet::default());
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_dispose_is_idempotent_and_discards_buffer() {
        let mut feed = ChangeFeed::new();
        let mut first = feed.subscribe(ViewKind::AllNodes, ChangeSet::default());
        let mut second = feed.subscribe(ViewKind::AllNodes, ChangeSet::default());

        feed.publish(&ChangeSet::new(vec![Change::added(handle())]));
        first.dispose();
        first.dispose();
        assert!(first.is_disposed());
        assert!(first.try_next().is_none());

        feed.publish(&ChangeSet::new(vec![Change::added(handle())]));
        assert!(first.try_next().is_none());
        assert_eq!(second.drain().len(), 3);
        assert_eq!(feed.subscriber_count(), 1);
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let mut feed = ChangeFeed::new();
        let sub = feed.subscribe(ViewKind::AllNodes, ChangeSet::default());
        drop(sub);

        feed.publish(&ChangeSet::new(vec![Change::added(handle())]));
        assert_eq!(feed.subscriber_count(), 0);
        assert!(feed.subscribers.is_empty());
    }

    #[test]
    fn test_pending_changes_group_by_view() {
        let mut pending = PendingChanges::default();
        let (a, b) = (handle(), handle());
        pending.added(ViewKind::AllNodes, a);
        pending.added(ViewKind::RootNodes, a);
        pending.removed(ViewKind::AllNodes, b);

        assert_eq!(pending.views.len(), 2);
        assert_eq!(pending.views[0].0, ViewKind::AllNodes);
        assert_eq!(pending.views[0].1, vec![Change::added(a), Change::removed(b)]);
    }

    #[tokio::test]
    async fn test_subscription_is_a_stream() {
        let mut feed = ChangeFeed::new();
        let mut sub = feed.subscribe(ViewKind::AllNodes, ChangeSet::default());
        let a = handle();
        feed.publish(&ChangeSet::new(vec![Change::added(a)]));
        drop(feed);

        let sets: Vec<ChangeSet> = (&mut sub).collect().await;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].changes, vec![Change::added(a)]);
        assert!(sub.next_change_set().await.is_none());
    }
}
