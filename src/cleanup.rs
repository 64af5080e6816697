//! Cleanup registry
//!
//! Owns the disposal of every listener, observer and custom subscription the
//! engine creates, keyed by the element that owns it. Entries are disposed
//! explicitly (`cleanup_element`, `cleanup_subtree`, `cleanup_all`) or
//! automatically once their owner leaves the document.
//!
//! Automatic cleanup watches node removals under the document root. A
//! removal is not acted on immediately: the decision is deferred by one
//! scheduler turn and then made on `is_connected`, so an element that was
//! removed and re-inserted in the same turn (a move) keeps its listeners.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

use crate::host::{Host, ListenerId, MutationRecord, NodeId, ObserverId, ObserverOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CleanupKind {
    Listener,
    Observer,
    Custom,
}

type Dispose = Box<dyn FnOnce()>;

pub struct CleanupEntry {
    pub kind: CleanupKind,
    pub description: String,
    /// Host listener behind a `Listener` entry
    listener: Option<ListenerId>,
    dispose: Option<Dispose>,
}

impl CleanupEntry {
    /// Run the disposer; later calls do nothing
    fn dispose(&mut self) {
        if let Some(dispose) = self.dispose.take() {
            dispose();
        }
    }
}

impl fmt::Debug for CleanupEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CleanupEntry")
            .field("kind", &self.kind)
            .field("description", &self.description)
            .field("disposed", &self.dispose.is_none())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct CleanupStats {
    pub elements_tracked: usize,
    pub listeners: usize,
    pub observers: usize,
    pub custom: usize,
    /// Entries disposed over the registry's lifetime
    pub total_cleaned: usize,
}

#[derive(Default)]
pub struct CleanupRegistry {
    by_element: RefCell<HashMap<NodeId, Vec<CleanupEntry>>>,
    /// Entries with no owning element (top-level code)
    unowned: RefCell<Vec<CleanupEntry>>,
    cleaned: Cell<usize>,
    auto_observer: Cell<Option<ObserverId>>,
}

impl CleanupRegistry {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /* ===================== Registration ===================== */

    pub fn register(
        &self,
        owner: Option<NodeId>,
        kind: CleanupKind,
        description: impl Into<String>,
        dispose: impl FnOnce() + 'static,
    ) {
        self.push(
            owner,
            CleanupEntry {
                kind,
                description: description.into(),
                listener: None,
                dispose: Some(Box::new(dispose)),
            },
        );
    }

    fn push(&self, owner: Option<NodeId>, entry: CleanupEntry) {
        match owner {
            Some(node) => self
                .by_element
                .borrow_mut()
                .entry(node)
                .or_default()
                .push(entry),
            None => self.unowned.borrow_mut().push(entry),
        }
    }

    pub fn register_listener(
        &self,
        owner: Option<NodeId>,
        host: &Rc<dyn Host>,
        id: ListenerId,
        description: impl Into<String>,
    ) {
        self.register_listener_with(owner, host, id, description, || {});
    }

    /// Register a listener whose disposal also runs `on_dispose`
    pub fn register_listener_with(
        &self,
        owner: Option<NodeId>,
        host: &Rc<dyn Host>,
        id: ListenerId,
        description: impl Into<String>,
        on_dispose: impl FnOnce() + 'static,
    ) {
        let host = Rc::downgrade(host);
        let dispose = move || {
            if let Some(host) = host.upgrade() {
                host.remove_event_listener(id);
            }
            on_dispose();
        };
        self.push(
            owner,
            CleanupEntry {
                kind: CleanupKind::Listener,
                description: description.into(),
                listener: Some(id),
                dispose: Some(Box::new(dispose)),
            },
        );
    }

    pub fn register_observer(
        &self,
        owner: Option<NodeId>,
        host: &Rc<dyn Host>,
        id: ObserverId,
        description: impl Into<String>,
    ) {
        let host = Rc::downgrade(host);
        self.register(owner, CleanupKind::Observer, description, move || {
            if let Some(host) = host.upgrade() {
                host.disconnect(id);
            }
        });
    }

    pub fn register_custom(
        &self,
        owner: Option<NodeId>,
        description: impl Into<String>,
        dispose: impl FnOnce() + 'static,
    ) {
        self.register(owner, CleanupKind::Custom, description, dispose);
    }

    /// Drop the entry of a listener the host already removed (`once`)
    ///
    /// The disposer does not run and the entry does not count as cleaned.
    pub fn forget_listener(&self, owner: Option<NodeId>, id: ListenerId) -> bool {
        let is_entry = |entry: &CleanupEntry| entry.listener == Some(id);
        match owner {
            Some(node) => {
                let mut by_element = self.by_element.borrow_mut();
                let Some(entries) = by_element.get_mut(&node) else {
                    return false;
                };
                let before = entries.len();
                entries.retain(|entry| !is_entry(entry));
                let forgotten = entries.len() < before;
                if entries.is_empty() {
                    by_element.remove(&node);
                }
                forgotten
            }
            None => {
                let mut unowned = self.unowned.borrow_mut();
                let before = unowned.len();
                unowned.retain(|entry| !is_entry(entry));
                unowned.len() < before
            }
        }
    }

    /* ===================== Disposal ===================== */

    fn dispose_all(&self, mut entries: Vec<CleanupEntry>) -> usize {
        for entry in &mut entries {
            debug!(kind = ?entry.kind, description = %entry.description, "Disposing");
            entry.dispose();
        }
        self.cleaned.set(self.cleaned.get() + entries.len());
        entries.len()
    }

    /// Dispose everything owned by `node`; returns how many entries ran
    pub fn cleanup_element(&self, node: NodeId) -> usize {
        let entries = self.by_element.borrow_mut().remove(&node);
        match entries {
            Some(entries) => self.dispose_all(entries),
            None => 0,
        }
    }

    /// Dispose everything owned by `root` or any tracked element below it
    pub fn cleanup_subtree(&self, host: &dyn Host, root: NodeId) -> usize {
        self.tracked()
            .into_iter()
            .filter(|node| is_inclusive_ancestor(host, root, *node))
            .map(|node| self.cleanup_element(node))
            .sum()
    }

    pub fn cleanup_all(&self) -> usize {
        let elements: Vec<Vec<CleanupEntry>> = self
            .by_element
            .borrow_mut()
            .drain()
            .map(|(_, entries)| entries)
            .collect();
        let unowned = std::mem::take(&mut *self.unowned.borrow_mut());

        let mut count = self.dispose_all(unowned);
        for entries in elements {
            count += self.dispose_all(entries);
        }
        count
    }

    /// Elements that currently own at least one entry
    pub fn tracked(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.by_element.borrow().keys().copied().collect();
        nodes.sort();
        nodes
    }

    pub fn entry_count(&self, node: NodeId) -> usize {
        self.by_element.borrow().get(&node).map_or(0, Vec::len)
    }

    pub fn stats(&self) -> CleanupStats {
        let mut stats = CleanupStats {
            total_cleaned: self.cleaned.get(),
            ..CleanupStats::default()
        };
        let by_element = self.by_element.borrow();
        let unowned = self.unowned.borrow();
        stats.elements_tracked = by_element.len();
        for entry in by_element.values().flatten().chain(unowned.iter()) {
            match entry.kind {
                CleanupKind::Listener => stats.listeners += 1,
                CleanupKind::Observer => stats.observers += 1,
                CleanupKind::Custom => stats.custom += 1,
            }
        }
        stats
    }

    /* ===================== Automatic Cleanup ===================== */

    /// Watch the host for removed elements and reclaim their entries
    ///
    /// Without a live document root this does nothing. Needs a
    /// `tokio::task::LocalSet` to defer reclamation.
    pub fn enable_auto_cleanup(self: &Rc<Self>, host: &Rc<dyn Host>) {
        if self.auto_observer.get().is_some() {
            return;
        }
        let Some(root) = host.root() else {
            debug!("No document root, automatic cleanup disabled");
            return;
        };

        let registry = Rc::downgrade(self);
        let weak_host = Rc::downgrade(host);
        let callback = Rc::new(move |records: Vec<MutationRecord>| {
            let removed: Vec<NodeId> = records
                .iter()
                .flat_map(|r| r.removed.iter().copied())
                .collect();
            if removed.is_empty() {
                return;
            }
            let registry = registry.clone();
            let host = weak_host.clone();
            tokio::task::spawn_local(async move {
                // A move re-inserts the node before this task resumes
                tokio::task::yield_now().await;
                if let (Some(registry), Some(host)) = (registry.upgrade(), host.upgrade()) {
                    registry.reclaim_removed(host.as_ref(), &removed);
                }
            });
        });

        let id = host.observe(root, ObserverOptions::removals(), callback);
        self.auto_observer.set(Some(id));
        debug!(observer = id.0, "Automatic cleanup enabled");
    }

    pub fn disable_auto_cleanup(&self, host: &dyn Host) {
        if let Some(id) = self.auto_observer.take() {
            host.disconnect(id);
        }
    }

    /// Dispose entries of tracked elements in the removed subtrees that are
    /// still disconnected
    fn reclaim_removed(&self, host: &dyn Host, removed: &[NodeId]) -> usize {
        let mut count = 0;
        for node in self.tracked() {
            let in_removed = removed
                .iter()
                .any(|root| is_inclusive_ancestor(host, *root, node));
            if in_removed && !host.is_connected(node) {
                let n = self.cleanup_element(node);
                debug!(element = node.0, entries = n, "Reclaimed removed element");
                count += n;
            }
        }
        count
    }
}

fn is_inclusive_ancestor(host: &dyn Host, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = host.parent(id);
    }
    false
}
