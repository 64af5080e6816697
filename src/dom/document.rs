//! In-memory host document
//!
//! An arena of element nodes keyed by [`NodeId`]. The document owns every
//! listener and observer registered on it; the engine only ever holds the
//! ids it got back.
//!
//! Mutation records are queued while the tree changes and delivered from a
//! local task, so a remove followed by a re-insert in the same synchronous
//! stretch reaches observers as one batch, after both changes happened.
//! This needs a `tokio::task::LocalSet` whenever observers are attached.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use tracing::debug;

use super::selector::{ElementTree, Selector};
use crate::errors::SelectorError;
use crate::host::{
    EventTarget, Host, Listener, ListenerId, ListenerOptions, MutationCallback, MutationKind,
    MutationRecord, NodeId, ObserverId, ObserverOptions,
};
use crate::types::{Event, LocalBoxFuture};

/* ===================== Node Storage ===================== */

#[derive(Debug, Clone, Default)]
struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    styles: BTreeMap<String, String>,
    text: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

struct ListenerEntry {
    id: ListenerId,
    target: EventTarget,
    event_type: String,
    listener: Listener,
    once: bool,
}

struct ObserverEntry {
    id: ObserverId,
    node: NodeId,
    options: ObserverOptions,
    callback: MutationCallback,
}

struct Tree {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == self.root {
                return true;
            }
            current = self.node(node_id).and_then(|n| n.parent);
        }
        false
    }

    fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = self.node(node).and_then(|n| n.parent);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.node(id).and_then(|n| n.parent);
        }
        false
    }

    /// Pre-order walk starting at `from`
    fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev());
            }
        }
        out
    }

    fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.node(id) else {
            return String::new();
        };
        let mut text = node.text.clone();
        for child in &node.children {
            text.push_str(&self.text_content(*child));
        }
        text
    }
}

impl ElementTree for Tree {
    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.node(node).map(|n| n.tag.clone())
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.node(node).and_then(|n| n.attributes.get(name).cloned())
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).and_then(|n| n.parent)
    }
}

/* ===================== Serialized Form ===================== */

/// JSON shape of a document subtree
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub tag: String,
    /// Node id, filled in on export
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

/* ===================== Document ===================== */

pub struct Document {
    self_ref: Weak<Document>,
    tree: RefCell<Tree>,
    listeners: RefCell<Vec<ListenerEntry>>,
    observers: RefCell<Vec<ObserverEntry>>,
    pending: RefCell<Vec<(ObserverId, MutationRecord)>>,
    flush_scheduled: Cell<bool>,
    next_id: Cell<u64>,
}

impl Document {
    /// Empty document: `<html><body></body></html>`
    pub fn new() -> Rc<Self> {
        let doc = Rc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            tree: RefCell::new(Tree {
                nodes: HashMap::new(),
                root: NodeId(0),
            }),
            listeners: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
            flush_scheduled: Cell::new(false),
            next_id: Cell::new(0),
        });

        let root = doc.allocate("html");
        doc.tree.borrow_mut().root = root;
        let body = doc.allocate("body");
        doc.attach(root, body, None);
        doc
    }

    /// Build a document from its JSON shape
    ///
    /// An `html` spec becomes the whole tree; anything else is appended to
    /// the body of an empty document.
    pub fn from_spec(spec: &NodeSpec) -> Rc<Self> {
        let doc = Self::new();
        if spec.tag.eq_ignore_ascii_case("html") {
            let root = doc.root_id();
            let existing: Vec<NodeId> = doc.children(root);
            for child in existing {
                doc.detach(child);
            }
            doc.fill(root, spec);
        } else {
            let node = doc.build(spec);
            doc.append_child(doc.body(), node);
        }
        doc
    }

    pub fn to_spec(&self) -> NodeSpec {
        self.export(self.root_id())
    }

    fn export(&self, id: NodeId) -> NodeSpec {
        let (tag, attributes, styles, text, children) = {
            let tree = self.tree.borrow();
            let Some(node) = tree.node(id) else {
                return NodeSpec::default();
            };
            (
                node.tag.clone(),
                node.attributes.clone(),
                node.styles.clone(),
                node.text.clone(),
                node.children.clone(),
            )
        };
        NodeSpec {
            tag,
            node: Some(id.0),
            attributes,
            styles,
            text,
            children: children.into_iter().map(|c| self.export(c)).collect(),
        }
    }

    fn build(&self, spec: &NodeSpec) -> NodeId {
        let id = self.allocate(&spec.tag);
        self.fill(id, spec);
        id
    }

    fn fill(&self, id: NodeId, spec: &NodeSpec) {
        if let Some(node) = self.tree.borrow_mut().nodes.get_mut(&id) {
            node.attributes = spec.attributes.clone();
            node.styles = spec.styles.clone();
            node.text = spec.text.clone();
        }
        for child in &spec.children {
            let child_id = self.build(child);
            self.attach(id, child_id, None);
        }
    }

    fn allocate(&self, tag: &str) -> NodeId {
        let id = NodeId(self.next());
        self.tree.borrow_mut().nodes.insert(
            id,
            Node {
                tag: tag.to_ascii_lowercase(),
                ..Node::default()
            },
        );
        id
    }

    fn next(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.borrow().root
    }

    /// The `body` element (falls back to the root)
    pub fn body(&self) -> NodeId {
        let tree = self.tree.borrow();
        tree.node(tree.root)
            .and_then(|root| {
                root.children
                    .iter()
                    .copied()
                    .find(|c| tree.node(*c).is_some_and(|n| n.tag == "body"))
            })
            .unwrap_or(tree.root)
    }

    /* ---------- Structure ---------- */

    /// Create a detached element
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.allocate(tag)
    }

    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        self.insert_before(parent, child, None);
    }

    /// Insert `child` under `parent` before `reference` (or at the end)
    ///
    /// A child that already has a parent is moved: it is removed first,
    /// producing a removal record followed by an addition record.
    pub fn insert_before(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if self.tree.borrow().node(child).and_then(|n| n.parent).is_some() {
            self.remove(child);
        }
        self.attach(parent, child, reference);
        self.record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            attribute_name: None,
            old_value: None,
            added: vec![child],
            removed: vec![],
        });
    }

    /// Detach a node from its parent; the subtree stays intact
    pub fn remove(&self, node: NodeId) {
        let Some(parent) = self.tree.borrow().node(node).and_then(|n| n.parent) else {
            return;
        };
        self.record(MutationRecord {
            kind: MutationKind::ChildList,
            target: parent,
            attribute_name: None,
            old_value: None,
            added: vec![],
            removed: vec![node],
        });
        self.detach(node);
    }

    fn attach(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        let mut tree = self.tree.borrow_mut();
        if let Some(node) = tree.nodes.get_mut(&child) {
            node.parent = Some(parent);
        }
        if let Some(node) = tree.nodes.get_mut(&parent) {
            let at = reference
                .and_then(|r| node.children.iter().position(|c| *c == r))
                .unwrap_or(node.children.len());
            node.children.insert(at, child);
        }
    }

    fn detach(&self, node: NodeId) {
        let mut tree = self.tree.borrow_mut();
        let parent = tree.nodes.get_mut(&node).and_then(|n| n.parent.take());
        if let Some(parent) = parent.and_then(|p| tree.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.tree
            .borrow()
            .node(node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.borrow().tag_name(node)
    }

    /// First element carrying `id="..."`
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let tree = self.tree.borrow();
        let found = tree
            .descendants(tree.root)
            .into_iter()
            .find(|n| tree.attribute(*n, "id").as_deref() == Some(id));
        found
    }

    /* ---------- Content ---------- */

    pub fn set_text(&self, node: NodeId, text: &str) {
        let old = {
            let mut tree = self.tree.borrow_mut();
            let Some(n) = tree.nodes.get_mut(&node) else {
                return;
            };
            std::mem::replace(&mut n.text, text.to_string())
        };
        self.record(MutationRecord {
            kind: MutationKind::CharacterData,
            target: node,
            attribute_name: None,
            old_value: Some(old),
            added: vec![],
            removed: vec![],
        });
    }

    pub fn text_content(&self, node: NodeId) -> String {
        self.tree.borrow().text_content(node)
    }

    pub fn style(&self, node: NodeId, property: &str) -> Option<String> {
        self.tree
            .borrow()
            .node(node)
            .and_then(|n| n.styles.get(property).cloned())
    }

    /// Toggle a class, returning whether it is now present
    pub fn toggle_class(&self, node: NodeId, class: &str) -> bool {
        if self.has_class(node, class) {
            self.remove_class(node, class);
            false
        } else {
            self.add_class(node, class);
            true
        }
    }

    fn classes(&self, node: NodeId) -> Vec<String> {
        self.get_attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /* ---------- Listener and observer bookkeeping ---------- */

    /// Listeners currently attached to `target`
    pub fn listener_count(&self, target: EventTarget) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|l| l.target == target)
            .count()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.borrow().len()
    }

    fn listener_alive(&self, id: ListenerId) -> bool {
        self.listeners.borrow().iter().any(|l| l.id == id)
    }

    /// Target, then ancestors, then document, then window
    fn propagation_path(&self, target: EventTarget, bubbles: bool) -> Vec<EventTarget> {
        let mut path = vec![target];
        if !bubbles {
            return path;
        }
        match target {
            EventTarget::Node(id) => {
                let tree = self.tree.borrow();
                let mut current = tree.node(id).and_then(|n| n.parent);
                while let Some(parent) = current {
                    path.push(EventTarget::Node(parent));
                    current = tree.node(parent).and_then(|n| n.parent);
                }
                if tree.is_connected(id) {
                    path.push(EventTarget::Document);
                    path.push(EventTarget::Window);
                }
            }
            EventTarget::Document => path.push(EventTarget::Window),
            EventTarget::Window => {}
        }
        path
    }

    /* ---------- Mutation delivery ---------- */

    fn record(&self, record: MutationRecord) {
        let interested: Vec<ObserverId> = {
            let tree = self.tree.borrow();
            self.observers
                .borrow()
                .iter()
                .filter(|o| {
                    let in_scope = o.node == record.target
                        || (o.options.subtree && tree.is_ancestor(o.node, record.target));
                    in_scope && wants(&o.options, &record)
                })
                .map(|o| o.id)
                .collect()
        };
        if interested.is_empty() {
            return;
        }

        {
            let mut pending = self.pending.borrow_mut();
            let observers = self.observers.borrow();
            for id in interested {
                let mut rec = record.clone();
                let keep_old = observers.iter().find(|o| o.id == id).is_some_and(|o| {
                    rec.kind != MutationKind::Attributes || o.options.attribute_old_value
                });
                if !keep_old {
                    rec.old_value = None;
                }
                pending.push((id, rec));
            }
        }
        self.schedule_flush();
    }

    fn schedule_flush(&self) {
        if self.flush_scheduled.replace(true) {
            return;
        }
        let weak = self.self_ref.clone();
        tokio::task::spawn_local(async move {
            if let Some(doc) = weak.upgrade() {
                doc.flush_mutations();
            }
        });
    }

    /// Deliver queued mutation records now
    pub fn flush_mutations(&self) {
        self.flush_scheduled.set(false);
        let pending = std::mem::take(&mut *self.pending.borrow_mut());
        if pending.is_empty() {
            return;
        }

        let mut batches: Vec<(ObserverId, Vec<MutationRecord>)> = Vec::new();
        for (id, record) in pending {
            match batches.iter_mut().find(|(b, _)| *b == id) {
                Some((_, records)) => records.push(record),
                None => batches.push((id, vec![record])),
            }
        }

        for (id, records) in batches {
            let callback = self
                .observers
                .borrow()
                .iter()
                .find(|o| o.id == id)
                .map(|o| Rc::clone(&o.callback));
            if let Some(callback) = callback {
                debug!(observer = id.0, records = records.len(), "Delivering mutations");
                callback(records);
            }
        }
    }
}

fn wants(options: &ObserverOptions, record: &MutationRecord) -> bool {
    match record.kind {
        MutationKind::ChildList => options.child_list,
        MutationKind::CharacterData => options.character_data,
        MutationKind::Attributes => {
            options.attributes
                && match (&options.attribute_filter, &record.attribute_name) {
                    (Some(filter), Some(name)) => filter.iter().any(|f| f == name),
                    _ => true,
                }
        }
    }
}

/* ===================== Host Implementation ===================== */

impl Host for Document {
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        let selector = Selector::parse(selector)?;
        let tree = self.tree.borrow();
        let matched = tree
            .descendants(tree.root)
            .into_iter()
            .filter(|id| selector.matches(*id, &*tree))
            .collect();
        Ok(matched)
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError> {
        let selector = Selector::parse(selector)?;
        Ok(selector.matches(node, &*self.tree.borrow()))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.borrow().node(node).and_then(|n| n.parent)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.tree.borrow().is_connected(node)
    }

    fn root(&self) -> Option<NodeId> {
        Some(self.root_id())
    }

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree.borrow().attribute(node, name)
    }

    fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let old = {
            let mut tree = self.tree.borrow_mut();
            let Some(n) = tree.nodes.get_mut(&node) else {
                return;
            };
            n.attributes.insert(name.to_string(), value.to_string())
        };
        self.record(MutationRecord {
            kind: MutationKind::Attributes,
            target: node,
            attribute_name: Some(name.to_string()),
            old_value: old,
            added: vec![],
            removed: vec![],
        });
    }

    fn remove_attribute(&self, node: NodeId, name: &str) {
        let old = {
            let mut tree = self.tree.borrow_mut();
            tree.nodes
                .get_mut(&node)
                .and_then(|n| n.attributes.remove(name))
        };
        if old.is_some() {
            self.record(MutationRecord {
                kind: MutationKind::Attributes,
                target: node,
                attribute_name: Some(name.to_string()),
                old_value: old,
                added: vec![],
                removed: vec![],
            });
        }
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.classes(node).iter().any(|c| c == class)
    }

    fn add_class(&self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if classes.iter().any(|c| c == class) {
            return;
        }
        classes.push(class.to_string());
        self.set_attribute(node, "class", &classes.join(" "));
    }

    fn remove_class(&self, node: NodeId, class: &str) {
        let classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            return;
        }
        let kept: Vec<String> = classes.into_iter().filter(|c| c != class).collect();
        self.set_attribute(node, "class", &kept.join(" "));
    }

    fn set_style(&self, node: NodeId, property: &str, value: &str) {
        if let Some(n) = self.tree.borrow_mut().nodes.get_mut(&node) {
            n.styles.insert(property.to_string(), value.to_string());
        }
    }

    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        options: ListenerOptions,
    ) -> ListenerId {
        let id = ListenerId(self.next());
        self.listeners.borrow_mut().push(ListenerEntry {
            id,
            target,
            event_type: event_type.to_string(),
            listener,
            once: options.once,
        });
        id
    }

    fn remove_event_listener(&self, id: ListenerId) {
        self.listeners.borrow_mut().retain(|l| l.id != id);
    }

    fn dispatch_event(&self, target: EventTarget, event: Arc<Event>) -> LocalBoxFuture<'_, ()> {
        Box::pin(async move {
            event.set_target(target);
            event.reset_propagation();

            for current in self.propagation_path(target, event.bubbles()) {
                event.set_current_target(Some(current));

                // Snapshot; listeners added during dispatch wait for the next event
                let snapshot: Vec<(ListenerId, Listener, bool)> = self
                    .listeners
                    .borrow()
                    .iter()
                    .filter(|l| l.target == current && l.event_type == event.event_type())
                    .map(|l| (l.id, Rc::clone(&l.listener), l.once))
                    .collect();

                for (id, listener, once) in snapshot {
                    if !self.listener_alive(id) {
                        continue;
                    }
                    if once {
                        self.remove_event_listener(id);
                    }
                    listener(Arc::clone(&event)).await;
                }

                if event.propagation_stopped() {
                    break;
                }
            }

            event.set_current_target(None);
        })
    }

    fn observe(
        &self,
        node: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> ObserverId {
        let id = ObserverId(self.next());
        self.observers.borrow_mut().push(ObserverEntry {
            id,
            node,
            options,
            callback,
        });
        id
    }

    fn disconnect(&self, id: ObserverId) {
        self.observers.borrow_mut().retain(|o| o.id != id);
        self.pending.borrow_mut().retain(|(o, _)| *o != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tokio::task::LocalSet;

    fn sync_listener(f: impl Fn(Arc<Event>) + 'static) -> Listener {
        Rc::new(move |event: Arc<Event>| -> LocalBoxFuture<'static, ()> {
            f(event);
            Box::pin(async {})
        })
    }

    fn sample() -> (Rc<Document>, NodeId, NodeId) {
        let doc = Document::new();
        let list = doc.create_element("ul");
        doc.set_attribute(list, "id", "items");
        let item = doc.create_element("li");
        doc.add_class(item, "entry");
        doc.append_child(doc.body(), list);
        doc.append_child(list, item);
        (doc, list, item)
    }

    #[test]
    fn test_query_in_document_order() {
        let (doc, list, item) = sample();
        assert_eq!(doc.query_selector_all("#items").unwrap(), vec![list]);
        assert_eq!(doc.query_selector_all("ul > li.entry").unwrap(), vec![item]);
        assert_eq!(
            doc.query_selector_all("body *").unwrap(),
            vec![list, item]
        );
        assert!(doc.query_selector_all("invalid[[[").is_err());
    }

    #[test]
    fn test_connectivity_follows_removal() {
        let (doc, list, item) = sample();
        assert!(doc.is_connected(item));
        doc.remove(list);
        assert!(!doc.is_connected(item));
        assert_eq!(doc.parent(item), Some(list));
        doc.append_child(doc.body(), list);
        assert!(doc.is_connected(item));
    }

    #[test]
    fn test_class_helpers() {
        let (doc, _, item) = sample();
        assert!(doc.has_class(item, "entry"));
        assert!(doc.toggle_class(item, "active"));
        assert_eq!(doc.get_attribute(item, "class").as_deref(), Some("entry active"));
        assert!(!doc.toggle_class(item, "active"));
        assert!(!doc.has_class(item, "active"));
    }

    #[test]
    fn test_spec_import_export() {
        let json = r#"{
            "tag": "div",
            "attributes": { "id": "app" },
            "children": [{ "tag": "button", "text": "Go" }]
        }"#;
        let spec: NodeSpec = serde_json::from_str(json).unwrap();
        let doc = Document::from_spec(&spec);
        let app = doc.element_by_id("app").unwrap();
        assert_eq!(doc.text_content(app), "Go");

        let exported = doc.to_spec();
        assert_eq!(exported.tag, "html");
        assert_eq!(exported.children[0].tag, "body");
        assert_eq!(exported.children[0].children[0].attributes["id"], "app");
    }

    #[tokio::test]
    async fn test_dispatch_bubbles_and_stops() {
        let (doc, list, item) = sample();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for (target, label) in [
            (EventTarget::Node(item), "item"),
            (EventTarget::Node(list), "list"),
            (EventTarget::Document, "document"),
        ] {
            let seen = Rc::clone(&seen);
            let listener = sync_listener(move |_| seen.borrow_mut().push(label));
            doc.add_event_listener(target, "click", listener, ListenerOptions::default());
        }

        doc.dispatch_event(EventTarget::Node(item), Arc::new(Event::new("click")))
            .await;
        assert_eq!(*seen.borrow(), vec!["item", "list", "document"]);

        seen.borrow_mut().clear();
        let stopper = sync_listener(|event| event.stop_propagation());
        doc.add_event_listener(
            EventTarget::Node(item),
            "click",
            stopper,
            ListenerOptions::default(),
        );
        doc.dispatch_event(EventTarget::Node(item), Arc::new(Event::new("click")))
            .await;
        assert_eq!(*seen.borrow(), vec!["item"]);
    }

    #[tokio::test]
    async fn test_once_listener_fires_once() {
        let (doc, _, item) = sample();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let listener = sync_listener(move |_| counter.set(counter.get() + 1));
        doc.add_event_listener(
            EventTarget::Node(item),
            "ping",
            listener,
            ListenerOptions { once: true },
        );

        for _ in 0..3 {
            doc.dispatch_event(EventTarget::Node(item), Arc::new(Event::new("ping")))
                .await;
        }
        assert_eq!(count.get(), 1);
        assert_eq!(doc.listener_count(EventTarget::Node(item)), 0);
    }

    #[tokio::test]
    async fn test_mutations_are_delivered_in_one_deferred_batch() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (doc, list, item) = sample();
                let batches = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&batches);
                doc.observe(
                    doc.root_id(),
                    ObserverOptions::removals(),
                    Rc::new(move |records: Vec<MutationRecord>| sink.borrow_mut().push(records)),
                );

                doc.remove(item);
                doc.append_child(list, item);
                assert!(batches.borrow().is_empty());

                tokio::task::yield_now().await;
                let batches = batches.borrow();
                assert_eq!(batches.len(), 1);
                assert_eq!(batches[0].len(), 2);
                assert_eq!(batches[0][0].removed, vec![item]);
                assert_eq!(batches[0][1].added, vec![item]);
            })
            .await;
    }

    #[tokio::test]
    async fn test_attribute_filter_and_old_value() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let (doc, _, item) = sample();
                doc.set_attribute(item, "data-state", "idle");

                let records = Rc::new(RefCell::new(Vec::new()));
                let sink = Rc::clone(&records);
                doc.observe(
                    item,
                    ObserverOptions::attribute("data-state"),
                    Rc::new(move |batch: Vec<MutationRecord>| sink.borrow_mut().extend(batch)),
                );

                doc.set_attribute(item, "title", "ignored");
                doc.set_attribute(item, "data-state", "busy");
                tokio::task::yield_now().await;

                let records = records.borrow();
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].old_value.as_deref(), Some("idle"));
            })
            .await;
    }
}
