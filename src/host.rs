//! Host document interface
//!
//! The engine never implements a document itself. Everything it needs from
//! one (querying, listeners, mutation observers, connectivity, attribute and
//! class mutation) goes through the [`Host`] trait. The crate ships two
//! implementations: [`crate::dom::Document`], an in-memory tree, and
//! [`NullHost`], which stands in when there is no live document at all.

use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::sync::Arc;

use crate::errors::SelectorError;
use crate::types::{Event, LocalBoxFuture};

/// Opaque identity of a host node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Something a listener can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTarget {
    Window,
    Document,
    Node(NodeId),
}

impl EventTarget {
    pub fn node(&self) -> Option<NodeId> {
        match self {
            EventTarget::Node(id) => Some(*id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(pub u64);

/// Listener callback
///
/// Dispatch awaits the returned future before moving on to the next
/// listener, so an event dispatched from inside a handler is handled
/// re-entrantly, the same way a synchronous `dispatchEvent` behaves.
pub type Listener = Rc<dyn Fn(Arc<Event>) -> LocalBoxFuture<'static, ()>>;

/// Mutation observer callback, invoked with a batch of records
pub type MutationCallback = Rc<dyn Fn(Vec<MutationRecord>)>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObserverOptions {
    pub attributes: bool,
    /// Restrict attribute records to these names
    pub attribute_filter: Option<Vec<String>>,
    pub attribute_old_value: bool,
    pub child_list: bool,
    pub character_data: bool,
    pub subtree: bool,
}

impl ObserverOptions {
    /// Watch a single attribute, recording old values
    pub fn attribute(name: impl Into<String>) -> Self {
        Self {
            attributes: true,
            attribute_filter: Some(vec![name.into()]),
            attribute_old_value: true,
            ..Self::default()
        }
    }

    /// Watch child list and text changes anywhere below the node
    pub fn content() -> Self {
        Self {
            child_list: true,
            character_data: true,
            subtree: true,
            ..Self::default()
        }
    }

    /// Watch node removals anywhere below the node
    pub fn removals() -> Self {
        Self {
            child_list: true,
            subtree: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Attributes,
    ChildList,
    CharacterData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub attribute_name: Option<String>,
    pub old_value: Option<String>,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

/// Capability surface the engine consumes from a host document
pub trait Host {
    /// All elements matching `selector`, in document order
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, SelectorError>;

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, SelectorError>;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn is_connected(&self, node: NodeId) -> bool;

    /// Root of the live tree, if there is one
    fn root(&self) -> Option<NodeId>;

    fn get_attribute(&self, node: NodeId, name: &str) -> Option<String>;

    fn set_attribute(&self, node: NodeId, name: &str, value: &str);

    fn remove_attribute(&self, node: NodeId, name: &str);

    fn has_class(&self, node: NodeId, class: &str) -> bool;

    fn add_class(&self, node: NodeId, class: &str);

    fn remove_class(&self, node: NodeId, class: &str);

    fn set_style(&self, node: NodeId, property: &str, value: &str);

    fn add_event_listener(
        &self,
        target: EventTarget,
        event_type: &str,
        listener: Listener,
        options: ListenerOptions,
    ) -> ListenerId;

    /// Remove a listener; unknown ids are ignored
    fn remove_event_listener(&self, id: ListenerId);

    fn dispatch_event(&self, target: EventTarget, event: Arc<Event>) -> LocalBoxFuture<'_, ()>;

    fn observe(
        &self,
        node: NodeId,
        options: ObserverOptions,
        callback: MutationCallback,
    ) -> ObserverId;

    /// Disconnect an observer; unknown ids are ignored
    fn disconnect(&self, id: ObserverId);
}

/* ===================== Null Host ===================== */

/// Host used when no live document exists
///
/// Queries come back empty and listeners/observers are accepted but never
/// fire, so programs degrade to no-ops instead of failing.
#[derive(Debug, Default)]
pub struct NullHost {
    next_id: std::cell::Cell<u64>,
}

impl NullHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> u64 {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);
        id
    }
}

impl Host for NullHost {
    fn query_selector_all(&self, _selector: &str) -> Result<Vec<NodeId>, SelectorError> {
        Ok(Vec::new())
    }

    fn matches(&self, _node: NodeId, _selector: &str) -> Result<bool, SelectorError> {
        Ok(false)
    }

    fn parent(&self, _node: NodeId) -> Option<NodeId> {
        None
    }

    fn is_connected(&self, _node: NodeId) -> bool {
        false
    }

    fn root(&self) -> Option<NodeId> {
        None
    }

    fn get_attribute(&self, _node: NodeId, _name: &str) -> Option<String> {
        None
    }

    fn set_attribute(&self, _node: NodeId, _name: &str, _value: &str) {}

    fn remove_attribute(&self, _node: NodeId, _name: &str) {}

    fn has_class(&self, _node: NodeId, _class: &str) -> bool {
        false
    }

    fn add_class(&self, _node: NodeId, _class: &str) {}

    fn remove_class(&self, _node: NodeId, _class: &str) {}

    fn set_style(&self, _node: NodeId, _property: &str, _value: &str) {}

    fn add_event_listener(
        &self,
        _target: EventTarget,
        _event_type: &str,
        _listener: Listener,
        _options: ListenerOptions,
    ) -> ListenerId {
        ListenerId(self.next())
    }

    fn remove_event_listener(&self, _id: ListenerId) {}

    fn dispatch_event(&self, _target: EventTarget, _event: Arc<Event>) -> LocalBoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn observe(
        &self,
        _node: NodeId,
        _options: ObserverOptions,
        _callback: MutationCallback,
    ) -> ObserverId {
        ObserverId(self.next())
    }

    fn disconnect(&self, _id: ObserverId) {}
}
