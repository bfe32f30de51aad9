use std::any::Any;
use std::fmt;
use std::rc::{Rc, Weak};

use kuchiki::{Node, NodeData, NodeRef};

/// Pointer identity of an owner. Two owners share a key only when they are the same allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerKey(usize);

/// The identity under which state and handlers are stored.
///
/// `Node` owners are DOM nodes from a `kuchiki` tree; elements and documents among them can
/// take part in host dispatch. `Object` owners are any other shared value and only ever see
/// handlers run directly by the registry.
#[derive(Clone)]
pub enum Owner {
    Node(NodeRef),
    Object(Rc<dyn Any>),
}

impl Owner {
    pub fn node(node: &NodeRef) -> Self {
        Owner::Node(node.clone())
    }

    pub fn object<T: Any>(value: Rc<T>) -> Self {
        Owner::Object(value)
    }

    pub fn key(&self) -> OwnerKey {
        match self {
            Owner::Node(node) => OwnerKey(Rc::as_ptr(&node.0) as *const () as usize),
            Owner::Object(value) => OwnerKey(Rc::as_ptr(value) as *const () as usize),
        }
    }

    pub fn downgrade(&self) -> WeakOwner {
        match self {
            Owner::Node(node) => WeakOwner::Node(Rc::downgrade(&node.0)),
            Owner::Object(value) => WeakOwner::Object(Rc::downgrade(value)),
        }
    }

    /// The node to hand to the host, if this owner supports native dispatch.
    ///
    /// Text, comment and doctype nodes are owners like any other value but have no
    /// listeners of their own, so they take the plain-object path.
    pub fn dispatch_node(&self) -> Option<&NodeRef> {
        match self {
            Owner::Node(node) if is_dispatch_target(node) => Some(node),
            _ => None,
        }
    }

    pub fn is_dispatch_target(&self) -> bool {
        self.dispatch_node().is_some()
    }
}

pub(crate) fn is_dispatch_target(node: &NodeRef) -> bool {
    matches!(
        node.data(),
        NodeData::Element(_) | NodeData::Document(_) | NodeData::DocumentFragment
    )
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Owner {}

impl fmt::Debug for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Node(node) => match node.as_element() {
                Some(element) => write!(f, "Owner::Node(<{}>)", element.name.local),
                None => write!(f, "Owner::Node({:?})", self.key()),
            },
            Owner::Object(_) => write!(f, "Owner::Object({:?})", self.key()),
        }
    }
}

impl From<NodeRef> for Owner {
    fn from(node: NodeRef) -> Self {
        Owner::Node(node)
    }
}

impl From<&NodeRef> for Owner {
    fn from(node: &NodeRef) -> Self {
        Owner::node(node)
    }
}

/// Non-owning handle to an owner; holding one never keeps the owner alive.
#[derive(Clone)]
pub enum WeakOwner {
    Node(Weak<Node>),
    Object(Weak<dyn Any>),
}

impl WeakOwner {
    pub fn upgrade(&self) -> Option<Owner> {
        match self {
            WeakOwner::Node(node) => node.upgrade().map(|rc| Owner::Node(NodeRef(rc))),
            WeakOwner::Object(value) => value.upgrade().map(Owner::Object),
        }
    }

    pub fn is_alive(&self) -> bool {
        match self {
            WeakOwner::Node(node) => node.strong_count() > 0,
            WeakOwner::Object(value) => value.strong_count() > 0,
        }
    }
}

impl fmt::Debug for WeakOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_alive() { "alive" } else { "dropped" };
        match self {
            WeakOwner::Node(_) => write!(f, "WeakOwner::Node({state})"),
            WeakOwner::Object(_) => write!(f, "WeakOwner::Object({state})"),
        }
    }
}
