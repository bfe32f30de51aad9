mod dom;

use std::rc::Rc;

use kuchiki::NodeRef;

use crate::events::{DispatchError, DispatchOutcome, Event};

pub use dom::DomHost;

pub type ListenerId = u64;

/// A low-level listener installed directly on a node.
pub type NativeListener = Rc<dyn Fn(&Event) -> anyhow::Result<()>>;

/// The runtime's event machinery: per-node listener tables and delivery of events.
///
/// Everything listening on a node sees events dispatched through the host, whether or not it
/// was installed by the registry.
pub trait DispatchHost {
    fn add_listener(&self, target: &NodeRef, event_type: &str, listener: NativeListener)
        -> ListenerId;

    /// Returns `false` when no such listener was installed.
    fn remove_listener(&self, target: &NodeRef, event_type: &str, id: ListenerId) -> bool;

    fn dispatch(&self, target: &NodeRef, event: Event) -> Result<DispatchOutcome, DispatchError>;
}
