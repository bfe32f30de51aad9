use std::cell::{Cell, RefCell};
use std::fmt;

use kuchiki::NodeRef;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("listener for '{event}' failed: {source}")]
    Listener {
        event: String,
        #[source]
        source: anyhow::Error,
    },
}

impl DispatchError {
    pub fn event(&self) -> &str {
        match self {
            DispatchError::Listener { event, .. } => event,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventPhase {
    #[default]
    None,
    AtTarget,
    Bubbling,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub default_prevented: bool,
    pub propagation_stopped: bool,
}

/// Construction options, mirroring a `CustomEventInit` dictionary.
#[derive(Clone, Default)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
    pub detail: Option<JsonValue>,
    pub related_target: Option<NodeRef>,
}

impl EventInit {
    pub fn bubbling() -> Self {
        Self {
            bubbles: true,
            ..Self::default()
        }
    }

    pub fn with_detail(mut self, detail: JsonValue) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn with_related_target(mut self, node: &NodeRef) -> Self {
        self.related_target = Some(node.clone());
        self
    }

    pub fn cancelable(mut self, cancelable: bool) -> Self {
        self.cancelable = cancelable;
        self
    }
}

/// A native-style event travelling through a `DispatchHost`.
///
/// The mutable parts (targets, phase, cancellation flags) use interior mutability so that
/// listeners only ever need `&Event`.
pub struct Event {
    event_type: String,
    bubbles: bool,
    cancelable: bool,
    detail: Option<JsonValue>,
    related_target: Option<NodeRef>,
    target: RefCell<Option<NodeRef>>,
    current_target: RefCell<Option<NodeRef>>,
    selected_target: RefCell<Option<NodeRef>>,
    phase: Cell<EventPhase>,
    default_prevented: Cell<bool>,
    propagation_stopped: Cell<bool>,
    immediate_propagation_stopped: Cell<bool>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, init: EventInit) -> Self {
        Self {
            event_type: event_type.into(),
            bubbles: init.bubbles,
            cancelable: init.cancelable,
            detail: init.detail,
            related_target: init.related_target,
            target: RefCell::new(None),
            current_target: RefCell::new(None),
            selected_target: RefCell::new(None),
            phase: Cell::new(EventPhase::None),
            default_prevented: Cell::new(false),
            propagation_stopped: Cell::new(false),
            immediate_propagation_stopped: Cell::new(false),
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    pub fn detail(&self) -> Option<&JsonValue> {
        self.detail.as_ref()
    }

    pub fn related_target(&self) -> Option<&NodeRef> {
        self.related_target.as_ref()
    }

    /// The node the event was dispatched on.
    pub fn target(&self) -> Option<NodeRef> {
        self.target.borrow().clone()
    }

    /// The node whose listeners are currently running.
    pub fn current_target(&self) -> Option<NodeRef> {
        self.current_target.borrow().clone()
    }

    /// The delegate node matched by the most recent selector handler.
    pub fn selected_target(&self) -> Option<NodeRef> {
        self.selected_target.borrow().clone()
    }

    pub fn phase(&self) -> EventPhase {
        self.phase.get()
    }

    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }

    pub fn stop_propagation(&self) {
        self.propagation_stopped.set(true);
    }

    pub fn stop_immediate_propagation(&self) {
        self.propagation_stopped.set(true);
        self.immediate_propagation_stopped.set(true);
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped.get()
    }

    pub fn immediate_propagation_stopped(&self) -> bool {
        self.immediate_propagation_stopped.get()
    }

    pub(crate) fn set_target(&self, node: &NodeRef) {
        *self.target.borrow_mut() = Some(node.clone());
    }

    pub(crate) fn set_current_target(&self, node: Option<&NodeRef>) {
        *self.current_target.borrow_mut() = node.cloned();
    }

    pub(crate) fn set_selected_target(&self, node: &NodeRef) {
        *self.selected_target.borrow_mut() = Some(node.clone());
    }

    pub(crate) fn set_phase(&self, phase: EventPhase) {
        self.phase.set(phase);
    }

    pub(crate) fn outcome(&self) -> DispatchOutcome {
        DispatchOutcome {
            default_prevented: self.default_prevented(),
            propagation_stopped: self.propagation_stopped(),
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("type", &self.event_type)
            .field("bubbles", &self.bubbles)
            .field("cancelable", &self.cancelable)
            .field("detail", &self.detail)
            .field("phase", &self.phase.get())
            .field("default_prevented", &self.default_prevented.get())
            .finish()
    }
}
