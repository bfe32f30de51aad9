use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value as JsonValue;

use super::event::Event;
use crate::selector::Selector;

/// What a callback receives.
///
/// Node owners hand over the event and, when the event carries one, its payload. Plain owners
/// only hand over the payload given to `fire`.
#[derive(Debug, Clone, Copy)]
pub enum Invocation<'a> {
    Event {
        event: &'a Event,
        payload: Option<&'a JsonValue>,
    },
    Data(Option<&'a JsonValue>),
}

impl<'a> Invocation<'a> {
    pub fn event(&self) -> Option<&'a Event> {
        match *self {
            Invocation::Event { event, .. } => Some(event),
            Invocation::Data(_) => None,
        }
    }

    pub fn payload(&self) -> Option<&'a JsonValue> {
        match self {
            Invocation::Event { payload, .. } => *payload,
            Invocation::Data(payload) => *payload,
        }
    }
}

type CallbackFn = dyn Fn(&Invocation<'_>) -> anyhow::Result<()>;

/// A shareable handler function. Two callbacks are the same callback when they share an
/// allocation, which is what `Registry::off` compares.
#[derive(Clone)]
pub struct Callback(Rc<CallbackFn>);

impl Callback {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> anyhow::Result<()> + 'static,
    {
        Self(Rc::new(f))
    }

    pub fn call(&self, invocation: &Invocation<'_>) -> anyhow::Result<()> {
        (self.0)(invocation)
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Callback({:p})", Rc::as_ptr(&self.0) as *const ())
    }
}

#[derive(Debug, Clone)]
pub struct Handler {
    pub callback: Callback,
    pub selector: Option<Selector>,
}

/// Handlers for one event name, in registration order.
#[derive(Debug, Default)]
pub struct HandlerList {
    pub handlers: Vec<Handler>,
}

impl HandlerList {
    /// Drops the first handler registered with `callback`; later duplicates stay.
    pub fn remove_first(&mut self, callback: &Callback) -> bool {
        match self
            .handlers
            .iter()
            .position(|handler| handler.callback.ptr_eq(callback))
        {
            Some(index) => {
                self.handlers.remove(index);
                true
            }
            None => false,
        }
    }
}

/// Every handler list of one owner, by event name.
#[derive(Debug, Default)]
pub struct HandlerSet {
    lists: HashMap<String, HandlerList>,
}

impl HandlerSet {
    pub fn get(&self, event_name: &str) -> Option<&HandlerList> {
        self.lists.get(event_name)
    }

    pub fn get_mut(&mut self, event_name: &str) -> Option<&mut HandlerList> {
        self.lists.get_mut(event_name)
    }

    pub fn list_mut(&mut self, event_name: &str) -> &mut HandlerList {
        self.lists.entry(event_name.to_string()).or_default()
    }

    pub fn remove(&mut self, event_name: &str) -> Option<HandlerList> {
        self.lists.remove(event_name)
    }

    /// Copy of the handlers for `event_name`, taken before any of them run.
    pub fn snapshot(&self, event_name: &str) -> Vec<Handler> {
        self.lists
            .get(event_name)
            .map(|list| list.handlers.clone())
            .unwrap_or_default()
    }

    pub fn event_names(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }
}
