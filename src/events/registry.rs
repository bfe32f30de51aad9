use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use kuchiki::{Node, NodeRef};
use serde_json::Value as JsonValue;
use tracing::{debug, trace, warn};

use super::event::{DispatchError, DispatchOutcome, Event, EventInit};
use super::handler::{Callback, Handler, HandlerSet, Invocation};
use crate::config::ToolkitConfig;
use crate::host::{DispatchHost, ListenerId, NativeListener};
use crate::owner::{Owner, OwnerKey};
use crate::selector::{Selector, SelectorError};
use crate::storage::Store;

/// Subscribes, removes and fires events on nodes and plain objects.
///
/// Handler lists live in the `Store` under `ToolkitConfig::storage_key`. Node owners get one
/// native listener per event name on the `DispatchHost`, which looks the stored list up each
/// time it fires; plain owners are only ever fired through `Registry::fire`.
///
/// Bindings are tracked by the registry rather than the store, so clearing an owner's store
/// entry leaves its listener in place to serve the next subscription. Clones of a registry
/// share one binding table.
///
/// Handlers run against a snapshot of their list taken when dispatch starts: handlers added
/// or removed by a running handler only take part from the next dispatch on.
#[derive(Clone)]
pub struct Registry {
    inner: Rc<RegistryInner>,
}

struct RegistryInner {
    store: Rc<Store>,
    host: Rc<dyn DispatchHost>,
    config: ToolkitConfig,
    bindings: RefCell<HashMap<(OwnerKey, String), Binding>>,
}

struct Binding {
    node: Weak<Node>,
    id: ListenerId,
}

impl Binding {
    fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

impl Registry {
    /// A registry over the thread's shared store with default configuration.
    pub fn new(host: Rc<dyn DispatchHost>) -> Self {
        Self::with_store(Store::shared(), host, ToolkitConfig::default())
    }

    pub fn with_store(store: Rc<Store>, host: Rc<dyn DispatchHost>, config: ToolkitConfig) -> Self {
        Self {
            inner: Rc::new(RegistryInner {
                store,
                host,
                config,
                bindings: RefCell::new(HashMap::new()),
            }),
        }
    }

    pub fn store(&self) -> &Rc<Store> {
        &self.inner.store
    }

    pub fn host(&self) -> &Rc<dyn DispatchHost> {
        &self.inner.host
    }

    pub fn config(&self) -> &ToolkitConfig {
        &self.inner.config
    }

    /// Runs `callback` every time `event_name` fires on `owner`.
    pub fn on(&self, owner: &Owner, event_name: &str, callback: Callback) {
        self.subscribe(
            owner,
            event_name,
            Handler {
                callback,
                selector: None,
            },
        );
    }

    /// Runs `callback` only for occurrences whose target, or an ancestor of it below `owner`,
    /// matches `selector`. The matched node is exposed as `Event::selected_target`.
    pub fn delegate(
        &self,
        owner: &Owner,
        event_name: &str,
        selector: &str,
        callback: Callback,
    ) -> Result<(), SelectorError> {
        let selector = Selector::parse(selector).map_err(|err| {
            warn!(event = event_name, error = %err, "rejected delegated handler");
            err
        })?;
        self.subscribe(
            owner,
            event_name,
            Handler {
                callback,
                selector: Some(selector),
            },
        );
        Ok(())
    }

    /// Removes the first handler registered with `callback`, or every handler for
    /// `event_name` (and the native listener) when `callback` is `None`.
    pub fn off(&self, owner: &Owner, event_name: &str, callback: Option<&Callback>) {
        let set = self.handler_set(owner);
        match callback {
            Some(callback) => {
                let Some(set) = set else {
                    return;
                };
                if let Some(list) = set.borrow_mut().get_mut(event_name) {
                    list.remove_first(callback);
                };
            }
            None => {
                if let Some(set) = set {
                    set.borrow_mut().remove(event_name);
                }
                self.unbind(owner, event_name);
            }
        }
    }

    /// Fires `event_name` with the configured `bubbles`/`cancelable` defaults.
    pub fn fire(
        &self,
        owner: &Owner,
        event_name: &str,
        data: Option<JsonValue>,
    ) -> Result<DispatchOutcome, DispatchError> {
        let init = EventInit {
            bubbles: self.inner.config.default_bubbles,
            cancelable: self.inner.config.default_cancelable,
            detail: data,
            related_target: None,
        };
        self.fire_with(owner, event_name, init)
    }

    /// Node owners get a native-style event carrying `init.detail`, delivered through the host
    /// to every listener on the propagation path. Plain owners run their handlers directly
    /// with the payload alone.
    pub fn fire_with(
        &self,
        owner: &Owner,
        event_name: &str,
        init: EventInit,
    ) -> Result<DispatchOutcome, DispatchError> {
        if let Some(node) = owner.dispatch_node() {
            return self
                .inner
                .host
                .dispatch(node, Event::new(event_name, init));
        }

        let handlers = self.inner.snapshot(owner, event_name);
        run_handlers(&handlers, None, &Invocation::Data(init.detail.as_ref())).map_err(
            |source| DispatchError::Listener {
                event: event_name.to_string(),
                source,
            },
        )?;
        Ok(DispatchOutcome::default())
    }

    pub fn handler_count(&self, owner: &Owner, event_name: &str) -> usize {
        self.handler_set(owner)
            .and_then(|set| set.borrow().get(event_name).map(|list| list.handlers.len()))
            .unwrap_or(0)
    }

    /// Whether a native listener is installed for `event_name` on `owner`.
    pub fn is_bound(&self, owner: &Owner, event_name: &str) -> bool {
        owner.dispatch_node().is_some()
            && self
                .inner
                .bindings
                .borrow()
                .get(&(owner.key(), event_name.to_string()))
                .is_some_and(Binding::is_alive)
    }

    fn handler_set(&self, owner: &Owner) -> Option<Rc<RefCell<HandlerSet>>> {
        self.inner.handler_set(owner)
    }

    fn subscribe(&self, owner: &Owner, event_name: &str, handler: Handler) {
        let set = self.handler_set(owner).unwrap_or_else(|| {
            self.inner.store.set(
                owner,
                &self.inner.config.storage_key,
                RefCell::new(HandlerSet::default()),
            )
        });
        set.borrow_mut().list_mut(event_name).handlers.push(handler);

        let Some(node) = owner.dispatch_node() else {
            return;
        };
        let mut bindings = self.inner.bindings.borrow_mut();
        bindings.retain(|_, binding| binding.is_alive());
        let key = (owner.key(), event_name.to_string());
        if bindings.contains_key(&key) {
            return;
        }

        let listener = native_listener(Rc::downgrade(&self.inner), event_name, Rc::downgrade(&node.0));
        let id = self.inner.host.add_listener(node, event_name, listener);
        bindings.insert(
            key,
            Binding {
                node: Rc::downgrade(&node.0),
                id,
            },
        );
        debug!(event = event_name, listener = id, "installed dispatch binding");
    }

    fn unbind(&self, owner: &Owner, event_name: &str) {
        let Some(node) = owner.dispatch_node() else {
            return;
        };
        let removed = self
            .inner
            .bindings
            .borrow_mut()
            .remove(&(owner.key(), event_name.to_string()));
        if let Some(binding) = removed.filter(Binding::is_alive) {
            self.inner.host.remove_listener(node, event_name, binding.id);
            debug!(event = event_name, listener = binding.id, "removed dispatch binding");
        }
    }
}

impl RegistryInner {
    fn handler_set(&self, owner: &Owner) -> Option<Rc<RefCell<HandlerSet>>> {
        self.store
            .get_as::<RefCell<HandlerSet>>(owner, &self.config.storage_key)
    }

    /// The owner's current handlers for `event_name`, copied out so no borrow outlives the call.
    fn snapshot(&self, owner: &Owner, event_name: &str) -> Vec<Handler> {
        self.handler_set(owner)
            .map(|set| set.borrow().snapshot(event_name))
            .unwrap_or_default()
    }
}

/// The single host listener bridging native occurrences on `owner` into its handler list.
///
/// The list is fetched from the store on every occurrence, so a handler set replaced after
/// `Store::remove` is picked up by the same listener. Registry and owner are held weakly so
/// that the host's listener table never keeps either alive.
fn native_listener(
    registry: Weak<RegistryInner>,
    event_name: &str,
    owner: Weak<Node>,
) -> NativeListener {
    let event_name = event_name.to_string();
    Rc::new(move |event: &Event| {
        let (Some(registry), Some(owner)) = (registry.upgrade(), owner.upgrade()) else {
            return Ok(());
        };
        let owner = NodeRef(owner);
        let handlers = registry.snapshot(&Owner::node(&owner), &event_name);
        let invocation = Invocation::Event {
            event,
            payload: event.detail(),
        };
        run_handlers(&handlers, Some(&owner), &invocation)
    })
}

fn run_handlers(
    handlers: &[Handler],
    owner: Option<&NodeRef>,
    invocation: &Invocation<'_>,
) -> anyhow::Result<()> {
    for handler in handlers {
        if let Some(selector) = &handler.selector {
            // plain owners have no target to walk from
            let (Some(event), Some(owner)) = (invocation.event(), owner) else {
                continue;
            };
            let Some(matched) = delegate_target(event, owner, selector) else {
                continue;
            };
            event.set_selected_target(&matched);
        }
        trace!(callback = ?handler.callback, selector = ?handler.selector, "running handler");
        handler.callback.call(invocation)?;
    }
    Ok(())
}

/// Walks from the event's target up to, but excluding, `owner`, returning the first node
/// matching `selector`.
fn delegate_target(event: &Event, owner: &NodeRef, selector: &Selector) -> Option<NodeRef> {
    let mut node = event.target();
    while let Some(current) = node {
        if current == *owner {
            return None;
        }
        if selector.matches(&current) {
            return Some(current);
        }
        node = current.parent();
    }
    None
}
