use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use kuchiki::{Node, NodeRef};
use tracing::{debug, trace};

use super::{DispatchHost, ListenerId, NativeListener};
use crate::events::{DispatchError, DispatchOutcome, Event, EventPhase};
use crate::owner::{Owner, OwnerKey};

struct ListenerEntry {
    id: ListenerId,
    event_type: String,
    listener: NativeListener,
}

struct TargetRecord {
    node: Weak<Node>,
    listeners: Vec<ListenerEntry>,
}

impl TargetRecord {
    fn new(node: &NodeRef) -> Self {
        Self {
            node: Rc::downgrade(&node.0),
            listeners: Vec::new(),
        }
    }

    fn is_alive(&self) -> bool {
        self.node.strong_count() > 0
    }
}

/// Listener tables and bubbling dispatch over `kuchiki` trees.
///
/// Records hold their node weakly; a node dropped with listeners still installed leaves a
/// dead record behind until `purge`.
#[derive(Default)]
pub struct DomHost {
    next_id: Cell<ListenerId>,
    records: RefCell<HashMap<OwnerKey, TargetRecord>>,
}

impl DomHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener_count(&self, target: &NodeRef, event_type: &str) -> usize {
        self.records
            .borrow()
            .get(&node_key(target))
            .filter(|record| record.is_alive())
            .map(|record| {
                record
                    .listeners
                    .iter()
                    .filter(|entry| entry.event_type == event_type)
                    .count()
            })
            .unwrap_or(0)
    }

    pub fn purge(&self) -> usize {
        let mut records = self.records.borrow_mut();
        let before = records.len();
        records.retain(|_, record| record.is_alive() && !record.listeners.is_empty());
        before - records.len()
    }

    fn snapshot(&self, node: &NodeRef, event_type: &str) -> Vec<(ListenerId, NativeListener)> {
        self.records
            .borrow()
            .get(&node_key(node))
            .filter(|record| record.is_alive())
            .map(|record| {
                record
                    .listeners
                    .iter()
                    .filter(|entry| entry.event_type == event_type)
                    .map(|entry| (entry.id, Rc::clone(&entry.listener)))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn is_installed(&self, node: &NodeRef, id: ListenerId) -> bool {
        self.records
            .borrow()
            .get(&node_key(node))
            .is_some_and(|record| record.listeners.iter().any(|entry| entry.id == id))
    }

    fn run_path(&self, path: &[NodeRef], event: &Event) -> Result<(), DispatchError> {
        for (index, node) in path.iter().enumerate() {
            if event.propagation_stopped() {
                break;
            }

            let phase = if index == 0 {
                EventPhase::AtTarget
            } else {
                EventPhase::Bubbling
            };
            event.set_phase(phase);
            event.set_current_target(Some(node));

            for (id, listener) in self.snapshot(node, event.event_type()) {
                // removed by an earlier listener in this dispatch
                if !self.is_installed(node, id) {
                    continue;
                }
                trace!(event = event.event_type(), listener = id, ?phase, "invoking listener");
                listener(event).map_err(|source| DispatchError::Listener {
                    event: event.event_type().to_string(),
                    source,
                })?;
                if event.immediate_propagation_stopped() {
                    break;
                }
            }
        }
        Ok(())
    }
}

impl DispatchHost for DomHost {
    fn add_listener(
        &self,
        target: &NodeRef,
        event_type: &str,
        listener: NativeListener,
    ) -> ListenerId {
        let id = self.next_id.get() + 1;
        self.next_id.set(id);

        let mut records = self.records.borrow_mut();
        let record = records
            .entry(node_key(target))
            .or_insert_with(|| TargetRecord::new(target));
        // a dropped node's address handed out again
        if !record.is_alive() {
            *record = TargetRecord::new(target);
        }
        record.listeners.push(ListenerEntry {
            id,
            event_type: event_type.to_string(),
            listener,
        });
        debug!(event = event_type, listener = id, "added native listener");
        id
    }

    fn remove_listener(&self, target: &NodeRef, event_type: &str, id: ListenerId) -> bool {
        let mut records = self.records.borrow_mut();
        let Some(record) = records.get_mut(&node_key(target)) else {
            return false;
        };
        let Some(index) = record
            .listeners
            .iter()
            .position(|entry| entry.id == id && entry.event_type == event_type)
        else {
            return false;
        };
        record.listeners.remove(index);
        if record.listeners.is_empty() {
            records.remove(&node_key(target));
        }
        debug!(event = event_type, listener = id, "removed native listener");
        true
    }

    fn dispatch(&self, target: &NodeRef, event: Event) -> Result<DispatchOutcome, DispatchError> {
        event.set_target(target);
        let path: Vec<NodeRef> = if event.bubbles() {
            target.inclusive_ancestors().collect()
        } else {
            vec![target.clone()]
        };
        trace!(event = event.event_type(), depth = path.len(), "dispatching");

        let result = self.run_path(&path, &event);
        event.set_phase(EventPhase::None);
        event.set_current_target(None);
        result.map(|()| event.outcome())
    }
}

fn node_key(node: &NodeRef) -> OwnerKey {
    Owner::node(node).key()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventInit;
    use kuchiki::parse_html;
    use kuchiki::traits::*;
    use std::cell::RefCell;

    fn tree() -> (NodeRef, NodeRef, NodeRef) {
        let document =
            parse_html().one(r#"<div id="outer"><p id="inner"><span id="leaf">x</span></p></div>"#);
        let outer = document.select_first("#outer").unwrap().as_node().clone();
        let leaf = document.select_first("#leaf").unwrap().as_node().clone();
        (document, outer, leaf)
    }

    fn recorder(log: &Rc<RefCell<Vec<String>>>, label: &str) -> NativeListener {
        let log = Rc::clone(log);
        let label = label.to_string();
        Rc::new(move |event: &Event| {
            log.borrow_mut().push(format!("{label}:{:?}", event.phase()));
            Ok(())
        })
    }

    #[test]
    fn bubbles_from_target_to_ancestors() {
        let (_document, outer, leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        host.add_listener(&outer, "click", recorder(&log, "outer"));
        host.add_listener(&leaf, "click", recorder(&log, "leaf"));

        let outcome = host
            .dispatch(&leaf, Event::new("click", EventInit::bubbling()))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["leaf:AtTarget", "outer:Bubbling"]);
        assert!(!outcome.propagation_stopped);
    }

    #[test]
    fn non_bubbling_stays_at_target() {
        let (_document, outer, leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        host.add_listener(&outer, "focus", recorder(&log, "outer"));
        host.add_listener(&leaf, "focus", recorder(&log, "leaf"));

        host.dispatch(&leaf, Event::new("focus", EventInit::default()))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["leaf:AtTarget"]);
    }

    #[test]
    fn stop_propagation_keeps_ancestors_quiet() {
        let (_document, outer, leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        host.add_listener(
            &leaf,
            "click",
            Rc::new(|event: &Event| {
                event.stop_propagation();
                Ok(())
            }),
        );
        host.add_listener(&leaf, "click", recorder(&log, "leaf"));
        host.add_listener(&outer, "click", recorder(&log, "outer"));

        let outcome = host
            .dispatch(&leaf, Event::new("click", EventInit::bubbling()))
            .unwrap();
        assert_eq!(*log.borrow(), vec!["leaf:AtTarget"]);
        assert!(outcome.propagation_stopped);
    }

    #[test]
    fn stop_immediate_skips_siblings() {
        let (_document, _outer, leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        host.add_listener(
            &leaf,
            "click",
            Rc::new(|event: &Event| {
                event.stop_immediate_propagation();
                Ok(())
            }),
        );
        host.add_listener(&leaf, "click", recorder(&log, "leaf"));

        host.dispatch(&leaf, Event::new("click", EventInit::bubbling()))
            .unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn listener_removed_mid_dispatch_is_skipped() {
        let (_document, _outer, leaf) = tree();
        let host = Rc::new(DomHost::new());
        let log = Rc::new(RefCell::new(Vec::new()));
        let victim = Rc::new(Cell::new(0));

        let remover: NativeListener = {
            let host = Rc::clone(&host);
            let leaf = leaf.clone();
            let victim = Rc::clone(&victim);
            Rc::new(move |_: &Event| {
                host.remove_listener(&leaf, "click", victim.get());
                Ok(())
            })
        };
        host.add_listener(&leaf, "click", remover);
        victim.set(host.add_listener(&leaf, "click", recorder(&log, "victim")));

        host.dispatch(&leaf, Event::new("click", EventInit::bubbling()))
            .unwrap();
        assert!(log.borrow().is_empty());
        assert_eq!(host.listener_count(&leaf, "click"), 1);
    }

    #[test]
    fn failing_listener_aborts_dispatch() {
        let (_document, outer, leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        host.add_listener(&leaf, "click", Rc::new(|_: &Event| -> anyhow::Result<()> { anyhow::bail!("boom") }));
        host.add_listener(&leaf, "click", recorder(&log, "leaf"));
        host.add_listener(&outer, "click", recorder(&log, "outer"));

        let err = host
            .dispatch(&leaf, Event::new("click", EventInit::bubbling()))
            .unwrap_err();
        assert_eq!(err.event(), "click");
        assert!(err.to_string().contains("boom"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn remove_listener_is_idempotent() {
        let (_document, outer, _leaf) = tree();
        let host = DomHost::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let id = host.add_listener(&outer, "click", recorder(&log, "outer"));
        assert!(!host.remove_listener(&outer, "keyup", id));
        assert!(host.remove_listener(&outer, "click", id));
        assert!(!host.remove_listener(&outer, "click", id));
        assert_eq!(host.listener_count(&outer, "click"), 0);
    }

    #[test]
    fn purge_drops_records_of_dropped_nodes() {
        let host = DomHost::new();
        {
            let document = parse_html().one("<b>temp</b>");
            let bold = document.select_first("b").unwrap().as_node().clone();
            host.add_listener(&bold, "click", Rc::new(|_: &Event| Ok(())));
        }
        assert_eq!(host.purge(), 1);
    }
}
