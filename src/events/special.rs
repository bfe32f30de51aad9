//! `mouseenter` and `mouseleave` built from `mouseover` and `mouseout`.
//!
//! The wrappers only pass an occurrence on when the pointer came from, or went to, a node
//! outside the owner. Both return the wrapper so it can later be handed to `Registry::off`
//! together with the wrapped event name.

use kuchiki::NodeRef;

use super::handler::{Callback, Invocation};
use super::registry::Registry;
use crate::owner::Owner;

pub const MOUSEENTER_SOURCE: &str = "mouseover";
pub const MOUSELEAVE_SOURCE: &str = "mouseout";

pub fn mouseenter(registry: &Registry, node: &NodeRef, callback: Callback) -> Callback {
    boundary(registry, node, MOUSEENTER_SOURCE, callback)
}

pub fn mouseleave(registry: &Registry, node: &NodeRef, callback: Callback) -> Callback {
    boundary(registry, node, MOUSELEAVE_SOURCE, callback)
}

fn boundary(registry: &Registry, node: &NodeRef, source: &str, callback: Callback) -> Callback {
    let wrapper = Callback::new(move |invocation: &Invocation<'_>| {
        let Some(event) = invocation.event() else {
            return Ok(());
        };
        let Some(owner) = event.current_target() else {
            return Ok(());
        };
        match event.related_target() {
            Some(related) if *related == owner || contains(&owner, related) => Ok(()),
            _ => callback.call(invocation),
        }
    });
    registry.on(&Owner::node(node), source, wrapper.clone());
    wrapper
}

/// Whether `other` is a descendant of `node`.
pub fn contains(node: &NodeRef, other: &NodeRef) -> bool {
    other.ancestors().any(|ancestor| ancestor == *node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kuchiki::parse_html;
    use kuchiki::traits::*;

    #[test]
    fn contains_is_strict() {
        let document = parse_html().one("<div id=\"a\"><span id=\"b\"></span></div><p id=\"c\"></p>");
        let a = document.select_first("#a").unwrap().as_node().clone();
        let b = document.select_first("#b").unwrap().as_node().clone();
        let c = document.select_first("#c").unwrap().as_node().clone();
        assert!(contains(&a, &b));
        assert!(!contains(&b, &a));
        assert!(!contains(&a, &a));
        assert!(!contains(&a, &c));
    }
}
