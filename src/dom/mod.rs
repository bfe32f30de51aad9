//! Query and manipulation helpers over `kuchiki` trees.

mod classlist;
mod dataset;
pub mod form;

use html5ever::{namespace_url, ns, LocalName, QualName};
use kuchiki::parse_html;
use kuchiki::traits::*;
use kuchiki::{ExpandedName, NodeRef};

use crate::selector::{Selector, SelectorError};

pub use classlist::{add_class, has_class, remove_class, toggle_class};
pub use dataset::dataset;

/// Fragments the HTML parser would drop outside their context: the wrapping markup and how
/// many levels below the outermost wrapper the fragment ends up.
const CONTEXT_WRAPPERS: &[(&str, &str, &str, usize)] = &[
    ("thead", "<table>", "</table>", 1),
    ("tfoot", "<table>", "</table>", 1),
    ("tbody", "<table>", "</table>", 1),
    ("tr", "<table><tbody>", "</tbody></table>", 2),
    ("td", "<table><tbody><tr>", "</tr></tbody></table>", 3),
    ("th", "<table><tbody><tr>", "</tr></tbody></table>", 3),
    ("option", "<select>", "</select>", 1),
];

pub fn is_element(node: &NodeRef) -> bool {
    node.as_element().is_some()
}

pub fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element().map(|element| element.name.local.to_string())
}

pub fn get_attribute(node: &NodeRef, name: &str) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    attributes.get(name).map(str::to_string)
}

pub fn set_attribute(node: &NodeRef, name: &str, value: &str) {
    if let Some(element) = node.as_element() {
        element
            .attributes
            .borrow_mut()
            .insert(name, value.to_string());
    }
}

pub fn remove_attribute(node: &NodeRef, name: &str) {
    if let Some(element) = node.as_element() {
        element.attributes.borrow_mut().remove(name);
    }
}

/// First element below `root` whose `id` attribute equals `id`.
pub fn get_id(root: &NodeRef, id: &str) -> Option<NodeRef> {
    root.descendants()
        .elements()
        .find(|element| element.attributes.borrow().get("id") == Some(id))
        .map(|element| element.as_node().clone())
}

/// Elements below `parent` carrying every class in the whitespace-separated `classes`.
pub fn get_class(classes: &str, parent: &NodeRef) -> Vec<NodeRef> {
    let wanted: Vec<&str> = classes.split_whitespace().collect();
    if wanted.is_empty() {
        return Vec::new();
    }
    parent
        .descendants()
        .filter(|node| wanted.iter().all(|class| has_class(node, class)))
        .collect()
}

/// Elements below `parent` with the given tag name; `*` matches every element.
pub fn get_tag(tag: &str, parent: &NodeRef) -> Vec<NodeRef> {
    parent
        .descendants()
        .elements()
        .filter(|element| tag == "*" || (*element.name.local).eq_ignore_ascii_case(tag))
        .map(|element| element.as_node().clone())
        .collect()
}

/// Every element below `parent` matching `selector`, in document order.
pub fn get(selector: &str, parent: &NodeRef) -> Result<Vec<NodeRef>, SelectorError> {
    let selector = Selector::parse(selector)?;
    Ok(parent
        .descendants()
        .filter(|node| selector.matches(node))
        .collect())
}

pub fn get_first(selector: &str, parent: &NodeRef) -> Result<Option<NodeRef>, SelectorError> {
    let selector = Selector::parse(selector)?;
    Ok(parent.descendants().find(|node| selector.matches(node)))
}

/// Element children only; text and comment nodes are skipped.
pub fn children(element: &NodeRef) -> Vec<NodeRef> {
    element.children().filter(is_element).collect()
}

pub fn next(element: &NodeRef) -> Option<NodeRef> {
    element.following_siblings().find(is_element)
}

pub fn prev(element: &NodeRef) -> Option<NodeRef> {
    element.preceding_siblings().find(is_element)
}

/// Nearest ancestor element matching `selector`, or the parent element when no selector is
/// given. Stops at the first non-element ancestor.
pub fn up(element: &NodeRef, selector: Option<&Selector>) -> Option<NodeRef> {
    element
        .ancestors()
        .take_while(is_element)
        .find(|ancestor| selector.map_or(true, |selector| selector.matches(ancestor)))
}

pub fn matches(element: &NodeRef, selector: &str) -> Result<bool, SelectorError> {
    crate::selector::matches(element, selector)
}

pub fn remove(element: &NodeRef) {
    element.detach();
}

pub fn append<'a>(target: &NodeRef, element: &'a NodeRef) -> &'a NodeRef {
    target.append(element.clone());
    element
}

pub fn prepend<'a>(target: &NodeRef, element: &'a NodeRef) -> &'a NodeRef {
    target.prepend(element.clone());
    element
}

/// Inserts `element` as the previous sibling of `target`.
pub fn insert_before<'a>(target: &NodeRef, element: &'a NodeRef) -> &'a NodeRef {
    target.insert_before(element.clone());
    element
}

/// Inserts `element` as the next sibling of `target`.
pub fn insert_after<'a>(target: &NodeRef, element: &'a NodeRef) -> &'a NodeRef {
    target.insert_after(element.clone());
    element
}

/// Moves `element` into `wrapper`, putting `wrapper` where `element` was.
pub fn wrap(element: &NodeRef, wrapper: &NodeRef) {
    if !is_element(wrapper) {
        return;
    }
    insert_before(element, wrapper);
    append(wrapper, element);
}

/// A new detached HTML element with the given attributes.
pub fn create<'a, I>(tag: &str, attributes: I) -> NodeRef
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let name = QualName::new(None, ns!(html), LocalName::from(tag.to_ascii_lowercase()));
    let element = NodeRef::new_element(name, std::iter::empty::<(ExpandedName, kuchiki::Attribute)>());
    for (name, value) in attributes {
        set_attribute(&element, name, value);
    }
    element
}

/// Parses `html` and returns its first top-level node, detached.
///
/// Table parts and options are parsed inside the markup they need so the parser keeps them.
pub fn create_from_html(html: &str) -> Option<NodeRef> {
    let wrapper = root_tag(html).and_then(|tag| {
        CONTEXT_WRAPPERS
            .iter()
            .find(|(name, ..)| name.eq_ignore_ascii_case(&tag))
    });

    let (markup, depth) = match wrapper {
        Some((_, open, close, depth)) => (format!("<body>{open}{html}{close}"), *depth),
        None => (format!("<body>{html}"), 0),
    };

    let document = parse_html().one(markup);
    let body = document.select_first("body").ok()?.as_node().clone();
    let mut result = body.first_child()?;
    for _ in 0..depth {
        result = result.first_child()?;
    }
    result.detach();
    Some(result)
}

fn root_tag(html: &str) -> Option<String> {
    let start = html.find('<')? + 1;
    let tag: String = html[start..]
        .chars()
        .take_while(char::is_ascii_alphanumeric)
        .collect();
    (!tag.is_empty()).then_some(tag)
}
