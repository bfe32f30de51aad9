//! `application/x-www-form-urlencoded` serialization of a form's controls.

use kuchiki::NodeRef;
use tracing::warn;

use super::{get_attribute, is_element, tag_name};

/// Input types whose value is submitted as typed text.
const TEXT_LIKE_INPUTS: &[&str] = &[
    "text",
    "hidden",
    "password",
    "button",
    "reset",
    "submit",
    "email",
    "number",
    "search",
    "tel",
    "url",
    "date",
    "datetime-local",
    "month",
    "week",
    "time",
    "color",
    "range",
];

/// Every other input type a browser recognises; anything outside both lists reads as text.
const OTHER_INPUTS: &[&str] = &["checkbox", "radio", "file", "image"];

/// The `(name, value)` pairs a form would submit, in document order.
///
/// Returns `None` when `form` is not a `<form>` element. Controls without a name are skipped,
/// as are unchecked checkboxes and radios, file inputs and image inputs.
pub fn pairs(form: &NodeRef) -> Option<Vec<(String, String)>> {
    if !tag_name(form)?.eq_ignore_ascii_case("form") {
        return None;
    }

    let mut pairs = Vec::new();
    for control in form.descendants().filter(is_element) {
        let Some(name) = get_attribute(&control, "name").filter(|name| !name.is_empty()) else {
            continue;
        };
        let Some(tag) = tag_name(&control) else {
            continue;
        };

        match tag.to_ascii_lowercase().as_str() {
            "input" => {
                let kind = input_type(&control);
                if TEXT_LIKE_INPUTS.contains(&kind.as_str()) {
                    pairs.push((name, get_attribute(&control, "value").unwrap_or_default()));
                } else if (kind == "checkbox" || kind == "radio") && is_set(&control, "checked") {
                    let value = get_attribute(&control, "value").unwrap_or_else(|| "on".into());
                    pairs.push((name, value));
                }
            }
            "textarea" => pairs.push((name, control.text_contents())),
            "select" => {
                let options = options(&control);
                if is_set(&control, "multiple") {
                    for option in options.iter().filter(|option| is_set(option, "selected")) {
                        pairs.push((name.clone(), option_value(option)));
                    }
                } else {
                    let chosen = options
                        .iter()
                        .rev()
                        .find(|option| is_set(option, "selected"))
                        .or_else(|| options.first());
                    pairs.push((name, chosen.map(option_value).unwrap_or_default()));
                }
            }
            // an unknown button type reads as `submit`, so every named button counts
            "button" => {
                pairs.push((name, get_attribute(&control, "value").unwrap_or_default()));
            }
            _ => {}
        }
    }
    Some(pairs)
}

pub fn serialize(form: &NodeRef) -> Option<String> {
    let pairs = pairs(form)?;
    match serde_urlencoded::to_string(&pairs) {
        Ok(encoded) => Some(encoded),
        Err(err) => {
            warn!(error = %err, "failed to encode form");
            None
        }
    }
}

fn input_type(control: &NodeRef) -> String {
    let kind = get_attribute(control, "type")
        .map(|kind| kind.trim().to_ascii_lowercase())
        .unwrap_or_default();
    if TEXT_LIKE_INPUTS.contains(&kind.as_str()) || OTHER_INPUTS.contains(&kind.as_str()) {
        kind
    } else {
        "text".to_string()
    }
}

fn is_set(node: &NodeRef, attribute: &str) -> bool {
    node.as_element()
        .is_some_and(|element| element.attributes.borrow().contains(attribute))
}

fn options(select: &NodeRef) -> Vec<NodeRef> {
    select
        .descendants()
        .filter(|node| tag_name(node).is_some_and(|tag| tag.eq_ignore_ascii_case("option")))
        .collect()
}

fn option_value(option: &NodeRef) -> String {
    get_attribute(option, "value").unwrap_or_else(|| option.text_contents().trim().to_string())
}
