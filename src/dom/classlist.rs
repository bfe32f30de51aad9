use kuchiki::NodeRef;

fn class_names(node: &NodeRef) -> Vec<String> {
    super::get_attribute(node, "class")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default()
}

fn set_class_names(node: &NodeRef, names: &[String]) {
    super::set_attribute(node, "class", &names.join(" "));
}

pub fn has_class(node: &NodeRef, class: &str) -> bool {
    class_names(node).iter().any(|name| name == class)
}

pub fn add_class(node: &NodeRef, class: &str) {
    let mut names = class_names(node);
    if !names.iter().any(|name| name == class) {
        names.push(class.to_string());
        set_class_names(node, &names);
    }
}

pub fn remove_class(node: &NodeRef, class: &str) {
    let mut names = class_names(node);
    let before = names.len();
    names.retain(|name| name != class);
    if names.len() != before {
        set_class_names(node, &names);
    }
}

/// Flips `class`, or only adds (`Some(true)`) or only removes (`Some(false)`) it.
/// Returns whether the class is present afterwards.
pub fn toggle_class(node: &NodeRef, class: &str, force: Option<bool>) -> bool {
    let present = has_class(node, class);
    match (present, force) {
        (true, Some(true)) | (false, Some(false)) => present,
        (true, _) => {
            remove_class(node, class);
            false
        }
        (false, _) => {
            add_class(node, class);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{create, get_attribute};

    #[test]
    fn add_and_remove() {
        let node = create("div", [("class", "slide  active")]);
        assert!(has_class(&node, "slide"));
        assert!(!has_class(&node, "slid"));

        add_class(&node, "current");
        add_class(&node, "current");
        assert_eq!(get_attribute(&node, "class").as_deref(), Some("slide active current"));

        remove_class(&node, "active");
        remove_class(&node, "missing");
        assert_eq!(get_attribute(&node, "class").as_deref(), Some("slide current"));
    }

    #[test]
    fn add_to_element_without_class() {
        let node = create("span", []);
        add_class(&node, "badge");
        assert_eq!(get_attribute(&node, "class").as_deref(), Some("badge"));
    }

    #[test]
    fn toggle_with_and_without_force() {
        let node = create("div", []);
        assert!(toggle_class(&node, "open", None));
        assert!(!toggle_class(&node, "open", None));
        assert!(!toggle_class(&node, "open", Some(false)));
        assert!(toggle_class(&node, "open", Some(true)));
        assert!(toggle_class(&node, "open", Some(true)));
        assert!(has_class(&node, "open"));
    }
}
