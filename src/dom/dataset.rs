use std::collections::BTreeMap;

use kuchiki::NodeRef;

/// The element's `data-*` attributes keyed the way `element.dataset` keys them:
/// `data-date-of-birth` becomes `dateOfBirth`, and `data-DateOfBirth` becomes `dateofbirth`.
pub fn dataset(node: &NodeRef) -> BTreeMap<String, String> {
    let Some(element) = node.as_element() else {
        return BTreeMap::new();
    };
    let attributes = element.attributes.borrow();
    let set = attributes
        .map
        .iter()
        .filter_map(|(name, attribute)| {
            let suffix = name.local.strip_prefix("data-")?;
            (!suffix.is_empty()).then(|| (camelize(&suffix.to_lowercase()), attribute.value.clone()))
        })
        .collect();
    set
}

fn camelize(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '-' {
            match chars.next() {
                Some(next) => result.extend(next.to_uppercase()),
                None => result.push('-'),
            }
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::create;

    #[test]
    fn camel_cases_names() {
        let node = create(
            "div",
            [
                ("data-date-of-birth", "3"),
                ("data-id", "7"),
                ("id", "ignored"),
                ("data-", "empty"),
            ],
        );
        let set = dataset(&node);
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("dateOfBirth").map(String::as_str), Some("3"));
        assert_eq!(set.get("id").map(String::as_str), Some("7"));
    }

    #[test]
    fn lowercases_before_camelizing() {
        assert_eq!(camelize(&"DateOfBirth".to_lowercase()), "dateofbirth");
        assert_eq!(camelize("a-b-c"), "aBC");
        assert_eq!(camelize("trailing-"), "trailing-");
    }

    #[test]
    fn text_nodes_have_no_dataset() {
        let element = crate::dom::create_from_html("<p>text</p>").unwrap();
        let text = element.first_child().unwrap();
        assert!(dataset(&text).is_empty());
    }
}
