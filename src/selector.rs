use std::fmt;
use std::rc::Rc;

use kuchiki::{NodeRef, Selectors};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid selector '{0}'")]
    Invalid(String),
}

/// A compiled CSS selector.
///
/// Matching only looks at the node and, for combinators, its ancestors and siblings, so
/// detached nodes can be tested the same way as nodes inside a document.
#[derive(Clone)]
pub struct Selector {
    source: Rc<str>,
    compiled: Rc<Selectors>,
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let compiled = Selectors::compile(source)
            .map_err(|()| SelectorError::Invalid(source.to_string()))?;
        Ok(Self {
            source: Rc::from(source),
            compiled: Rc::new(compiled),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Non-element nodes never match.
    pub fn matches(&self, node: &NodeRef) -> bool {
        node.clone()
            .into_element_ref()
            .is_some_and(|element| self.compiled.matches(&element))
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.source).finish()
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

pub fn matches(node: &NodeRef, selector: &str) -> Result<bool, SelectorError> {
    Ok(Selector::parse(selector)?.matches(node))
}
