// Browser-style utilities over kuchiki trees: an identity-keyed object store, an event
// registry with delegation, and DOM helpers.

pub mod config;
pub mod dom;
pub mod events;
pub mod host;
pub mod owner;
pub mod selector;
pub mod storage;

// Re-export commonly used types
pub use config::ToolkitConfig;
pub use events::{Callback, DispatchError, DispatchOutcome, Event, EventInit, Invocation, Registry};
pub use host::{DispatchHost, DomHost};
pub use owner::Owner;
pub use selector::{Selector, SelectorError};
pub use storage::{Entry, Store, StoreValue};
