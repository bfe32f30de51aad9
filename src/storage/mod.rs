mod store;

pub use store::{Entry, Store, StoreValue};
