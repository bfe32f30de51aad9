use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use crate::owner::{Owner, OwnerKey, WeakOwner};

/// A value kept in the store. Callers downcast it back with `Rc::downcast` or `Store::get_as`.
pub type StoreValue = Rc<dyn Any>;

/// Snapshot of one owner's data.
///
/// An entry returned for an unknown owner is an unlinked placeholder: it has no owner and no
/// data, and nothing done to it reaches the store. Only `Store::set` persists.
#[derive(Clone, Default)]
pub struct Entry {
    owner: Option<WeakOwner>,
    data: HashMap<String, StoreValue>,
}

impl Entry {
    pub fn owner(&self) -> Option<Owner> {
        self.owner.as_ref().and_then(WeakOwner::upgrade)
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.data.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True for the placeholder and for an entry whose keys were all removed.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_placeholder(&self) -> bool {
        self.owner.is_none()
    }
}

impl std::fmt::Debug for Entry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.keys().collect();
        keys.sort_unstable();
        f.debug_struct("Entry")
            .field("owner", &self.owner)
            .field("keys", &keys)
            .finish()
    }
}

/// Side table giving any owner a private key-value scratch space.
///
/// Entries are keyed by owner identity and hold the owner weakly, so a dropped owner's data
/// reads as absent and is reclaimed by `purge` (which `set` also runs).
#[derive(Default)]
pub struct Store {
    entries: RefCell<HashMap<OwnerKey, Entry>>,
}

thread_local! {
    static SHARED: Rc<Store> = Rc::new(Store::new());
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// The store shared by every registry on this thread that was not given its own.
    pub fn shared() -> Rc<Store> {
        SHARED.with(Rc::clone)
    }

    pub fn get(&self, owner: &Owner, key: &str) -> Option<StoreValue> {
        let entries = self.entries.borrow();
        let entry = live_entry(&entries, owner)?;
        entry.data.get(key).cloned()
    }

    /// Typed lookup; `None` when the key is missing or holds a different type.
    pub fn get_as<T: Any>(&self, owner: &Owner, key: &str) -> Option<Rc<T>> {
        self.get(owner, key)?.downcast::<T>().ok()
    }

    pub fn set<T: Any>(&self, owner: &Owner, key: &str, value: T) -> Rc<T> {
        let value = Rc::new(value);
        self.set_value(owner, key, Rc::clone(&value) as StoreValue);
        value
    }

    pub fn set_value(&self, owner: &Owner, key: &str, value: StoreValue) -> StoreValue {
        self.purge();
        let mut entries = self.entries.borrow_mut();
        let entry = entries.entry(owner.key()).or_insert_with(|| {
            debug!(owner = ?owner, "creating store entry");
            Entry {
                owner: Some(owner.downgrade()),
                data: HashMap::new(),
            }
        });
        entry.data.insert(key.to_string(), Rc::clone(&value));
        value
    }

    /// Removes `key` from the owner's data, or the owner's whole entry when `key` is `None`.
    /// Missing owners and keys are ignored.
    pub fn remove(&self, owner: &Owner, key: Option<&str>) {
        let mut entries = self.entries.borrow_mut();
        match key {
            Some(key) => {
                if let Some(entry) = entries.get_mut(&owner.key()) {
                    entry.data.remove(key);
                }
            }
            None => {
                entries.remove(&owner.key());
            }
        }
    }

    pub fn get_entry(&self, owner: &Owner) -> Entry {
        let entries = self.entries.borrow();
        live_entry(&entries, owner).cloned().unwrap_or_default()
    }

    /// Drops entries whose owner no longer exists. Returns how many were dropped.
    pub fn purge(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| entry.owner.as_ref().is_some_and(WeakOwner::is_alive));
        let purged = before - entries.len();
        if purged > 0 {
            debug!(purged, "purged store entries of dropped owners");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.owner.as_ref().is_some_and(WeakOwner::is_alive))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn live_entry<'a>(entries: &'a HashMap<OwnerKey, Entry>, owner: &Owner) -> Option<&'a Entry> {
    entries
        .get(&owner.key())
        .filter(|entry| entry.owner.as_ref().is_some_and(WeakOwner::is_alive))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object() -> Owner {
        Owner::object(Rc::new(()))
    }

    #[test]
    fn set_then_get() {
        let store = Store::new();
        let owner = object();
        let stored = store.set(&owner, "count", 3_i32);
        assert_eq!(*stored, 3);
        assert_eq!(store.get_as::<i32>(&owner, "count").as_deref(), Some(&3));
    }

    #[test]
    fn unknown_owner_reads_none() {
        let store = Store::new();
        let owner = object();
        assert!(store.get(&owner, "anything").is_none());
        assert!(store.get_entry(&owner).is_placeholder());
    }

    #[test]
    fn wrong_type_reads_none() {
        let store = Store::new();
        let owner = object();
        store.set(&owner, "name", String::from("slide"));
        assert!(store.get_as::<i32>(&owner, "name").is_none());
        assert!(store.get(&owner, "name").is_some());
    }

    #[test]
    fn overwriting_keeps_one_entry() {
        let store = Store::new();
        let owner = object();
        store.set(&owner, "a", 1_u8);
        store.set(&owner, "a", 2_u8);
        store.set(&owner, "b", 3_u8);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get_as::<u8>(&owner, "a").as_deref(), Some(&2));
        assert_eq!(store.get_entry(&owner).len(), 2);
    }

    #[test]
    fn remove_key_leaves_others() {
        let store = Store::new();
        let owner = object();
        store.set(&owner, "a", 1_u8);
        store.set(&owner, "b", 2_u8);

        store.remove(&owner, Some("a"));
        assert!(store.get(&owner, "a").is_none());
        assert_eq!(store.get_as::<u8>(&owner, "b").as_deref(), Some(&2));

        // removing again, or from an unknown owner, is a no-op
        store.remove(&owner, Some("a"));
        store.remove(&object(), Some("a"));
    }

    #[test]
    fn remove_owner_drops_entry() {
        let store = Store::new();
        let owner = object();
        let other = object();
        store.set(&owner, "a", 1_u8);
        store.set(&other, "a", 1_u8);

        store.remove(&owner, None);
        let entry = store.get_entry(&owner);
        assert!(entry.is_empty());
        assert!(entry.is_placeholder());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn placeholder_does_not_persist() {
        let store = Store::new();
        let owner = object();
        let entry = store.get_entry(&owner);
        assert!(entry.owner().is_none());
        drop(entry);
        assert!(store.is_empty());
    }

    #[test]
    fn dropped_owner_reads_empty_and_is_purged() {
        let store = Store::new();
        let value = Rc::new(5_u64);
        let owner = Owner::object(Rc::clone(&value));
        store.set(&owner, "a", 1_u8);
        let key = owner.key();
        drop(owner);
        drop(value);

        assert!(store.is_empty());
        assert!(store.entries.borrow().contains_key(&key));
        assert_eq!(store.purge(), 1);
        assert!(!store.entries.borrow().contains_key(&key));
    }

    #[test]
    fn shared_store_is_per_thread_singleton() {
        let first = Store::shared();
        let second = Store::shared();
        assert!(Rc::ptr_eq(&first, &second));
    }
}
