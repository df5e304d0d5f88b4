//! String-keyed extension bag for inter-stage data.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// Per-request storage shared between the stages of one traversal.
///
/// Keys are plain strings so independently authored stages can agree on
/// them by convention; values are typed on the way out. A lookup with the
/// wrong type behaves like a missing key.
///
/// ```rust
/// use weft::Extensions;
///
/// let mut ext = Extensions::new();
/// ext.insert("user.id", 42u64);
///
/// assert_eq!(ext.get::<u64>("user.id"), Some(&42));
/// assert_eq!(ext.get::<String>("user.id"), None);
/// ```
#[derive(Default)]
pub struct Extensions {
    map: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value if it had the
    /// same type.
    pub fn insert<T>(&mut self, key: impl Into<String>, value: T) -> Option<T>
    where
        T: Any + Send + Sync,
    {
        self.map
            .insert(key.into(), Box::new(value))
            .and_then(|old| old.downcast::<T>().ok())
            .map(|old| *old)
    }

    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.map.get(key)?.downcast_ref::<T>()
    }

    pub fn get_mut<T: Any>(&mut self, key: &str) -> Option<&mut T> {
        self.map.get_mut(key)?.downcast_mut::<T>()
    }

    /// Removes the entry under `key`. An entry of another type is left in place.
    pub fn remove<T: Any>(&mut self, key: &str) -> Option<T> {
        if !self.map.get(key)?.is::<T>() {
            return None;
        }
        self.map
            .remove(key)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|value| *value)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}

impl fmt::Debug for Extensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_replaces_and_returns_previous_value() {
        let mut ext = Extensions::new();
        assert_eq!(ext.insert("n", 1u32), None);
        assert_eq!(ext.insert("n", 2u32), Some(1));
        assert_eq!(ext.get::<u32>("n"), Some(&2));
    }

    #[test]
    fn replacing_with_another_type_drops_the_old_value() {
        let mut ext = Extensions::new();
        ext.insert("k", 1u8);
        assert_eq!(ext.insert("k", "text".to_owned()), None);
        assert_eq!(ext.get::<String>("k").map(String::as_str), Some("text"));
        assert_eq!(ext.get::<u8>("k"), None);
    }

    #[test]
    fn remove_with_wrong_type_keeps_entry() {
        let mut ext = Extensions::new();
        ext.insert("k", 7i64);
        assert_eq!(ext.remove::<u8>("k"), None);
        assert!(ext.contains_key("k"));
        assert_eq!(ext.remove::<i64>("k"), Some(7));
        assert!(ext.is_empty());
    }

    #[test]
    fn get_mut_updates_in_place() {
        let mut ext = Extensions::new();
        ext.insert("hits", Vec::<&'static str>::new());
        ext.get_mut::<Vec<&'static str>>("hits").unwrap().push("a");
        assert_eq!(ext.get::<Vec<&'static str>>("hits").unwrap(), &["a"]);
        assert_eq!(ext.len(), 1);
    }
}
