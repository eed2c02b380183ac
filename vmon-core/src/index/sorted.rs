//! Sorted sequence with binary-search lookup.

use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;

/// An element that knows the key its sequence is ordered by.
pub trait SortKey {
    type Key: Ord + ?Sized;

    fn sort_key(&self) -> &Self::Key;
}

/// A vector kept sorted by [`SortKey::sort_key`].
///
/// Every constructor and insertion goes through the same comparator that
/// [`SortedVec::find`] searches with, so lookups are always valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SortedVec<T> {
    items: Vec<T>,
}

impl<T: SortKey> SortedVec<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    fn position(&self, key: &T::Key) -> Result<usize, usize> {
        self.items.binary_search_by(|item| item.sort_key().cmp(key))
    }

    /// Binary search for the element with the given key.
    pub fn find(&self, key: &T::Key) -> Option<&T> {
        self.position(key).ok().map(|idx| &self.items[idx])
    }

    pub fn find_mut(&mut self, key: &T::Key) -> Option<&mut T> {
        match self.position(key) {
            Ok(idx) => Some(&mut self.items[idx]),
            Err(_) => None,
        }
    }

    /// Insert `item` at its sorted position, replacing an element with an equal key.
    ///
    /// Returns the replaced element, if any.
    pub fn insert(&mut self, item: T) -> Option<T> {
        match self.position(item.sort_key()) {
            Ok(idx) => Some(std::mem::replace(&mut self.items[idx], item)),
            Err(idx) => {
                self.items.insert(idx, item);
                None
            }
        }
    }

    /// Return the element with `key`, inserting the one built by `make` if absent.
    ///
    /// The boolean is `true` when an insertion happened. Lookup and insertion
    /// share one search, so there is no window between "check" and "insert".
    pub fn get_or_insert_with(&mut self, key: &T::Key, make: impl FnOnce() -> T) -> (&mut T, bool) {
        match self.position(key) {
            Ok(idx) => (&mut self.items[idx], false),
            Err(idx) => {
                let item = make();
                debug_assert!(item.sort_key().cmp(key) == Ordering::Equal);
                self.items.insert(idx, item);
                (&mut self.items[idx], true)
            }
        }
    }

    pub fn remove(&mut self, key: &T::Key) -> Option<T> {
        self.position(key).ok().map(|idx| self.items.remove(idx))
    }

    pub fn retain(&mut self, keep: impl FnMut(&T) -> bool) {
        self.items.retain(keep);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn is_sorted(&self) -> bool {
        self.items.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
    }
}

impl<T: SortKey> Default for SortedVec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SortKey> From<Vec<T>> for SortedVec<T> {
    fn from(mut items: Vec<T>) -> Self {
        items.sort_by(|a, b| a.sort_key().cmp(b.sort_key()));
        // Later duplicates win, matching `insert`.
        let mut deduped: Vec<T> = Vec::with_capacity(items.len());
        for item in items {
            match deduped.last_mut() {
                Some(last) if last.sort_key() == item.sort_key() => *last = item,
                _ => deduped.push(item),
            }
        }
        Self { items: deduped }
    }
}

impl<T: SortKey> FromIterator<T> for SortedVec<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from(iter.into_iter().collect::<Vec<_>>())
    }
}

impl<'a, T> IntoIterator for &'a SortedVec<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'de, T> Deserialize<'de> for SortedVec<T>
where
    T: SortKey + Deserialize<'de>,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Named {
        name: String,
        value: u32,
    }

    impl SortKey for Named {
        type Key = str;

        fn sort_key(&self) -> &str {
            &self.name
        }
    }

    fn named(name: &str, value: u32) -> Named {
        Named { name: name.to_string(), value }
    }

    #[test]
    fn test_from_vec_sorts_and_finds() {
        let seq: SortedVec<Named> =
            vec![named("delta", 4), named("alpha", 1), named("charlie", 3), named("bravo", 2)]
                .into();

        assert!(seq.is_sorted());
        for (name, value) in [("alpha", 1), ("bravo", 2), ("charlie", 3), ("delta", 4)] {
            assert_eq!(seq.find(name).map(|n| n.value), Some(value));
        }
        assert!(seq.find("echo").is_none());
        assert!(seq.find("").is_none());
    }

    #[test]
    fn test_insert_keeps_order() {
        let mut seq = SortedVec::new();
        for name in ["m", "c", "x", "a", "q", "c"] {
            seq.insert(named(name, 0));
            assert!(seq.is_sorted());
        }
        assert_eq!(seq.len(), 5);
    }

    #[test]
    fn test_get_or_insert_with_inserts_once() {
        let mut seq: SortedVec<Named> = SortedVec::new();

        let (_, inserted) = seq.get_or_insert_with("b", || named("b", 1));
        assert!(inserted);
        let (item, inserted) = seq.get_or_insert_with("b", || named("b", 2));
        assert!(!inserted);
        assert_eq!(item.value, 1);
        assert_eq!(seq.len(), 1);
    }

    #[test]
    fn test_duplicates_collapse_on_build() {
        let seq: SortedVec<Named> = vec![named("a", 1), named("a", 2)].into();
        assert_eq!(seq.len(), 1);
        assert_eq!(seq.find("a").map(|n| n.value), Some(2));
    }

    #[test]
    fn test_deserialize_sorts() {
        let seq: SortedVec<Named> =
            serde_json::from_str(r#"[{"name":"z","value":1},{"name":"a","value":2}]"#).unwrap();
        assert!(seq.is_sorted());
        assert_eq!(seq.as_slice()[0].name, "a");
    }
}
