//! Containers whose mutations are rolled back at the end of each group.
//!
//! The wrapper type [GroupingContainer] adds grouping semantics to any associative
//! container satisfying the [BackingContainer] trait.
//! A group is started with [begin_group](GroupingContainer::begin_group) and finished with
//! [end_group](GroupingContainer::end_group).
//! Every local mutation performed during the group is undone when the group ends.
//!
//! Each open group owns an undo log.
//! The first local mutation of a key inside a group appends the key's previous value
//!     (or the fact that it was absent) to the log.
//! Later mutations of the same key in the same group leave the log alone, so ending the group
//!     restores the value the key had when the group began.
//! Ending a group replays its log in reverse order of recording.
//!
//! A global mutation bypasses the logs: it purges every pending undo record for the key in
//!     all open groups, so no later group end can resurrect a pre-global value.
//!
//! The module provides implementations where the backing container is a
//! [HashMap] ([GroupingHashMap]) and a vector ([GroupingVec]).
//!
//! # Examples
//!
//! ```
//! # use texpand_stdext::collections::groupingmap::GroupingHashMap;
//! # use texpand_stdext::collections::groupingmap::Scope;
//! let mut registers = GroupingHashMap::default();
//! registers.insert("count0", 1, Scope::Local);
//! registers.begin_group();
//! registers.insert("count0", 2, Scope::Local);
//! registers.insert("count0", 3, Scope::Local);
//! assert_eq!(registers.get(&"count0"), Some(&3));
//! assert_eq!(registers.end_group(), Ok(()));
//! assert_eq!(registers.get(&"count0"), Some(&1));
//! ```
//! Keys first defined inside a group disappear when the group ends.
//! ```
//! # use texpand_stdext::collections::groupingmap::GroupingHashMap;
//! # use texpand_stdext::collections::groupingmap::Scope;
//! let mut registers = GroupingHashMap::default();
//! registers.begin_group();
//! registers.insert("count1", 7, Scope::Local);
//! assert_eq!(registers.end_group(), Ok(()));
//! assert_eq!(registers.get(&"count1"), None);
//! ```
//! Global insertions survive every enclosing group.
//! ```
//! # use texpand_stdext::collections::groupingmap::GroupingHashMap;
//! # use texpand_stdext::collections::groupingmap::Scope;
//! let mut registers = GroupingHashMap::default();
//! registers.insert("count2", 1, Scope::Local);
//! registers.begin_group();
//! registers.begin_group();
//! registers.insert("count2", 5, Scope::Global);
//! assert_eq!(registers.end_group(), Ok(()));
//! assert_eq!(registers.end_group(), Ok(()));
//! assert_eq!(registers.get(&"count2"), Some(&5));
//! ```
//! The `end_group` method returns an error if there is no group to end.
//! ```
//! # use texpand_stdext::collections::groupingmap::GroupingHashMap;
//! # use texpand_stdext::collections::groupingmap::NoGroupToEndError;
//! let mut registers = GroupingHashMap::<String, i32>::default();
//! assert_eq!(registers.end_group(), Err(NoGroupToEndError{}));
//! ```
use std::collections::HashMap;
use std::collections::HashSet;
use std::hash::Hash;

/// Trait for containers that can be wrapped using [GroupingContainer].
pub trait BackingContainer<K, V>: Default {
    /// Set the value at the provided key, returning the previous value if there was one.
    fn insert(&mut self, k: K, v: V) -> Option<V>;

    /// Get a reference to the value at the provided key, or `None` if the value doesn't exist.
    fn get(&self, k: &K) -> Option<&V>;

    /// Remove the value with the provided key, returning it if it existed.
    fn remove(&mut self, k: &K) -> Option<V>;

    /// Type of iterator returned by the [BackingContainer::iter] method.
    type Iter<'a>: Iterator<Item = (K, &'a V)>
    where
        V: 'a,
        Self: 'a;

    /// Iterate over all (key, value) tuples in the container.
    fn iter(&self) -> Self::Iter<'_>;

    /// Return the number of elements in the container.
    fn len(&self) -> usize;

    /// Return whether the container is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V> BackingContainer<K, V> for HashMap<K, V> {
    #[inline]
    fn insert(&mut self, k: K, v: V) -> Option<V> {
        HashMap::insert(self, k, v)
    }
    #[inline]
    fn get(&self, k: &K) -> Option<&V> {
        HashMap::get(self, k)
    }
    #[inline]
    fn remove(&mut self, k: &K) -> Option<V> {
        HashMap::remove(self, k)
    }
    type Iter<'a> = std::iter::Map<
        std::collections::hash_map::Iter<'a, K, V>,
        fn(i: (&'a K, &'a V)) -> (K, &'a V)
    > where K: 'a, V: 'a;
    fn iter(&self) -> Self::Iter<'_> {
        HashMap::iter(self).map(clone_key)
    }
    fn len(&self) -> usize {
        HashMap::len(self)
    }
}

fn clone_key<'a, K: Clone, V>(i: (&'a K, &'a V)) -> (K, &'a V) {
    (i.0.clone(), i.1)
}

impl<V> BackingContainer<usize, V> for Vec<Option<V>> {
    #[inline]
    fn insert(&mut self, k: usize, v: V) -> Option<V> {
        if k >= self.len() {
            self.resize_with(k + 1, Default::default);
        }
        self[k].replace(v)
    }

    #[inline]
    fn get(&self, k: &usize) -> Option<&V> {
        <[Option<V>]>::get(self, *k).and_then(Option::as_ref)
    }

    #[inline]
    fn remove(&mut self, k: &usize) -> Option<V> {
        <[Option<V>]>::get_mut(self, *k).and_then(Option::take)
    }

    type Iter<'a> = std::iter::FilterMap<
        std::iter::Enumerate<std::slice::Iter<'a, Option<V>>>,
        fn(i: (usize, &'a Option<V>)) -> Option<(usize, &'a V)>
    > where V: 'a;
    fn iter(&self) -> Self::Iter<'_> {
        <[Option<V>]>::iter(self)
            .enumerate()
            .filter_map(|(k, v)| v.as_ref().map(|v| (k, v)))
    }

    fn len(&self) -> usize {
        <[Option<V>]>::iter(self).filter(|v| v.is_some()).count()
    }
}

/// Scope is used in the insertion method to determine the scope to insert at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Insertions in the local scope are rolled back at the end of the current group.
    Local,
    /// Insertions in the global scope erase pending rollbacks for the same key, and
    /// persist beyond the end of the current groups.
    Global,
}

/// What to do with a key when the group that recorded it ends.
#[derive(Debug, PartialEq, Eq)]
enum Undo<V> {
    Revert(V),
    Delete,
}

/// The undo log of a single open group.
#[derive(Debug)]
struct Frame<K, V> {
    log: Vec<(K, Undo<V>)>,
    recorded: HashSet<K>,
}

impl<K, V> Default for Frame<K, V> {
    fn default() -> Self {
        Self {
            log: Vec::new(),
            recorded: HashSet::new(),
        }
    }
}

/// Error returned if there is no group to end when [GroupingContainer::end_group] is invoked.
#[derive(Debug, PartialEq, Eq)]
pub struct NoGroupToEndError;

impl std::fmt::Display for NoGroupToEndError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "there is no group to end")
    }
}

impl std::error::Error for NoGroupToEndError {}

/// A wrapper around [BackingContainer] types that adds group semantics.
///
/// See the module docs for more information.
#[derive(Debug)]
pub struct GroupingContainer<K, V, T> {
    backing_container: T,
    // The global group is not in this stack as nothing is undone there.
    frames: Vec<Frame<K, V>>,
}

/// A grouping container based on the [HashMap] type.
pub type GroupingHashMap<K, V> = GroupingContainer<K, V, HashMap<K, V>>;

/// A grouping container based on the [Vec] type.
///
/// The vector is given map semantics with keys of type [usize], which are used as
/// indices for the vector.
pub type GroupingVec<V> = GroupingContainer<usize, V, Vec<Option<V>>>;

impl<K: Eq + Hash + Clone, V, T: BackingContainer<K, V>> GroupingContainer<K, V, T> {
    /// Inserts the key, value pair in the provided scope.
    ///
    /// Returns true if the key already had a value.
    pub fn insert(&mut self, key: K, val: V, scope: Scope) -> bool {
        match scope {
            Scope::Local => {
                let old = self.backing_container.insert(key.clone(), val);
                let existed = old.is_some();
                if let Some(frame) = self.frames.last_mut() {
                    if frame.recorded.insert(key.clone()) {
                        let undo = match old {
                            None => Undo::Delete,
                            Some(old) => Undo::Revert(old),
                        };
                        frame.log.push((key, undo));
                    }
                }
                existed
            }
            Scope::Global => {
                for frame in &mut self.frames {
                    if frame.recorded.remove(&key) {
                        frame.log.retain(|(k, _)| k != &key);
                    }
                }
                self.backing_container.insert(key, val).is_some()
            }
        }
    }

    /// Removes the key in the provided scope.
    ///
    /// A local removal is undone at the end of the current group like any other local mutation.
    pub fn remove(&mut self, key: &K, scope: Scope) -> bool {
        match scope {
            Scope::Local => {
                let old = self.backing_container.remove(key);
                let existed = old.is_some();
                if let (Some(old), Some(frame)) = (old, self.frames.last_mut()) {
                    if frame.recorded.insert(key.clone()) {
                        frame.log.push((key.clone(), Undo::Revert(old)));
                    }
                }
                existed
            }
            Scope::Global => {
                for frame in &mut self.frames {
                    if frame.recorded.remove(key) {
                        frame.log.retain(|(k, _)| k != key);
                    }
                }
                self.backing_container.remove(key).is_some()
            }
        }
    }

    /// Retrieves the value at the provided key.
    #[inline]
    pub fn get(&self, key: &K) -> Option<&V> {
        self.backing_container.get(key)
    }

    /// Begins a new group.
    pub fn begin_group(&mut self) {
        self.frames.push(Default::default());
    }

    /// Attempts to end the current group. Returns an error if there is no group to end.
    pub fn end_group(&mut self) -> Result<(), NoGroupToEndError> {
        let frame = self.frames.pop().ok_or(NoGroupToEndError {})?;
        for (key, undo) in frame.log.into_iter().rev() {
            match undo {
                Undo::Delete => {
                    self.backing_container.remove(&key);
                }
                Undo::Revert(old) => {
                    self.backing_container.insert(key, old);
                }
            }
        }
        Ok(())
    }

    /// Returns the number of groups currently open.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Returns the number of undo records pending in the innermost group.
    pub fn pending_undos(&self) -> usize {
        self.frames.last().map(|f| f.log.len()).unwrap_or(0)
    }

    /// Extends the container with (key, value) pairs inserted in the local scope.
    /// ```
    /// # use texpand_stdext::collections::groupingmap::*;
    /// let mut registers = GroupingHashMap::default();
    /// registers.extend([("count0", 1), ("count1", 2)]);
    /// assert_eq!(registers.get(&"count0"), Some(&1));
    /// assert_eq!(registers.get(&"count1"), Some(&2));
    /// ```
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, val) in iter {
            self.insert(key, val, Scope::Local);
        }
    }

    /// Gets an immutable reference to the backing container.
    ///
    /// There is no mutable variant as mutations through it could not be rolled back.
    #[inline]
    pub fn backing_container(&self) -> &T {
        &self.backing_container
    }

    /// Iterate over all (key, value) tuples that are currently visible.
    pub fn iter(&self) -> T::Iter<'_> {
        self.backing_container.iter()
    }

    /// Returns the number of elements in the container.
    pub fn len(&self) -> usize {
        self.backing_container.len()
    }

    /// Returns whether the container is empty.
    pub fn is_empty(&self) -> bool {
        self.backing_container.is_empty()
    }
}

impl<K, V, T: Default> Default for GroupingContainer<K, V, T> {
    fn default() -> Self {
        Self {
            backing_container: Default::default(),
            frames: Default::default(),
        }
    }
}

impl<K: Eq + Hash + Clone, V, T: BackingContainer<K, V>> FromIterator<(K, V)>
    for GroupingContainer<K, V, T>
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map: Self = GroupingContainer::default();
        for (k, v) in iter {
            map.backing_container.insert(k, v);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_after_nested_insert() {
        let mut map = GroupingHashMap::default();
        map.begin_group();
        map.insert(3, 5, Scope::Local);
        assert_eq!(map.end_group(), Ok(()));
        assert_eq!(map.get(&3), None);
        map.insert(3, 4, Scope::Local);
        assert_eq!(map.get(&3), Some(&4));
    }

    #[test]
    fn insert_global_after_no_insert() {
        let mut map = GroupingHashMap::default();
        map.begin_group();
        map.insert(3, 5, Scope::Global);
        assert_eq!(map.end_group(), Ok(()));
        assert_eq!(map.get(&3), Some(&5));
    }

    #[test]
    fn many_mutations_restore_value_at_group_entry() {
        for n in 0..20 {
            let mut map = GroupingHashMap::default();
            map.insert("k", -1, Scope::Local);
            map.begin_group();
            for i in 0..n {
                map.insert("k", i, Scope::Local);
                assert_eq!(map.get(&"k"), Some(&i));
            }
            assert_eq!(map.pending_undos(), if n == 0 { 0 } else { 1 });
            map.end_group().unwrap();
            assert_eq!(map.get(&"k"), Some(&-1), "n={n}");
        }
    }

    #[test]
    fn undo_log_replays_in_reverse() {
        let mut map = GroupingVec::default();
        map.insert(0, "a", Scope::Local);
        map.begin_group();
        map.insert(1, "b", Scope::Local);
        map.insert(0, "c", Scope::Local);
        map.remove(&1, Scope::Local);
        map.insert(2, "d", Scope::Local);
        map.end_group().unwrap();
        assert_eq!(map.get(&0), Some(&"a"));
        assert_eq!(map.get(&1), None);
        assert_eq!(map.get(&2), None);
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn global_survives_many_groups() {
        let mut map = GroupingHashMap::default();
        map.insert(1, 1, Scope::Local);
        for _ in 0..5 {
            map.begin_group();
            map.insert(1, 2, Scope::Local);
        }
        map.insert(1, 3, Scope::Global);
        for _ in 0..5 {
            map.end_group().unwrap();
            assert_eq!(map.get(&1), Some(&3));
        }
    }

    #[test]
    fn local_after_global_restores_global_value() {
        let mut map = GroupingHashMap::default();
        map.insert(1, 1, Scope::Local);
        map.begin_group();
        map.begin_group();
        map.insert(1, 2, Scope::Global);
        map.insert(1, 3, Scope::Local);
        assert_eq!(map.get(&1), Some(&3));
        map.end_group().unwrap();
        assert_eq!(map.get(&1), Some(&2));
        map.end_group().unwrap();
        assert_eq!(map.get(&1), Some(&2));
    }

    #[test]
    fn global_remove() {
        let mut map = GroupingHashMap::default();
        map.insert(1, 1, Scope::Local);
        map.begin_group();
        map.insert(1, 2, Scope::Local);
        assert!(map.remove(&1, Scope::Global));
        map.end_group().unwrap();
        assert_eq!(map.get(&1), None);
    }

    #[test]
    fn depth() {
        let mut map = GroupingHashMap::<usize, usize>::default();
        assert_eq!(map.depth(), 0);
        map.begin_group();
        map.begin_group();
        assert_eq!(map.depth(), 2);
        map.end_group().unwrap();
        assert_eq!(map.depth(), 1);
    }

    #[test]
    fn vec_insert_past_end() {
        let mut map = GroupingVec::default();
        map.insert(5, 'x', Scope::Local);
        assert_eq!(map.get(&5), Some(&'x'));
        assert_eq!(map.get(&4), None);
        assert_eq!(map.get(&6), None);
        assert_eq!(map.iter().collect::<Vec<_>>(), vec![(5, &'x')]);
    }
}
