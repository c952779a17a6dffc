//! String interning
//!
//! An interner represents strings as small integer keys.
//! Only one copy of each distinct string is stored and key comparisons are integer comparisons.
//! Interned strings are never deallocated.
//!
//! ```
//! # use texpand_stdext::collections::interner::Interner;
//! let mut interner: Interner = Default::default();
//! let relax_1 = interner.get_or_intern("relax");
//! let par = interner.get_or_intern("par");
//! let relax_2 = interner.get_or_intern("relax");
//! assert_eq!(relax_1, relax_2);
//! assert_ne!(relax_1, par);
//!
//! assert_eq!(interner.resolve(relax_1), Some("relax"));
//! assert_eq!(interner.get("par"), Some(par));
//! assert_eq!(interner.get("fi"), None);
//! ```
//!
//! All strings live in a single [String] buffer.
//! A vector records the end offset of each string, and the key of a string is its position in
//!     that vector.
//! Deduplication uses a map from the [u64] hash of a string to the keys with that hash,
//!     so that the strings themselves are not stored twice.

use std::collections::hash_map;
use std::collections::HashMap;
use std::hash;
use std::num;

/// Types implementing this trait can be used as keys in the [Interner].
pub trait Key: Copy + Eq {
    /// Try to create a key from the provided index. The first string interned gets index 0.
    fn try_from_usize(index: usize) -> Option<Self>;

    /// Convert the key back into its index.
    fn into_usize(self) -> usize;
}

impl Key for num::NonZeroU32 {
    fn try_from_usize(index: usize) -> Option<Self> {
        let index: u32 = index.try_into().ok()?;
        num::NonZeroU32::new(index.checked_add(1)?)
    }

    fn into_usize(self) -> usize {
        self.get() as usize - 1
    }
}

impl Key for num::NonZeroU16 {
    fn try_from_usize(index: usize) -> Option<Self> {
        let index: u16 = index.try_into().ok()?;
        num::NonZeroU16::new(index.checked_add(1)?)
    }

    fn into_usize(self) -> usize {
        self.get() as usize - 1
    }
}

/// String interner.
///
/// See the module documentation for information about this data structure.
pub struct Interner<K = num::NonZeroU32, S = hash_map::RandomState> {
    buffer: String,
    ends: Vec<usize>,
    dedup: HashMap<u64, Vec<K>>,
    hash_builder: S,
}

impl<K, S: Default> Default for Interner<K, S> {
    fn default() -> Self {
        Self {
            buffer: Default::default(),
            ends: Default::default(),
            dedup: Default::default(),
            hash_builder: Default::default(),
        }
    }
}

impl<K: Key, S: hash::BuildHasher> Interner<K, S> {
    /// Intern the provided string and return its key.
    ///
    /// # Panics
    ///
    /// Panics if the key type cannot represent any more strings.
    /// Use [try_get_or_intern](Interner::try_get_or_intern) to handle this case.
    pub fn get_or_intern(&mut self, s: &str) -> K {
        match self.try_get_or_intern(s) {
            Some(key) => key,
            None => panic!(
                "interner key space exhausted after {} strings",
                self.ends.len()
            ),
        }
    }

    /// Intern the provided string, returning `None` if the key space is exhausted.
    pub fn try_get_or_intern(&mut self, s: &str) -> Option<K> {
        let hash = self.hash_builder.hash_one(s);
        if let Some(key) = self.get_internal(s, hash) {
            return Some(key);
        }
        let key = K::try_from_usize(self.ends.len())?;
        self.buffer.push_str(s);
        self.ends.push(self.buffer.len());
        self.dedup.entry(hash).or_default().push(key);
        Some(key)
    }

    /// Get the key for the provided string if it has been already been interned.
    pub fn get(&self, s: &str) -> Option<K> {
        self.get_internal(s, self.hash_builder.hash_one(s))
    }

    fn get_internal(&self, s: &str, hash: u64) -> Option<K> {
        self.dedup
            .get(&hash)?
            .iter()
            .copied()
            .find(|key| self.resolve(*key) == Some(s))
    }

    /// Return the interned string corresponding to the provided key.
    pub fn resolve(&self, k: K) -> Option<&str> {
        let i = k.into_usize();
        let end = *self.ends.get(i)?;
        let start = match i.checked_sub(1) {
            None => 0,
            Some(prev) => self.ends[prev],
        };
        Some(&self.buffer[start..end])
    }

    /// Return the number of distinct strings interned.
    pub fn len(&self) -> usize {
        self.ends.len()
    }

    /// Return whether no strings have been interned.
    pub fn is_empty(&self) -> bool {
        self.ends.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FixedHasher;

    impl hash::Hasher for FixedHasher {
        fn finish(&self) -> u64 {
            12
        }

        fn write(&mut self, _: &[u8]) {}
    }

    #[test]
    fn hash_collision() {
        let mut interner: Interner<num::NonZeroU32, hash::BuildHasherDefault<FixedHasher>> =
            Default::default();
        let hello_1 = interner.get_or_intern("hello");
        let world_1 = interner.get_or_intern("world");
        let hello_2 = interner.get_or_intern("hello");
        assert_eq!(hello_1, hello_2);
        assert_ne!(hello_1, world_1);
        assert_eq!(interner.resolve(hello_1), Some("hello"));
        assert_eq!(interner.resolve(world_1), Some("world"));
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn empty_string() {
        let mut interner: Interner = Default::default();
        let empty = interner.get_or_intern("");
        let a = interner.get_or_intern("a");
        assert_eq!(interner.resolve(empty), Some(""));
        assert_eq!(interner.resolve(a), Some("a"));
    }

    #[test]
    fn exhausted_key_space() {
        let mut interner: Interner<num::NonZeroU16> = Default::default();
        for i in 0..(u16::MAX as usize) {
            assert!(interner.try_get_or_intern(&i.to_string()).is_some());
        }
        assert_eq!(interner.try_get_or_intern("one more"), None);
        assert!(interner.try_get_or_intern("0").is_some());
    }
}
