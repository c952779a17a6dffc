//! Knuth–Morris–Pratt substring search
//!
//! The search is incremental: elements of the string are fed in one at a time,
//!     so the full string does not need to be known up front.
//! This is how delimited macro arguments are matched, token by token.
//!
//! ```
//! # use texpand_stdext::algorithms::substringsearch::Matcher;
//! let matcher = Matcher::new(vec![2, 3, 2]).unwrap();
//! let mut search = matcher.start();
//! assert_eq![search.next(&1), false];
//! assert_eq![search.next(&2), false];
//! assert_eq![search.next(&3), false];
//! assert_eq![search.next(&2), true];
//! assert_eq![search.next(&3), false];
//! assert_eq![search.next(&2), true];
//! ```

/// Data structure used to match a specific substring in many strings.
#[derive(Debug, Clone)]
pub struct Matcher<T> {
    substring: Vec<T>,
    prefix_fn: Vec<usize>,
}

impl<T: PartialEq> Matcher<T> {
    /// Create a new matcher for the provided substring.
    ///
    /// Returns `None` if the substring is empty.
    pub fn new(substring: Vec<T>) -> Option<Matcher<T>> {
        if substring.is_empty() {
            return None;
        }
        let mut prefix_fn = Vec::with_capacity(substring.len());
        prefix_fn.push(0);
        let mut k = 0;
        for i in 1..substring.len() {
            while k > 0 && substring[k] != substring[i] {
                k = prefix_fn[k - 1];
            }
            if substring[k] == substring[i] {
                k += 1;
            }
            prefix_fn.push(k);
        }
        Some(Matcher {
            substring,
            prefix_fn,
        })
    }

    /// Start a new substring search.
    pub fn start(&self) -> Search<'_, T> {
        Search { matcher: self, q: 0 }
    }

    /// Get the underlying substring.
    pub fn substring(&self) -> &[T] {
        &self.substring
    }
}

impl<T: PartialEq> PartialEq for Matcher<T> {
    fn eq(&self, other: &Self) -> bool {
        self.substring == other.substring
    }
}

/// A search for the matcher's substring within one string.
pub struct Search<'a, T> {
    matcher: &'a Matcher<T>,
    q: usize,
}

impl<'a, T: PartialEq> Search<'a, T> {
    /// Provide the next element of the string.
    ///
    /// Returns true if the most recent elements match the substring.
    pub fn next(&mut self, tail: &T) -> bool {
        let substring = &self.matcher.substring;
        while self.q > 0 && &substring[self.q] != tail {
            self.q = self.matcher.prefix_fn[self.q - 1];
        }
        if &substring[self.q] == tail {
            self.q += 1;
        }
        if self.q == substring.len() {
            self.q = self.matcher.prefix_fn[self.q - 1];
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn find_all(substring: &str, string: &str) -> Vec<usize> {
        let matcher = Matcher::new(substring.chars().collect()).unwrap();
        let mut search = matcher.start();
        string
            .chars()
            .enumerate()
            .filter_map(|(i, c)| if search.next(&c) { Some(i) } else { None })
            .collect()
    }

    #[test]
    fn overlapping_matches() {
        assert_eq!(find_all("aa", "aaaa"), vec![1, 2, 3]);
    }

    #[test]
    fn partial_prefix_then_match() {
        assert_eq!(find_all("abab", "abacabab"), vec![7]);
    }

    #[test]
    fn no_match() {
        assert_eq!(find_all("xyz", "xyxyxy"), Vec::<usize>::new());
    }

    #[test]
    fn empty_substring() {
        assert!(Matcher::<u8>::new(vec![]).is_none());
    }
}
