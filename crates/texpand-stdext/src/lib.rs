//! Texpand standard library extensions
//!
//! This crate contains generic data structures and algorithms used by the Texpand engine.
//! None of the code here knows anything about TeX.

pub mod algorithms {
    pub mod spellcheck;
    pub mod substringsearch;
}

pub mod collections {
    pub mod groupingmap;
    pub mod interner;
}
