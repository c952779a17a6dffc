//! # Texpand: a TeX-style expansion engine.
//!
//! This crate implements the core of a TeX language interpreter:
//!     the lexer, the stack of token sources,
//!     the group-scoped [Context](context::Context),
//!     the expansion loop and the conditional stack machine.
//!
//! Primitives are not part of the engine.
//! A host registers them in the [command map](command::Map) as
//!     expandable, executable or assignable [commands](command::Command).
//! The `texpand-stdlib` crate contains a catalog of such primitives.

extern crate texpand_stdext;

pub mod command;
pub mod conditional;
pub mod context;
pub mod error;
pub mod parse;
pub mod prelude;
pub mod texmacro;
pub mod token;
pub mod variable;
pub mod vm;

/// Module that re-exports all of the crate's traits.
///
/// This is useful for getting all of the traits in scope in a Rust module:
/// ```
/// use texpand::traits::*;
/// ```
pub mod traits {
    pub use super::error::TexError;
    pub use super::parse::Parsable;
    pub use super::vm::HasComponent;
    pub use super::vm::TexlangState;
    pub use super::vm::TokenStream;
}
