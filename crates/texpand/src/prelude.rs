//! Texpand prelude.

/// Result type used throughout Texpand.
///
/// Errors are boxed so that the happy path stays small.
pub type Result<T> = std::result::Result<T, Box<crate::error::Error>>;
