//! The optional `=` in assignments like `\count 1 = 5`.

use crate::prelude as txl;
use crate::traits::*;
use crate::*;

/// Consumes an optional equals sign, with the input being expanded.
///
/// Any number of spaces may come before the sign and one space may come after it.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionalEquals;

impl<S: TexlangState> Parsable<S> for OptionalEquals {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        skip_optional_equals(input)?;
        Ok(OptionalEquals)
    }
}

/// Like [OptionalEquals], but the input is not expanded.
///
/// Used by `\let`, whose target must not be expanded.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionalEqualsUnexpanded;

impl<S: TexlangState> Parsable<S> for OptionalEqualsUnexpanded {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        skip_optional_equals(input.unexpanded())?;
        Ok(OptionalEqualsUnexpanded)
    }
}

fn skip_optional_equals<I: TokenStream>(input: &mut I) -> txl::Result<()> {
    loop {
        let found = get_optional_element![
            input,
            token::Value::Space(_) => false,
            token::Value::Other('=') => true,
        ];
        match found {
            None => return Ok(()),
            Some(false) => continue,
            Some(true) => {
                get_optional_element![input, token::Value::Space(_) => ()];
                return Ok(());
            }
        }
    }
}
