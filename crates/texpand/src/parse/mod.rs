//! Reading TeX grammar elements out of the input.
//!
//! Every grammar element is a Rust type implementing [Parsable].
//! Tuples of parsable types are parsable too, so the `<integer><relation><integer>`
//!     argument of `\ifnum` is read by a single call on `(i32, parse::Relation, i32)`.
//!
//! Optional pieces of syntax, like the `by` keyword or an equals sign before a value,
//!     have their own types ([OptionalBy], [OptionalEquals]) which parse to nothing
//!     when the syntax is absent.

#[macro_use]
mod helpers;

mod filelocation;
mod keyword;
mod number;
mod relation;
#[cfg(test)]
mod testing;
mod variable;

pub use filelocation::FileLocation;
pub use keyword::OptionalBy;
pub use number::Uint;
pub use relation::Relation;
pub use variable::OptionalEquals;
pub use variable::OptionalEqualsUnexpanded;

use crate::error;
use crate::prelude as txl;
use crate::token;
use crate::token::trace;
use crate::traits::*;
use crate::vm;

/// Implementations of this trait are elements of the TeX grammar than can be parsed from a stream of tokens.
pub trait Parsable<S: TexlangState>: Sized {
    /// Parses a value from an input stream.
    ///
    /// This method just delegates to [Parsable::parse_impl].
    #[inline]
    fn parse<I>(input: &mut I) -> txl::Result<Self>
    where
        I: AsMut<vm::ExpandedStream<S>>,
    {
        Parsable::parse_impl(input.as_mut())
    }

    /// Parses a value from the [vm::ExpandedStream].
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self>;
}

/// Error returned when the input does not match the grammar element being parsed.
#[derive(Debug)]
pub struct Error {
    pub expected: String,
    pub got: trace::SourceCodeTrace,
    pub got_override: String,
    pub annotation_override: String,
    pub guidance: String,
}

impl error::TexError for Error {
    fn kind(&self) -> error::Kind {
        match self.got.token {
            None => error::Kind::EndOfInput(&self.got),
            Some(_) => error::Kind::Token(&self.got),
        }
    }

    fn category(&self) -> error::Category {
        error::Category::Syntax
    }

    fn title(&self) -> String {
        let got = if self.got_override.is_empty() {
            match self.got.token {
                None => "the input ended".to_string(),
                Some(token) => match token.value() {
                    token::Value::Letter(c) => format!["found the letter {c}"],
                    token::Value::Other(c) => format!["found a non-letter character {c}"],
                    _ => match (token.char(), token.cat_code()) {
                        (Some(c), Some(code)) => {
                            format!["found a token with value {c} and category code {code}"]
                        }
                        _ => format!("found the control sequence {}", self.got.value),
                    },
                },
            }
        } else {
            self.got_override.clone()
        };
        format!["expected {}, instead {}", self.expected, got]
    }

    fn notes(&self) -> Vec<error::display::Note> {
        if self.guidance.is_empty() {
            return vec![];
        }
        vec![self.guidance.clone().into()]
    }

    fn source_annotation(&self) -> String {
        if !self.annotation_override.is_empty() {
            return self.annotation_override.clone();
        }
        error::TexError::default_source_annotation(self)
    }
}

impl Error {
    pub fn new<S, T: Into<String>, R: Into<String>>(
        vm: &vm::VM<S>,
        expected: T,
        got: Option<token::Token>,
        guidance: R,
    ) -> Self {
        let got = match got {
            None => vm.trace_end_of_input(),
            Some(token) => vm.trace(token),
        };
        Error {
            expected: expected.into(),
            got,
            got_override: "".into(),
            annotation_override: "".into(),
            guidance: guidance.into(),
        }
    }

    pub fn with_got_override<T: Into<String>>(mut self, got_override: T) -> Self {
        self.got_override = got_override.into();
        self
    }

    pub fn with_annotation_override<T: Into<String>>(mut self, annotation_override: T) -> Self {
        self.annotation_override = annotation_override.into();
        self
    }
}

macro_rules! generate_tuple_impls {
    ( $first: ident ) => {};
    ( $first: ident, $( $name: ident ),+ ) => {
        generate_tuple_impls![ $( $name ),+];

        impl<S: TexlangState, $first : Parsable<S>, $( $name : Parsable<S> ),+> Parsable<S> for ($first, $( $name ),+) {
            fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
                Ok(($first::parse(input)?, $( $name::parse(input)? ),+))
            }
        }
    };
}

generate_tuple_impls![T1, T2, T3, T4, T5];

impl<S: TexlangState> Parsable<S> for token::CommandRef {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        while get_optional_element![
            input.unexpanded(),
            token::Value::Space(_) => (),
        ]
        .is_some()
        {}
        get_required_element![
            input.unexpanded(),
            "a control sequence or active character",
            "a command must be a control sequence or an active character",
            token::Value::CommandRef(command_ref) => command_ref,
        ]
    }
}

/// Parses balanced tokens from the stream.
///
/// The opening brace is assumed to have been consumed already.
/// The matching closing brace is consumed and not added to the result.
/// Returns false if the input ended before balanced tokens completed.
pub fn parse_balanced_tokens<S: TokenStream>(
    stream: &mut S,
    result: &mut Vec<token::Token>,
) -> txl::Result<bool> {
    let mut scope_depth = 0_usize;
    while let Some(token) = stream.next()? {
        match token.value() {
            token::Value::BeginGroup(_) => {
                scope_depth += 1;
            }
            token::Value::EndGroup(_) => {
                if scope_depth == 0 {
                    return Ok(true);
                }
                scope_depth -= 1;
            }
            _ => (),
        }
        result.push(token);
    }
    Ok(false)
}

/// Like [parse_balanced_tokens], but fails if the input ends before the tokens are balanced.
pub fn finish_parsing_balanced_tokens<S: TokenStream>(
    stream: &mut S,
    result: &mut Vec<token::Token>,
) -> txl::Result<()> {
    if parse_balanced_tokens(stream, result)? {
        return Ok(());
    }
    Err(error::SimpleEndOfInputError::new(
        stream.vm(),
        "the input ended while parsing a balanced list of tokens",
    )
    .with_note("a list of tokens that begins with a begin group character like { must end with a matching end group character like }")
    .into())
}

/// Parses a braced list of tokens without expansion.
///
/// Leading spaces are skipped.
/// The outer braces are not included in the result.
pub fn parse_braced_tokens<S: TexlangState>(
    stream: &mut vm::UnexpandedStream<S>,
    result: &mut Vec<token::Token>,
) -> txl::Result<()> {
    loop {
        let token = stream.next()?;
        match token.map(|token| token.value()) {
            Some(token::Value::BeginGroup(_)) => break,
            Some(token::Value::Space(_)) => continue,
            _ => {
                if let Some(token) = token {
                    stream.back(token);
                }
                return Err(Error::new(
                    stream.vm(),
                    "an opening brace",
                    token,
                    "a list of tokens must be surrounded by braces",
                )
                .into());
            }
        }
    }
    finish_parsing_balanced_tokens(stream, result)
}
