//! Relations between integers: `<`, `=` and `>`
//!
//! A relation is a character token of category other (12) with one of the three values.
//! Spaces before the relation are skipped.

use crate::prelude as txl;
use crate::token;
use crate::token::CatCode;
use crate::traits::*;
use crate::vm;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Relation {
    Less,
    #[default]
    Equal,
    Greater,
}

impl Relation {
    /// Returns whether `lhs <relation> rhs` is true.
    pub fn holds<T: Ord>(self, lhs: T, rhs: T) -> bool {
        let want = match self {
            Relation::Less => std::cmp::Ordering::Less,
            Relation::Equal => std::cmp::Ordering::Equal,
            Relation::Greater => std::cmp::Ordering::Greater,
        };
        lhs.cmp(&rhs) == want
    }
}

impl<S: TexlangState> Parsable<S> for Relation {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        while get_optional_element![input, token::Value::Space(_) => ()].is_some() {}
        get_required_element![
            input,
            "a relation",
            format!["a relation is one of <, = or > with category code {}", CatCode::Other],
            token::Value::Other('<') => Relation::Less,
            token::Value::Other('=') => Relation::Equal,
            token::Value::Other('>') => Relation::Greater,
        ]
    }
}
