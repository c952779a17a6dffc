use crate::prelude as txl;
use crate::token;
use crate::traits::*;
use crate::vm;

/// When parsed, this type consumes an optional `by` keyword from the input stream.
///
/// Leading spaces are skipped.
#[derive(Debug, PartialEq, Eq)]
pub struct OptionalBy;

impl<S: TexlangState> Parsable<S> for OptionalBy {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        while get_optional_element![
            input,
            token::Value::Space(_) => (),
        ]
        .is_some()
        {}
        let next_is_b = get_optional_element![
            input,
            token::Value::Letter('b') => (),
            token::Value::Letter('B') => (),
        ];
        if next_is_b.is_some() {
            get_required_element![
                input,
                "the second letter of the `by` keyword",
                "the `by` keyword consists of a b or B letter token, then a y or Y letter token",
                token::Value::Letter('y') => OptionalBy,
                token::Value::Letter('Y') => OptionalBy,
            ]
        } else {
            Ok(OptionalBy)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::testing::*;

    parse_success_tests![
        (empty, "", OptionalBy),
        (lower_case, "by", OptionalBy),
        (upper_case, "BY", OptionalBy),
        (mixed_case, "bY", OptionalBy),
        (leading_spaces, "   by", OptionalBy),
        (absent, "5", OptionalBy),
    ];

    parse_failure_tests![
        OptionalBy,
        [],
        (missing_y, "bz"),
        (b_at_end, "b"),
    ];
}
