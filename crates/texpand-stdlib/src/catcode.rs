//! The `\catcode` primitive

use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const CATCODE_DOC: &str = "Get or set a catcode register";

/// Get the `\catcode` command.
///
/// The category codes live in the [Context](context::Context), so the lexer
///     sees a new category code as soon as the assignment is done.
pub fn get_catcode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_array(catcode_key))
        .with_doc(CATCODE_DOC)
}

fn catcode_key<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpandedStream<S>,
) -> txl::Result<context::Key> {
    Ok(context::Key::CatCode(char::parse(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::testutil::*;
    use crate::the;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("catcode", get_catcode()),
            ("def", def::get_def()),
            ("the", the::get_the()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (catcode_base_case, r"\catcode 48 11 \the\catcode 48", r"11"),
            (
                grouping,
                r"{\catcode 48 11 \the\catcode 48}\the\catcode 48",
                r"1112"
            ),
            (catcode_default, r"\the\catcode 48", r"12"),
            (catcode_default_letter, r"\the\catcode `\a", r"11"),
            (catcode_default_escape, r"\the\catcode `\\", r"0"),
            (catcode_high_character, r"\catcode 480 11 \the\catcode 480", r"11"),
            (
                new_escape_character,
                r"\catcode `\! = 0 !def!A{x}\A",
                r"x"
            ),
            (
                new_begin_and_end_group,
                r"\catcode`\[=1 \catcode`\]=2 \def\A[x]\A",
                r"x"
            ),
            (
                letter_becomes_other,
                r"\def\ab{x}\catcode`\b=12 \def\a{y}\ab",
                r"y\catcode`\b=12 b"
            ),
            (
                texbook_exercise_20_7,
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 \def\!!1#2![{!#]#!!2}\! x{[y]][z}",
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 {#]![y][z}",
            ),
        ),
        failure_tests(
            (catcode_value_too_large, r"\catcode 48 16"),
            (catcode_value_is_negative_large, r"\catcode 48 -1"),
            (catcode_index_not_a_character, r"\catcode 1114112 = 11"),
            (invalid_character, r"\catcode `\^ = 15 ^"),
        ),
        error_category_tests(
            (
                invalid_character_category,
                r"\catcode `\^ = 15 ^",
                error::Category::MalformedToken
            ),
            (
                catcode_value_too_large_category,
                r"\catcode 48 16",
                error::Category::Syntax
            ),
        ),
    ];
}
