//! Arithmetic on integer variables (`\advance`)

use crate::prefix;
use texpand::parse::OptionalBy;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const ADVANCE_DOC: &str = "Add an integer to an integer variable";

/// Get the `\advance` command.
pub fn get_advance<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(advance_primitive_fn)
        .with_tag(advance_tag())
        .with_doc(ADVANCE_DOC)
}

static ADVANCE_TAG: command::StaticTag = command::StaticTag::new();

pub fn advance_tag() -> command::Tag {
    ADVANCE_TAG.get()
}

/// TeX.2021.1236-1238
fn advance_primitive_fn<S: HasComponent<prefix::Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let scope = input.state_mut().component_mut().read_and_reset_global();
    let token = input.next_or_err("reading the variable to advance")?;
    let cmd = match token.value() {
        token::Value::CommandRef(command_ref) => {
            match input.commands_map().get_command(&command_ref) {
                Some(command::Command::Variable(cmd)) => cmd.clone(),
                Some(cmd) => {
                    let got = format!["found {cmd}"];
                    return Err(
                        parse::Error::new(input.vm(), "an integer variable", Some(token), "")
                            .with_got_override(got)
                            .into(),
                    );
                }
                None => return Err(error::UndefinedCommandError::new(input.vm(), token).into()),
            }
        }
        _ => {
            return Err(parse::Error::new(
                input.vm(),
                "an integer variable",
                Some(token),
                r"the first argument of `\advance` must be a variable like `\count 1`",
            )
            .into())
        }
    };
    let key = cmd.resolve(token, input.as_mut())?;
    let lhs = match input.vm().context.get(&key) {
        context::Value::Int(lhs) => lhs,
        _ => {
            return Err(parse::Error::new(input.vm(), "an integer variable", Some(token), "")
                .with_got_override("found a variable that does not hold an integer")
                .into())
        }
    };
    OptionalBy::parse(input)?;
    let rhs = i32::parse(input)?;
    // TeX silently overflows in \advance
    input
        .context_mut()
        .set(key, context::Value::Int(lhs.wrapping_add(rhs)), scope);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catcode;
    use crate::def;
    use crate::endlinechar;
    use crate::registers;
    use crate::testutil::*;
    use crate::the;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("advance", get_advance()),
            ("catcode", catcode::get_catcode()),
            ("count", registers::get_count()),
            ("def", def::get_def()),
            ("endlinechar", endlinechar::get_endlinechar()),
            ("global", prefix::get_global()),
            ("the", the::get_the()),
            ("toks", registers::get_toks()),
            ("assertGlobalIsFalse", prefix::get_assert_global_is_false()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (advance_base_case, r"\count 1 1\advance\count 1 2 \the\count 1", "3"),
            (
                advance_base_case_with_by,
                r"\count 1 1\advance\count 1 by 2 \the\count 1",
                "3"
            ),
            (
                advance_base_case_with_capital_by,
                r"\count 1 1\advance\count 1 BY 2 \the\count 1",
                "3"
            ),
            (
                advance_base_case_with_weird_by,
                r"\count 1 1\advance\count 1 bY 2 \the\count 1",
                "3"
            ),
            (
                advance_negative_summand,
                r"\count 1 10\advance\count 1 -2 \the\count 1",
                "8"
            ),
            (
                advance_by_variable,
                r"\count 1 10 \count 2 5 \advance\count 1 by \count 2 \the\count 1",
                "15"
            ),
            (
                advance_overflow_wraps,
                r"\count 1 2147483647 \advance\count 1 1 \the\count 1",
                "-2147483648"
            ),
            (
                advance_is_local,
                r"\count 1 1 {\advance\count 1 1 }\the\count 1",
                "1"
            ),
            (
                advance_global,
                r"\count 1 1 {\global\advance\count 1 1 }\the\count 1\assertGlobalIsFalse",
                "2"
            ),
            (
                advance_takes_global,
                r"\advance\count 1 1 \assertGlobalIsFalse",
                ""
            ),
            (
                advance_endlinechar,
                r"\advance\endlinechar by -13 \the\endlinechar",
                "0"
            ),
            (
                advance_variable_through_macro,
                r"\def\c{\count 1}\advance\c by 3 \the\c",
                "3"
            ),
        ),
        failure_tests(
            (advance_incorrect_keyword_1, r"\count 1 1\advance\count 1 fy 2"),
            (advance_incorrect_keyword_2, r"\count 1 1\advance\count 1 be 2"),
            (advance_catcode, r"\advance\catcode 48 by 1"),
            (advance_token_list, r"\advance\toks 0 by 1"),
            (advance_not_a_variable, r"\advance\def by 4"),
            (advance_character, r"\advance a by 4"),
            (advance_undefined, r"\advance\undefined by 4"),
            (advance_end_of_input, r"\advance"),
        ),
        error_category_tests(
            (
                advance_undefined_category,
                r"\advance\undefined by 4",
                error::Category::UndefinedControlSequence
            ),
            (
                advance_character_category,
                r"\advance a by 4",
                error::Category::Syntax
            ),
        ),
    ];
}
