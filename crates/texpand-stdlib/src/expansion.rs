//! Primitives that alter the expansion process

use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const NOEXPAND_DOC: &str = "Prevent the next token from being expanded";
pub const EXPANDAFTER_DOC: &str = "Expand the token after next, then the next token";
pub const RELAX_DOC: &str = "Do nothing";

/// Get the `\noexpand` primitive.
pub fn get_noexpand<S>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(noexpand_fn)
        .with_tag(NOEXPAND_TAG.get())
        .with_doc(NOEXPAND_DOC)
}

static NOEXPAND_TAG: command::StaticTag = command::StaticTag::new();

// The primitive works through `noexpand_hook`, so this function only runs if the state
// does not install the hook. In that case `\noexpand` is a no-op.
fn noexpand_fn<S>(_: token::Token, _: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    log::debug!("`\\noexpand` was expanded without the expansion override hook installed");
    Ok(())
}

/// Expansion override hook that implements `\noexpand`.
///
/// States that include `\noexpand` must call this from
///     [TexlangState::expansion_override_hook].
#[inline]
pub fn noexpand_hook<S: TexlangState>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
    tag: Option<command::Tag>,
) -> txl::Result<Option<token::Token>> {
    // Fast path: this is not the \noexpand command.
    if tag != Some(NOEXPAND_TAG.get()) {
        return Ok(None);
    }
    noexpand_hook_finish(token, input)
}

fn noexpand_hook_finish<S: TexlangState>(
    token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<Option<token::Token>> {
    match input.unexpanded().next()? {
        None => Err(error::SimpleTokenError::new(
            input.vm(),
            token,
            "unexpected end of input while expanding a `\\noexpand` command",
        )
        .with_note("the `\\noexpand` command must be followed by 1 token")
        .into()),
        Some(token) => Ok(Some(token)),
    }
}

/// Get the `\expandafter` primitive.
///
/// The token after next is expanded once, then the next token is put back in front of the result.
/// A chain like `\expandafter\a\expandafter\b\c` nests one expansion per `\expandafter`,
///     so very long chains fail with a capacity error rather than exhausting the Rust stack.
pub fn get_expandafter<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(expandafter_fn).with_doc(EXPANDAFTER_DOC)
}

fn expandafter_fn<S: TexlangState>(
    expandafter_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<()> {
    let Some(first) = input.unexpanded().next()? else {
        return Err(missing_tokens_error(input.vm(), expandafter_token, 0));
    };
    if input.unexpanded().peek()?.is_none() {
        return Err(missing_tokens_error(input.vm(), expandafter_token, 1));
    }
    input.expanded().expand_once()?;
    input.expansions_mut().push(first);
    Ok(())
}

fn missing_tokens_error<S>(
    vm: &vm::VM<S>,
    expandafter_token: token::Token,
    found: usize,
) -> Box<error::Error> {
    error::SimpleTokenError::new(
        vm,
        expandafter_token,
        "unexpected end of input while expanding an `\\expandafter` command",
    )
    .with_note("the `\\expandafter` command must be followed by 2 tokens")
    .with_note(match found {
        0 => "no more tokens were found".to_string(),
        n => format!["only {n} more token was found"],
    })
    .into()
}

/// Get the `\relax` primitive.
pub fn get_relax<S>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(|_, _| Ok(()))
        .with_tag(RELAX_TAG.get())
        .with_doc(RELAX_DOC)
}

static RELAX_TAG: command::StaticTag = command::StaticTag::new();

pub fn relax_tag() -> command::Tag {
    RELAX_TAG.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::registers;
    use crate::testutil::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("count", registers::get_count()),
            ("def", def::get_def()),
            ("edef", def::get_edef()),
            ("noexpand", get_noexpand()),
            ("relax", get_relax()),
            ("xa", get_expandafter()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (
                simple_case,
                r"\def\a{Hello}\noexpand\a",
                r"\def\a{}\noexpand\a"
            ),
            (
                noexpand_undefined,
                r"\noexpand\undefined",
                r"\def\undefined{}\noexpand\undefined"
            ),
            (noexpand_character, r"\noexpand a", "a"),
            (
                expandafter_and_noexpand_1,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\a\b",
                "Hello ''"
            ),
            (
                expandafter_and_noexpand_2,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\a\b\b",
                "Hello ''World"
            ),
            (
                expandafter_and_noexpand_3,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\xa\a\b\b",
                "Hello 'World'"
            ),
            (
                expandafter_and_noexpand_4,
                r"\def\a#1\b{Hello '#1'}\def\b{World}\xa\a\noexpand\b\b",
                "Hello ''World"
            ),
            (
                only_expands_once,
                r"\def\A{\B}\def\B{Hello}\xa\noexpand\A",
                r"\def\B{}\noexpand\B",
            ),
            (
                frozen_token_survives_space_terminator,
                r"\def\A{Hello}\count 1 = 1 \noexpand\A",
                r"\def\A{}\noexpand\A",
            ),
            (
                frozen_token_pushed_back_is_expanded,
                r"\def\A{Hello}\count 1 = 1\noexpand\A",
                "Hello",
            ),
            (
                noexpand_in_edef,
                r"\def\b{B}\edef\a{\noexpand\b\b}\def\b{C}\a",
                "CB"
            ),
            (relax_does_nothing, r"a\relax b", "ab"),
        ),
        failure_tests(
            (noexpand_end_of_input, r"\noexpand"),
            (expandafter_no_tokens, r"\xa"),
        ),
    ];

    static PREFIX: &str = r"\def\mk#1#2{\def#1##1\notes##2\end{##1\notes##2#2\end}}\mk\a a\mk\b b\mk\c c\mk\d d\def\notes#1\end{#1}";
    static POSTFIX: &str = r"\notes\end";

    macro_rules! expandafter_test {
        ( $( ( $name: ident, $lhs: expr, $rhs: expr ) ),* $(,)? ) => {
            test_suite![
                expansion_equality_tests(
                    $(
                        ( $name, format!("{}{}{}", PREFIX, $lhs, POSTFIX), $rhs ),
                    )*
                ),
            ];
        };
    }

    expandafter_test![
        (texbook_p374_3, r"\xa\a\b", r"ba"),
        (texbook_p374_4, r"\xa\xa\xa\a\xa\b\c", "cba"),
        (
            texbook_p374_5,
            r"\xa\xa\xa\xa\xa\xa\xa\a\xa\xa\xa\b\xa\c\d",
            "dcba"
        ),
        (permutation_abcd, r"\a\b\c\d", "abcd"),
        (permutation_abdc, r"\a\b\xa\c\d", "abdc"),
        (permutation_acbd, r"\a\xa\b\c\d", "acbd"),
        (permutation_acdb, r"\a\xa\xa\xa\b\c\d", "acdb"),
        (permutation_adbc, r"\a\xa\b\xa\c\d", "adbc"),
        (permutation_adcb, r"\a\xa\xa\xa\b\xa\c\d", "adcb"),
        (permutation_bacd, r"\xa\a\b\c\d", "bacd"),
        (permutation_badc, r"\xa\a\b\xa\c\d", "badc"),
        (permutation_bcad, r"\xa\xa\xa\a\b\c\d", "bcad"),
        (permutation_bcda, r"\xa\xa\xa\xa\xa\xa\xa\a\b\c\d", "bcda"),
        (permutation_bdac, r"\xa\xa\xa\a\b\xa\c\d", "bdac"),
        (permutation_cabd, r"\xa\a\xa\b\c\d", "cabd"),
        (permutation_cbad, r"\xa\xa\xa\a\xa\b\c\d", "cbad"),
        (permutation_cdab, r"\xa\xa\xa\a\xa\xa\xa\b\c\d", "cdab"),
        (permutation_dabc, r"\xa\a\xa\b\xa\c\d", "dabc"),
        (permutation_dbac, r"\xa\xa\xa\a\xa\b\xa\c\d", "dbac"),
        (permutation_dcab, r"\xa\xa\xa\a\xa\xa\xa\b\xa\c\d", "dcab"),
        (
            expandafter_last_after_first_pass,
            r"\xa\xa\xa\a\xa\xa\b\c\d",
            "bdac"
        ),
    ];

    test_suite![
        failure_tests(
            (expandafter_missing_1st_token, r"\xa"),
            (expandafter_missing_2nd_token, r"\def\a{}\xa\a"),
            (
                expandafter_missing_1st_token_nested,
                r"\def\a{}\def\b{}\xa\xa\xa\a\xa\xa\b"
            ),
            (
                expandafter_missing_2nd_token_nested,
                r"\def\A{}\xa\xa\xa\A\A"
            ),
        ),
    ];
}
