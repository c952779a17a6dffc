//! # The Texpand standard library
//!
//! This crate contains the catalog of TeX primitives that hosts install into a
//!     Texpand [VM](vm::VM).
//! The engine crate provides the conditional primitives;
//!     everything else a host needs to run TeX macro code lives here.
//!
//! The easiest way to get started is [StdLibState::new_vm],
//!     which returns a VM with every primitive in this crate installed.

extern crate texpand;
extern crate texpand_stdext;

use std::collections::HashMap;

use texpand::command;
use texpand::prelude as txl;
use texpand::texmacro;
use texpand::token;
use texpand::traits::*;
use texpand::vm;
use texpand_stdext::collections::groupingmap;

pub mod alias;
pub mod catcode;
pub mod conditional;
pub mod def;
pub mod endlinechar;
pub mod errormode;
pub mod expansion;
pub mod group;
pub mod input;
pub mod math;
pub mod namespace;
pub mod prefix;
pub mod registers;
pub mod script;
pub mod the;
pub mod tracingmacros;

#[cfg(test)]
mod testutil;

/// A state struct that is compatible with every primitive in the Texpand standard library.
#[derive(Default)]
pub struct StdLibState {
    pub prefix: prefix::Component,
    pub script: script::Component,
}

impl TexlangState for StdLibState {
    #[inline]
    fn post_macro_expansion_hook(
        token: token::Token,
        input: &vm::ExpansionInput<Self>,
        tex_macro: &texmacro::Macro,
        arguments: &[&[token::Token]],
        reversed_expansion: &[token::Token],
    ) {
        tracingmacros::hook(token, input, tex_macro, arguments, reversed_expansion)
    }

    #[inline]
    fn expansion_override_hook(
        token: token::Token,
        input: &mut vm::ExpansionInput<Self>,
        tag: Option<command::Tag>,
    ) -> txl::Result<Option<token::Token>> {
        expansion::noexpand_hook(token, input, tag)
    }

    #[inline]
    fn variable_assignment_scope_hook(state: &mut Self) -> groupingmap::Scope {
        prefix::variable_assignment_scope_hook(state)
    }
}

vm::implement_has_component![
    StdLibState,
    (prefix::Component, prefix),
    (script::Component, script),
];

impl StdLibState {
    pub fn all_initial_built_ins() -> HashMap<&'static str, command::BuiltIn<StdLibState>> {
        built_ins()
    }

    /// Create a new VM that uses the standard library's state and all of its commands.
    pub fn new_vm() -> Box<vm::VM<StdLibState>> {
        vm::VM::<StdLibState>::new(StdLibState::all_initial_built_ins())
    }
}

/// Returns every primitive in the standard library, for any compatible state.
pub fn built_ins<S>() -> HashMap<&'static str, command::BuiltIn<S>>
where
    S: HasComponent<prefix::Component> + HasComponent<script::Component>,
{
    let mut m = HashMap::from([
        ("advance", math::get_advance()),
        //
        ("batchmode", errormode::get_batchmode()),
        ("begingroup", group::get_begingroup()),
        //
        ("catcode", catcode::get_catcode()),
        ("count", registers::get_count()),
        //
        ("def", def::get_def()),
        //
        ("edef", def::get_edef()),
        ("endgroup", group::get_endgroup()),
        ("endinput", input::get_endinput()),
        ("endlinechar", endlinechar::get_endlinechar()),
        ("errorstopmode", errormode::get_errorstopmode()),
        ("expandafter", expansion::get_expandafter()),
        ("export", namespace::get_export()),
        //
        ("gdef", def::get_gdef()),
        ("global", prefix::get_global()),
        //
        ("if", conditional::get_if()),
        ("ifcat", conditional::get_ifcat()),
        ("ifdefined", conditional::get_ifdefined()),
        ("ifeof", input::get_ifeof()),
        ("ifnum", conditional::get_ifnum()),
        ("ifodd", conditional::get_ifodd()),
        ("ifx", conditional::get_ifx()),
        ("import", namespace::get_import()),
        ("input", input::get_input()),
        ("interactionmode", errormode::get_interactionmode()),
        //
        ("let", alias::get_let()),
        //
        ("namespace", namespace::get_namespace()),
        ("newline", script::get_newline()),
        ("noexpand", expansion::get_noexpand()),
        ("nonstopmode", errormode::get_nonstopmode()),
        //
        ("par", script::get_par()),
        //
        ("relax", expansion::get_relax()),
        //
        ("scrollmode", errormode::get_scrollmode()),
        //
        ("the", the::get_the()),
        ("toks", registers::get_toks()),
        ("tracingmacros", tracingmacros::get_tracingmacros()),
    ]);
    m.extend(texpand::conditional::built_ins());
    m
}

/// A TeX snippet that exercises some error case in the standard library.
pub struct ErrorCase {
    pub description: &'static str,
    pub source_code: &'static str,
}

impl ErrorCase {
    /// Returns a vector of TeX snippets that exercise error paths in Texpand.
    pub fn all_error_cases() -> Vec<ErrorCase> {
        let mut cases = vec![];
        for (description, source_code) in [
            (r"\toks starts with a letter token", r"\toks 0 = a"),
            (
                "end of input while scanning token list",
                r"\toks 0 = {  no closing brace",
            ),
            (r"end of input right after \toks", r"\toks 0"),
            (r"\count is out of bounds (negative)", r"\count -200"),
            (r"\count is out of bounds (positive)", r"\count 2000000"),
            ("file does not exist", r"\input doesNotExist "),
            ("end of input after \\global", r"\global"),
            ("can't be prefixed by \\global", r"\global\relax"),
            ("can't be prefixed by \\global (character)", r"\global a"),
            ("invalid variable (undefined)", r"\advance \undefined by 4"),
            (
                "invalid variable (not a variable command)",
                r"\advance \def by 4",
            ),
            ("invalid variable (character token)", r"\advance a by 4"),
            ("invalid variable (eof)", r"\advance"),
            ("invalid relation", r"\ifnum 3 z 4"),
            ("malformed by keyword", r"\advance \count 0 bg"),
            ("undefined control sequence", r"\elephant"),
            ("invalid character", "\u{7F}"),
            ("empty control sequence", r"\"),
            ("invalid end of group", r"}"),
            ("invalid end of semi-simple group", r"\endgroup"),
            ("mismatched group", r"\begingroup}"),
            ("invalid start of number", r"\count X"),
            ("invalid start of number (eof)", r"\count"),
            ("invalid start of number (not a variable)", r"\count \def"),
            ("invalid character constant", r"\count `\def"),
            ("invalid character constant (eof)", r"\count `"),
            ("invalid octal digit", r"\count '9"),
            ("invalid octal digit (eof)", r"\count '"),
            ("invalid hexadecimal digit", "\\count \"Z"),
            ("invalid hexadecimal digit (eof)", "\\count \""),
            (
                "decimal number too big (radix)",
                r"\count 1000000000000000000000",
            ),
            (
                "decimal number too big (sum)",
                r"\count 18446744073709551617",
            ),
            ("octal number too big", r"\count '7777777777777777777777"),
            (
                "hexadecimal number too big",
                "\\count \"AAAAAAAAAAAAAAAAAAAAAA",
            ),
            ("number with letter catcode", r"\catcode `1 = 11 \count 1"),
            ("category code out of bounds", r"\catcode 0 = 17"),
            ("invalid command target", r"\let a = \def"),
            ("invalid command target (eof)", r"\let"),
            ("undefined \\let target", r"\let\a\undefined"),
            ("extra \\fi", r"\fi"),
            ("extra \\else", r"\else"),
            ("extra \\or", r"\iftrue \or\fi"),
            ("incomplete conditional", r"\iffalse a"),
            ("\\unless before a non-conditional", r"\unless\relax"),
            ("macro prefix does not match", r"\def\a.{}\a"),
            ("macro parameter out of range", r"\def\a#1{#2}"),
            ("unknown namespace", r"\import{unknown}"),
            ("\\the before a character", r"\the a"),
            ("\\noexpand at end of input", r"\noexpand"),
            ("\\expandafter at end of input", r"\expandafter"),
            ("assign the interaction mode", r"\interactionmode = 0"),
        ] {
            cases.push(ErrorCase {
                description,
                source_code,
            })
        }
        cases
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testutil::*;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        built_ins()
    }

    test_suite![
        expansion_equality_tests(
            (
                overwrite_else,
                r"\def\else{}\ifodd 2 \else should be skipped \fi",
                r""
            ),
            (
                math_and_active_char,
                r"\catcode`\A=13 \let A\count \let ~\count ~5=7 A6=8 \advance~5 byA6 \the~5",
                r"15",
            ),
            (
                texbook_exercise_20_7,
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 \def\!!1#2![{!#]#!!2}\! x{[y]][z}",
                r"\catcode`\[=1 \catcode`\]=2 \catcode`\!=6 {#]![y][z}",
            ),
            (
                group_scoped_macro,
                r"\def\a{outer}{\def\a{inner}\a}\a\begingroup\def\b{}\endgroup\ifdefined\b 1\else 0\fi",
                "innerouter0"
            ),
            (
                count_loop,
                r"\def\loop{\ifnum\count 1<5 \advance\count 1 by 1 \the\count 1\expandafter\loop\fi}\loop",
                "12345"
            ),
            (
                edef_counter,
                r"\count 1 = 7 \edef\a{\the\count 1}\count 1 = 8 \a",
                "7"
            ),
            (
                namespaced_library,
                r"\namespace{lib}\def\helper{H}\def\api{\helper!}\export{\api}\namespace{}\import{lib}\api\ifdefined\helper 1\else 0\fi",
                "H!0"
            ),
        ),
    ];

    #[test]
    fn all_error_cases() {
        let options = vec![TestOption::BuiltInCommands(built_in_commands)];
        for case in ErrorCase::all_error_cases() {
            println!("CASE {}", case.description);
            run_failure_test::<State>(case.source_code, &options);
        }
    }

    #[test]
    fn every_primitive_has_a_doc() {
        for (name, built_in) in StdLibState::all_initial_built_ins() {
            assert!(built_in.doc().is_some(), "`\\{name}` has no documentation");
        }
    }

    #[test]
    fn new_vm_runs_script() {
        let mut vm = StdLibState::new_vm();
        vm.push_source("input.tex", r"\def\a#1{<#1>}\a{x}\par y").unwrap();
        let output = script::run(&mut *vm).unwrap();
        assert_eq!(
            token::write_tokens(&output, vm.cs_name_interner()),
            "<x>\n\ny"
        );
    }
}
