//! State shared by the unit tests of this crate.

use crate::expansion;
use crate::prefix;
use crate::script;
use crate::tracingmacros;
use texpand::traits::*;
use texpand::*;
use texpand_stdext::collections::groupingmap;

pub use texpand_testing::*;

/// A state with every component a primitive in this crate might need.
///
/// It wires up the same hooks as [StdLibState](crate::StdLibState).
#[derive(Default)]
pub struct State {
    pub(crate) prefix: prefix::Component,
    pub(crate) script: script::Component,
    pub(crate) testing: TestingComponent,
}

impl TexlangState for State {
    fn post_macro_expansion_hook(
        token: token::Token,
        input: &vm::ExpansionInput<Self>,
        tex_macro: &texmacro::Macro,
        arguments: &[&[token::Token]],
        reversed_expansion: &[token::Token],
    ) {
        tracingmacros::hook(token, input, tex_macro, arguments, reversed_expansion)
    }

    fn expansion_override_hook(
        token: token::Token,
        input: &mut vm::ExpansionInput<Self>,
        tag: Option<command::Tag>,
    ) -> prelude::Result<Option<token::Token>> {
        expansion::noexpand_hook(token, input, tag)
    }

    fn variable_assignment_scope_hook(state: &mut Self) -> groupingmap::Scope {
        prefix::variable_assignment_scope_hook(state)
    }
}

vm::implement_has_component![
    State,
    (prefix::Component, prefix),
    (script::Component, script),
    (TestingComponent, testing),
];
