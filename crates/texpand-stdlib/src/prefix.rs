//! The `\global` prefix command
//!
//! `\global` changes the scope of the assignment performed by the command that follows it.
//! It can't be scoped tightly: it alters, at run time, the behavior of `\def`, `\let`,
//!     `\advance` and friends, as well as the semantics of variable assignment.
//!
//! The approach here is a flag in the [Component] that `\global` sets to true.
//! Commands that can be prefixed read the flag using [Component::take_global],
//!     which returns the flag and resets it to false.
//! For this to work *all* code paths within such a command must take the flag,
//!     even if they don't use the result.
//! For example `\gdef` always creates a macro in the global scope, but it still
//!     takes the flag.
//! The [assert_global_is_false](get_assert_global_is_false) command makes this
//!     easy to verify in unit tests.
//!
//! Variable assignments take the flag through [variable_assignment_scope_hook],
//!     which the state wires into the VM.

use crate::alias;
use crate::def;
use crate::math;
use crate::namespace;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;
use texpand_stdext::collections::groupingmap;

/// Component for the prefix commands.
#[derive(Default)]
pub struct Component {
    global: bool,
}

impl Component {
    /// Get the value of the global flag and reset the flag to false.
    ///
    /// See the module documentation for correct usage of this method.
    #[inline]
    pub fn take_global(&mut self) -> bool {
        let global = self.global;
        self.global = false;
        global
    }

    /// Read the global flag, reset it and return the corresponding scope.
    #[inline]
    pub fn read_and_reset_global(&mut self) -> groupingmap::Scope {
        if self.take_global() {
            groupingmap::Scope::Global
        } else {
            groupingmap::Scope::Local
        }
    }
}

pub const GLOBAL_DOC: &str = "Make the following assignment global";

/// Get the `\global` command.
pub fn get_global<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(global_primitive_fn)
        .with_tag(global_tag())
        .with_doc(GLOBAL_DOC)
}

static GLOBAL_TAG: command::StaticTag = command::StaticTag::new();

pub fn global_tag() -> command::Tag {
    GLOBAL_TAG.get()
}

/// Hook that determines the scope of a variable assignment.
pub fn variable_assignment_scope_hook<S: HasComponent<Component>>(
    state: &mut S,
) -> groupingmap::Scope {
    state.component_mut().read_and_reset_global()
}

fn is_prefixable(tag: command::Tag) -> bool {
    tag == global_tag()
        || tag == def::def_tag()
        || tag == alias::let_tag()
        || tag == math::advance_tag()
        || tag == namespace::namespace_tag()
        || tag == namespace::import_tag()
}

fn global_primitive_fn<S: HasComponent<Component>>(
    global_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    input.state_mut().component_mut().global = true;
    let result = check_next_is_prefixable(global_token, input);
    if result.is_err() {
        input.state_mut().component_mut().global = false;
    }
    result
}

fn check_next_is_prefixable<S: HasComponent<Component>>(
    global_token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let token = match input.peek()? {
        None => {
            return Err(error::SimpleEndOfInputError::new(
                input.vm(),
                "the input ended after a `\\global` prefix",
            )
            .with_note("the `\\global` prefix must be followed by an assignment")
            .into())
        }
        Some(token) => *token,
    };
    let prefixable = match token.value() {
        token::Value::CommandRef(command_ref) => match input.commands_map().get_command(&command_ref)
        {
            Some(command::Command::Variable(_)) => true,
            Some(cmd) => cmd.tag().map(is_prefixable).unwrap_or(false),
            None => false,
        },
        _ => false,
    };
    if prefixable {
        return Ok(());
    }
    let global = input.vm().trace(global_token);
    Err(error::SimpleTokenError::new(
        input.vm(),
        token,
        "this token cannot be prefixed by `\\global`",
    )
    .with_note(format![
        "the prefix is at {}:{}",
        global.origin, global.line_number
    ])
    .with_note("`\\global` can only prefix an assignment")
    .into())
}

/// Get the `\assertGlobalIsFalse` command.
///
/// The command fails if the global flag is set.
/// It is used in unit tests to verify that prefixable commands always take the flag.
pub fn get_assert_global_is_false<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(assert_global_is_false_fn)
}

fn assert_global_is_false_fn<S: HasComponent<Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    if input.state_mut().component_mut().take_global() {
        return Err(error::SimpleTokenError::new(
            input.vm(),
            token,
            "the global flag is set but should not be",
        )
        .into());
    }
    Ok(())
}
