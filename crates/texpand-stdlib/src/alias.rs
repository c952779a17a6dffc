//! `\let` aliasing command

use crate::prefix;
use texpand::parse::OptionalEqualsUnexpanded;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const LET_DOC: &str = "Assign a command or character to a control sequence";

/// Get the `\let` command.
pub fn get_let<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(let_primitive_fn)
        .with_tag(let_tag())
        .with_doc(LET_DOC)
}

static LET_TAG: command::StaticTag = command::StaticTag::new();

pub fn let_tag() -> command::Tag {
    LET_TAG.get()
}

fn let_primitive_fn<S: HasComponent<prefix::Component>>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let scope = input.state_mut().component_mut().read_and_reset_global();
    let alias = token::CommandRef::parse(input)?;
    OptionalEqualsUnexpanded::parse(input)?;
    let token = input
        .unexpanded()
        .next_or_err("reading the right hand side of a `\\let` assignment")?;
    match token.value() {
        token::Value::CommandRef(command_ref) => {
            match input
                .commands_map_mut()
                .alias_control_sequence(alias, &command_ref, scope)
            {
                Ok(()) => Ok(()),
                Err(_) => Err(error::UndefinedCommandError::new(input.vm(), token).into()),
            }
        }
        _ => {
            input.commands_map_mut().alias_token(alias, token, scope);
            Ok(())
        }
    }
}
