//! The `\the` expansion primitive

use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const THE_DOC: &str = "Output text describing the value of a variable";

/// Get the `\the` expansion primitive.
pub fn get_the<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(the_primitive_fn).with_doc(THE_DOC)
}

/// TeX.2021.465
fn the_primitive_fn<S: TexlangState>(
    the_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<()> {
    let token = input.next_or_err(r"reading the argument of `\the`")?;
    let cmd = match token.value() {
        token::Value::CommandRef(command_ref) => match input.commands_map().get_command(&command_ref)
        {
            Some(command::Command::Variable(cmd)) => Some(cmd.clone()),
            _ => None,
        },
        _ => None,
    };
    let Some(cmd) = cmd else {
        return Err(error::SimpleTokenError::new(
            input.vm(),
            token,
            r"this token cannot be used after `\the`",
        )
        .with_note(r"`\the` must be followed by a variable like `\count 1` or `\catcode 48`")
        .into());
    };
    match cmd.value(token, input.expanded())? {
        context::Value::Int(i) => {
            input.push_string_tokens(the_token, &i.to_string());
        }
        context::Value::CatCode(cat_code) => {
            input.push_string_tokens(the_token, &(cat_code as u8).to_string());
        }
        context::Value::Tokens(tokens) => {
            input.push_expansion(&tokens);
        }
        context::Value::Namespace(namespace) => {
            let name = input
                .vm()
                .namespace_interner()
                .resolve(namespace)
                .unwrap_or_default()
                .to_string();
            input.push_string_tokens(the_token, &name);
        }
        context::Value::Interaction(mode) => {
            let i = match mode {
                context::InteractionMode::Batch => 0,
                context::InteractionMode::NonStop => 1,
                context::InteractionMode::Scroll => 2,
                context::InteractionMode::ErrorStop => 3,
            };
            input.push_string_tokens(the_token, &i.to_string());
        }
    }
    Ok(())
}
