//! Boolean conditionals built on the engine's conditional machinery
//!
//! The engine owns `\iftrue`, `\iffalse`, `\ifcase`, `\else`, `\or`, `\fi` and `\unless`.
//! The primitives here only evaluate a condition; branching and skipping are done by the engine.

use crate::expansion;
use texpand::parse;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const IFNUM_DOC: &str = "Compare two integers using <, = or >";
pub const IFODD_DOC: &str = "Test whether an integer is odd";
pub const IFX_DOC: &str = "Test whether two unexpanded tokens have the same meaning";
pub const IF_DOC: &str = "Test whether two expanded tokens have the same character code";
pub const IFCAT_DOC: &str = "Test whether two expanded tokens have the same category code";
pub const IFDEFINED_DOC: &str = "Test whether the next token is defined";

/// Get the `\ifnum` primitive.
pub fn get_ifnum<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifnum_fn).with_doc(IFNUM_DOC)
}

fn ifnum_fn<S: TexlangState>(_: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    let (lhs, relation, rhs) = <(i32, parse::Relation, i32)>::parse(input)?;
    Ok(relation.holds(lhs, rhs))
}

/// Get the `\ifodd` primitive.
pub fn get_ifodd<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifodd_fn).with_doc(IFODD_DOC)
}

fn ifodd_fn<S: TexlangState>(_: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    let n = i32::parse(input)?;
    Ok(n % 2 != 0)
}

/// Get the `\ifx` primitive.
pub fn get_ifx<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifx_fn).with_doc(IFX_DOC)
}

fn ifx_fn<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<bool> {
    let a = next_marked(input, "ifx")?;
    let b = next_marked(input, "ifx")?;
    let map = input.commands_map();
    let relax = expansion::relax_tag();
    let meaning = |(t, marked): (token::Token, bool)| match t.value() {
        token::Value::CommandRef(command_ref) => match map.get_command(&command_ref) {
            // A control sequence after `\noexpand` means `\relax` if it would have been expanded.
            None if marked => Meaning::Relax,
            Some(cmd) if marked && cmd.capability() == command::Capability::Expandable => {
                Meaning::Relax
            }
            Some(cmd) if cmd.tag() == Some(relax) => Meaning::Relax,
            cmd => Meaning::Command(cmd),
        },
        value => Meaning::Character(value),
    };
    Ok(match (meaning(a), meaning(b)) {
        (Meaning::Character(a), Meaning::Character(b)) => a == b,
        (Meaning::Relax, Meaning::Relax) => true,
        (Meaning::Command(None), Meaning::Command(None)) => true,
        (Meaning::Command(Some(a)), Meaning::Command(Some(b))) => a.is_same(b),
        (Meaning::Command(Some(command::Command::CharacterTokenAlias(a))), Meaning::Character(b))
        | (Meaning::Character(b), Meaning::Command(Some(command::Command::CharacterTokenAlias(a)))) => {
            *a == b
        }
        _ => false,
    })
}

enum Meaning<'a, S> {
    Character(token::Value),
    Command(Option<&'a command::Command<S>>),
    Relax,
}

fn next_marked<S: TexlangState>(
    input: &mut vm::ExpansionInput<S>,
    name: &str,
) -> txl::Result<(token::Token, bool)> {
    match input.unexpanded().next_with_mark()? {
        Some(next) => Ok(next),
        None => Err(end_of_input_error(input, name)),
    }
}

fn next_unexpanded<S: TexlangState>(
    input: &mut vm::ExpansionInput<S>,
    name: &str,
) -> txl::Result<token::Token> {
    match input.unexpanded().next()? {
        Some(t) => Ok(t),
        None => Err(end_of_input_error(input, name)),
    }
}

fn end_of_input_error<S: TexlangState>(input: &vm::ExpansionInput<S>, name: &str) -> Box<error::Error> {
    error::SimpleEndOfInputError::new(
        input.vm(),
        format!["unexpected end of input while reading the arguments of `\\{name}`"],
    )
    .with_note(format!["the `\\{name}` conditional must be followed by 2 tokens"])
    .into()
}

/// Get the `\if` primitive.
pub fn get_if<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(if_fn).with_doc(IF_DOC)
}

fn if_fn<S: TexlangState>(_: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    let (a, b) = two_char_codes(input, "if")?;
    Ok(a.0 == b.0)
}

/// Get the `\ifcat` primitive.
pub fn get_ifcat<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifcat_fn).with_doc(IFCAT_DOC)
}

fn ifcat_fn<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<bool> {
    let (a, b) = two_char_codes(input, "ifcat")?;
    Ok(a.1 == b.1)
}

// A control sequence that is not a character alias has character code 256
// and category code 16 when compared by `\if` and `\ifcat`.
const NON_CHARACTER: (u32, u8) = (256, 16);

fn two_char_codes<S: TexlangState>(
    input: &mut vm::ExpansionInput<S>,
    name: &str,
) -> txl::Result<((u32, u8), (u32, u8))> {
    let mut codes = [NON_CHARACTER; 2];
    for code in &mut codes {
        let t = match input.next()? {
            Some(t) => t,
            None => return Err(end_of_input_error(input, name)),
        };
        let t = match t.value() {
            token::Value::CommandRef(command_ref) => match input.commands_map().get_command(&command_ref) {
                Some(command::Command::CharacterTokenAlias(value)) => {
                    token::Token::new_from_value(*value, t.trace_key())
                }
                _ => continue,
            },
            _ => t,
        };
        if let (Some(c), Some(cat_code)) = (t.char(), t.cat_code()) {
            *code = (c as u32, cat_code as u8);
        }
    }
    let [a, b] = codes;
    Ok((a, b))
}

/// Get the `\ifdefined` primitive.
pub fn get_ifdefined<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifdefined_fn).with_doc(IFDEFINED_DOC)
}

fn ifdefined_fn<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<bool> {
    let t = input
        .unexpanded()
        .next_or_err("reading the argument of `\\ifdefined`")?;
    Ok(match t.value() {
        token::Value::CommandRef(command_ref) => input.commands_map().get_command(&command_ref).is_some(),
        _ => true,
    })
}
