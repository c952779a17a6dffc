//! Register variables (`\count`, `\toks`)

use texpand::parse::Uint;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const COUNT_DOC: &str = "Get or set an integer register";
pub const TOKS_DOC: &str = "Get or set a token list register";

/// Number of `\count` registers.
pub const NUM_COUNT_REGISTERS: usize = 32768;

/// Number of `\toks` registers.
pub const NUM_TOKS_REGISTERS: usize = 256;

/// Get the `\count` command.
pub fn get_count<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_array(count_key)).with_doc(COUNT_DOC)
}

/// Get the `\toks` command.
pub fn get_toks<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_array(toks_key)).with_doc(TOKS_DOC)
}

fn count_key<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpandedStream<S>,
) -> txl::Result<context::Key> {
    let Uint(i) = Uint::<NUM_COUNT_REGISTERS>::parse(input)?;
    Ok(context::Key::Count(i as u16))
}

fn toks_key<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExpandedStream<S>,
) -> txl::Result<context::Key> {
    let Uint(i) = Uint::<NUM_TOKS_REGISTERS>::parse(input)?;
    Ok(context::Key::TokenList(i as u16))
}
