//! TeX as a scripting language
//!
//! Source files are processed using the usual expansion semantics, but instead
//!     of typesetting the result the output is returned as a list of tokens.
//! These can be converted to a string using [texpand::token::write_tokens].

use texpand::prelude as txl;
use texpand::token::Token;
use texpand::traits::*;
use texpand::*;

#[derive(Default)]
pub struct Component {
    exec_output: Vec<Token>,
    num_trailing_newlines: usize,
}

pub const NEWLINE_DOC: &str = "Add a newline to the output";
pub const PAR_DOC: &str = "End the current paragraph by adding two newlines to the output";

/// Get the `\newline` primitive.
pub fn get_newline<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(newline_primitive_fn).with_doc(NEWLINE_DOC)
}

fn newline_primitive_fn<S: HasComponent<Component>>(
    t: Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let c = input.state_mut().component_mut();
    let newline_token = Token::new_space('\n', t.trace_key());
    c.exec_output.push(newline_token);
    c.num_trailing_newlines += 1;
    Ok(())
}

/// Get the `\par` primitive.
///
/// Consecutive `\par` commands are treated as one.
pub fn get_par<S: HasComponent<Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(par_primitive_fn).with_doc(PAR_DOC)
}

fn par_primitive_fn<S: HasComponent<Component>>(
    t: Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let c = input.state_mut().component_mut();
    if c.exec_output.is_empty() {
        return Ok(());
    }
    let par_token = Token::new_space('\n', t.trace_key());
    for _ in c.num_trailing_newlines..2 {
        c.exec_output.push(par_token);
        c.num_trailing_newlines += 1;
    }
    Ok(())
}

/// Handlers that append characters to the script output.
///
/// Expansion commands that reach the main loop unexpanded, for example after `\noexpand`,
///     are written to the output as they are.
pub struct Handlers;

impl<S: HasComponent<Component>> vm::Handlers<S> for Handlers {
    fn character_handler(token: Token, input: &mut vm::ExecutionInput<S>) -> txl::Result<()> {
        let c = input.state_mut().component_mut();
        c.exec_output.push(token);
        c.num_trailing_newlines = 0;
        Ok(())
    }

    fn unexpanded_expansion_command(
        token: Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> txl::Result<()> {
        <Self as vm::Handlers<S>>::character_handler(token, input)
    }
}

/// Run the VM and return the output.
pub fn run<S: HasComponent<Component>>(vm: &mut vm::VM<S>) -> txl::Result<Vec<Token>> {
    vm.run::<Handlers>()?;
    Ok(take_output(vm))
}

/// Take the output that has been produced so far.
///
/// This is used by hosts that keep running the VM after an error.
pub fn take_output<S: HasComponent<Component>>(vm: &mut vm::VM<S>) -> Vec<Token> {
    let c = vm.state.component_mut();
    c.num_trailing_newlines = 0;
    std::mem::take(&mut c.exec_output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::expansion;
    use crate::testutil::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", def::get_def()),
            ("newline", get_newline()),
            ("noexpand", expansion::get_noexpand()),
            ("par", get_par()),
        ])
    }

    macro_rules! script_test {
        ($name: ident, $input: expr, $want: expr) => {
            #[test]
            fn $name() {
                let mut vm = vm::VM::<State>::new(built_in_commands());
                vm.push_source("testutil.tex", $input).unwrap();
                let tokens = run(&mut vm).unwrap();
                let got = token::write_tokens(&tokens, vm.cs_name_interner());
                let want = $want.to_string();

                if got != want {
                    println!("Output is different:");
                    println!("------[got]-------");
                    println!("{}", got);
                    println!("------[want]------");
                    println!("{}", want);
                    println!("-----------------");
                    panic!("write_tokens test failed");
                }
            }
        };
    }

    script_test!(char_newline_1, "H\nW", "H W");
    script_test!(newline_1, "H\\newline W", "H\nW");
    script_test!(newline_2, "H\\newline \\newline W", "H\n\nW");
    script_test!(newline_3, "H\\newline \\newline \\newline W", "H\n\n\nW");
    script_test!(par_1, "H\n\n\nW", "H\n\nW");
    script_test!(par_2, "H\n\n\n\n\nW", "H\n\nW");
    script_test!(par_after_newline, "H\\newline\\par W", "H\n\nW");
    script_test!(par_at_start, "\\par W", "W");
    script_test!(macro_output, "\\def\\a{Hello}\\a", "Hello");
    script_test!(noexpand_is_output, "\\def\\a{}\\noexpand\\a", "\\a");

    #[test]
    fn take_output_resets() {
        let mut vm = vm::VM::<State>::new(built_in_commands());
        vm.push_source("testutil.tex", "A").unwrap();
        assert_eq!(run(&mut vm).unwrap().len(), 2);
        assert!(take_output(&mut vm).is_empty());
    }
}
