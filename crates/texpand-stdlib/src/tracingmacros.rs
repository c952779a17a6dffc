//! Macro tracing: `\tracingmacros`
//!
//! When `\tracingmacros` is positive every macro expansion is printed to standard error,
//!     with its arguments, replacement text and the resulting expansion.

use colored::*;
use texpand::token::write_tokens;
use texpand::traits::*;
use texpand::*;

pub const TRACINGMACROS_DOC: &str = "Print macro expansions to the terminal when positive";

const KEY: context::Key = context::Key::Integer("tracingmacros");

/// Get the `\tracingmacros` variable.
pub fn get_tracingmacros<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_singleton(KEY)).with_doc(TRACINGMACROS_DOC)
}

/// Post macro expansion hook that prints the trace.
pub fn hook<S: TexlangState>(
    token: token::Token,
    input: &vm::ExpansionInput<S>,
    tex_macro: &texmacro::Macro,
    arguments: &[&[token::Token]],
    reversed_expansion: &[token::Token],
) {
    if input.vm().context.int(KEY) <= 0 {
        return;
    }
    eprint!(
        "{}",
        trace_expansion(token, input, tex_macro, arguments, reversed_expansion)
    );
}

fn trace_expansion<S: TexlangState>(
    token: token::Token,
    input: &vm::ExpansionInput<S>,
    tex_macro: &texmacro::Macro,
    arguments: &[&[token::Token]],
    reversed_expansion: &[token::Token],
) -> String {
    let trace = input.trace(token);
    let interner = input.vm().cs_name_interner();
    let mut s = format![
        "{}{} {}\n",
        "Macro expansion trace of ".bold(),
        trace.value.bold(),
        format!["at {}:{}", trace.origin, trace.line_number].dimmed(),
    ];
    s.push_str("                        ┌──\n");
    s.push_str("              arguments ");
    if arguments.is_empty() {
        s.push_str("│ (none)\n                        ");
    }
    for (i, argument) in arguments.iter().enumerate() {
        s.push_str(&format![
            "│ {}{}={} \n                        ",
            "#".bright_yellow(),
            (i + 1).to_string().bright_yellow(),
            write_tokens(*argument, interner).bright_yellow()
        ]);
    }
    s.push_str("├──\n replacement definition │ ");
    s.push_str(&texmacro::pretty_print_replacement_text(
        tex_macro.replacements(),
        interner,
    ));
    s.push_str(&format![
        "\n                        ├──\n              expansion │ {}\n",
        write_tokens(reversed_expansion.iter().rev(), interner)
    ]);
    s.push_str("                        └──\n");
    s
}
