//! The `\endlinechar` primitive

use texpand::traits::*;
use texpand::*;

pub const ENDLINECHAR_DOC: &str = "Get or set the character appended to each line of input";

/// Get the `\endlinechar` command.
///
/// A value outside the range of characters means no character is appended.
/// The new value applies from the next line of input.
pub fn get_endlinechar<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_singleton(
        context::Key::EndLineChar,
    ))
    .with_doc(ENDLINECHAR_DOC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::testutil::*;
    use crate::the;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", def::get_def()),
            ("endlinechar", get_endlinechar()),
            ("the", the::get_the()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (
                case_1,
                "\\endlinechar=`\\A Hello\nWorld\nMundo\n",
                "Hello WorldAMundoA"
            ),
            (
                case_2,
                "\\endlinechar=-1 Hello\nWorld\nMundo\n",
                "Hello WorldMundo"
            ),
            (
                case_3,
                "\\endlinechar=-1 Hello\nWorld  \nMundo\n",
                "Hello WorldMundo"
            ),
            (case_4, "\\endlinechar=`\\A\nHello\nWorld\n", "Hello WorldA"),
            (default_value, r"\the\endlinechar", "13"),
            (
                local_to_group,
                "{\\endlinechar=-1 }Hello\nWorld",
                "Hello World"
            ),
        ),
        failure_tests((not_a_number, r"\endlinechar=A"),),
    ];
}
