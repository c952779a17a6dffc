//! Reading source files: `\input`, `\endinput` and `\ifeof`

use texpand::parse::FileLocation;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const INPUT_DOC: &str = "Read the content of a file into the input";
pub const ENDINPUT_DOC: &str = "Stop reading the current file after the current line";
pub const IFEOF_DOC: &str = "Test whether a file cannot be read";

const DEFAULT_EXTENSION: &str = "tex";

/// Get the `\input` primitive.
pub fn get_input<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(input_fn).with_doc(INPUT_DOC)
}

fn input_fn<S: TexlangState>(
    input_token: token::Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<()> {
    let file_location = FileLocation::parse(input)?;
    let path = file_location.determine_full_path(None, DEFAULT_EXTENSION);
    log::debug!("`\\input` of {}", path.display());
    input.push_file(input_token, path)
}

/// Get the `\endinput` primitive.
pub fn get_endinput<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(endinput_fn).with_doc(ENDINPUT_DOC)
}

fn endinput_fn<S: TexlangState>(_: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    input.end_current_file();
    Ok(())
}

/// Get the `\ifeof` primitive.
///
/// This implementation has no input streams.
/// The condition takes a file name and is true when the file cannot be read.
pub fn get_ifeof<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(ifeof_fn).with_doc(IFEOF_DOC)
}

fn ifeof_fn<S: TexlangState>(_: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    let file_location = FileLocation::parse(input)?;
    let vm = input.vm();
    let path = vm.resolve_path(file_location.determine_full_path(None, DEFAULT_EXTENSION));
    Ok(vm.file_system.read_to_string(&path).is_err())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def;
    use crate::expansion;
    use crate::testutil::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        let mut m = HashMap::from([
            ("def", def::get_def()),
            ("endinput", get_endinput()),
            ("ifeof", get_ifeof()),
            ("input", get_input()),
            ("relax", expansion::get_relax()),
        ]);
        m.extend(texpand::conditional::built_ins());
        m
    }

    fn initialize_vm(vm: &mut vm::VM<State>) {
        let mut file_system: InMemoryFileSystem = Default::default();
        file_system.add_file("/work/a.tex", "a");
        file_system.add_file("/work/b.sty", "b");
        file_system.add_file("/work/sub/c.tex", "c");
        file_system.add_file("/work/outer.tex", r"<\input a\relax>");
        file_system.add_file("/work/early.tex", "x\\endinput y\nz");
        file_system.add_file("/work/macro.tex", r"\def\m{M}\relax");
        file_system.add_file("/work/self.tex", r"\input self ");
        file_system.add_file("/work/open.tex", r"\iftrue A");
        vm.file_system = Box::new(file_system);
        vm.working_directory = Some("/work".into());
    }

    test_suite![
        options(
            TestOption::BuiltInCommands(built_in_commands),
            TestOption::CustomVMInitialization(initialize_vm),
        ),
        expansion_equality_tests(
            (input_basic, r"\input a\relax", "a "),
            (input_consumes_space, r"\input a x", "a x"),
            (input_with_extension, r"\input b.sty\relax", "b "),
            (input_subdirectory, r"\input sub/c\relax", "c "),
            (input_absolute_path, r"\input /work/a\relax", "a "),
            (input_nested, r"\input outer\relax", "<a >"),
            (input_macro_definition, r"\input macro \m", "M"),
            (endinput_rest_of_line_is_read, r"\input early\relax", "xy "),
            (
                conditional_spans_files,
                r"\input open \else B\fi",
                "A "
            ),
            (ifeof_existing_file, r"\ifeof a 1\else 0\fi", "0"),
            (ifeof_missing_file, r"\ifeof missing 1\else 0\fi", "1"),
            (
                ifeof_with_extension,
                r"\ifeof b.sty 1\else 0\fi",
                "0"
            ),
            (
                ifeof_wrong_extension,
                r"\ifeof b 1\else 0\fi",
                "1"
            ),
        ),
        failure_tests(
            (input_missing_file, r"\input missing "),
            (input_recursive, r"\input self "),
        ),
        error_category_tests(
            (
                input_missing_file_category,
                r"\input missing ",
                error::Category::Resource
            ),
            (
                input_recursive_category,
                r"\input self ",
                error::Category::Capacity
            ),
        ),
    ];
}
