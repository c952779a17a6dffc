//! Unit testing harness for Texpand primitives.
//!
//! A test runs TeX source in a fresh VM and inspects either the tokens that reached
//!     the main loop or the error the run failed with.
//! Three kinds of tests are supported:
//!
//! - [run_expansion_equality_test]: two snippets must produce the same tokens,
//!     e.g. `\def\a{xy}\a\a` and `xyxy`. The final state of the two VMs is not compared.
//!
//! - [run_failure_test]: the snippet must fail.
//!
//! - [run_error_category_test]: the snippet must fail with an error of a given
//!     [category](error::Category), and the error must carry a source locator.
//!
//! The VM state type used in a test must implement [Default] and hold a [TestingComponent].
//! The [State] type here satisfies both and is enough for most tests.
//!
//! Suites of tests are usually written with the [test_suite] macro.

use std::collections::HashMap;
use std::path::PathBuf;

use texpand::traits::*;
use texpand::vm::implement_has_component;
use texpand::vm::VM;
use texpand::*;

/// Texpand component that every unit testing state needs to have.
#[derive(Default)]
pub struct TestingComponent {
    tokens: Vec<token::Token>,
}

impl TestingComponent {
    fn take_tokens(&mut self) -> Vec<token::Token> {
        std::mem::take(&mut self.tokens)
    }
}

/// Simple state type for simple unit tests.
///
/// If the primitives under test don't require custom components or
/// other pieces in the state, it is easier to use this type rather than defining a custom one.
#[derive(Default)]
pub struct State {
    testing: TestingComponent,
}

impl TexlangState for State {}

implement_has_component![State, TestingComponent, testing];

/// In-memory file system for tests that read files.
#[derive(Default)]
pub struct InMemoryFileSystem {
    files: HashMap<PathBuf, String>,
}

impl InMemoryFileSystem {
    /// Adds a file with the provided content.
    pub fn add_file<T: Into<PathBuf>>(&mut self, path: T, content: &str) {
        self.files.insert(path.into(), content.to_string());
    }
}

impl vm::FileSystem for InMemoryFileSystem {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
        match self.files.get(path) {
            None => Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!["no file at {}", path.display()],
            )),
            Some(content) => Ok(content.clone()),
        }
    }
}

/// Option passed to a test runner.
pub enum TestOption<'a, S> {
    /// The built-in commands are the result of invoking the provided static function.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommands(fn() -> HashMap<&'static str, command::BuiltIn<S>>),

    /// The built-in commands are the result of invoking the provided closure.
    ///
    /// Overrides previous `BuiltInCommands` or `BuiltInCommandsDyn` options.
    BuiltInCommandsDyn(Box<dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>> + 'a>),

    /// The provided static function is invoked after the VM is created and before execution starts.
    /// This can be used to provide more custom VM initialization.
    ///
    /// Overrides previous `CustomVMInitialization` or `CustomVMInitializationDyn` options.
    CustomVMInitialization(fn(&mut VM<S>)),

    /// The provided closure is invoked after the VM is created and before execution starts.
    ///
    /// Overrides previous `CustomVMInitialization` or `CustomVMInitializationDyn` options.
    #[allow(clippy::type_complexity)]
    CustomVMInitializationDyn(Box<dyn Fn(&mut VM<S>) + 'a>),
}

/// Run an expansion equality test.
///
/// The test passes if the two provided input strings expand to the same tokens.
pub fn run_expansion_equality_test<S>(lhs: &str, rhs: &str, options: &[TestOption<S>])
where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);
    let run = |source: &str| {
        let mut vm = initialize_vm(&options);
        match execute_source_code(&mut vm, source) {
            Ok(output) => (vm, output),
            Err(err) => panic!("failed to expand {source:?}:\n{err}"),
        }
    };
    let (vm_1, output_1) = run(lhs);
    let (vm_2, output_2) = run(rhs);
    compare_output(output_1, &vm_1, output_2, &vm_2);
}

fn compare_output<S>(
    mut output_1: Vec<token::Token>,
    vm_1: &vm::VM<S>,
    mut output_2: Vec<token::Token>,
    vm_2: &vm::VM<S>,
) {
    for output in [&mut output_1, &mut output_2] {
        if output.last().and_then(token::Token::cat_code) == Some(token::CatCode::Space) {
            output.pop();
        }
    }
    let equal = output_1.len() == output_2.len()
        && output_1
            .iter()
            .zip(&output_2)
            .all(|(token_1, token_2)| same_token(*token_1, vm_1, *token_2, vm_2));
    if equal {
        return;
    }
    let lhs = token::write_tokens(&output_1, vm_1.cs_name_interner());
    let rhs = token::write_tokens(&output_2, vm_2.cs_name_interner());
    println!(
        "Expansion output is different ({} tokens vs {} tokens):",
        output_1.len(),
        output_2.len()
    );
    println!("------[lhs]------\n'{lhs}'");
    println!("------[rhs]------\n'{rhs}'");
    println!("-----------------");
    panic!("Expansion test failed");
}

/// Control sequences are interned separately in each VM, so they are compared by name.
fn same_token<S>(token_1: token::Token, vm_1: &vm::VM<S>, token_2: token::Token, vm_2: &vm::VM<S>) -> bool {
    use token::CommandRef::ControlSequence;
    use token::Value::CommandRef;
    match (token_1.value(), token_2.value()) {
        (
            CommandRef(ControlSequence(cs_name_1, namespace_1)),
            CommandRef(ControlSequence(cs_name_2, namespace_2)),
        ) => {
            vm_1.cs_name_interner().resolve(cs_name_1) == vm_2.cs_name_interner().resolve(cs_name_2)
                && vm_1.namespace_interner().resolve(namespace_1)
                    == vm_2.namespace_interner().resolve(namespace_2)
        }
        _ => token_1 == token_2,
    }
}

/// Run a failure test.
///
/// The test passes if execution of the provided input fails.
/// The error is returned so that callers can make further assertions about it.
pub fn run_failure_test<S>(input: &str, options: &[TestOption<S>]) -> Box<error::Error>
where
    S: Default + HasComponent<TestingComponent>,
{
    let options = ResolvedOptions::new(options);

    let mut vm = initialize_vm(&options);
    match execute_source_code(&mut vm, input) {
        Ok(output) => {
            println!("Expansion succeeded:");
            println!(
                "{}",
                ::texpand::token::write_tokens(&output, vm.cs_name_interner())
            );
            panic!("Expansion failure test did not pass: expansion successful");
        }
        Err(err) => {
            println!("{err}");
            err
        }
    }
}

/// Run an error category test.
///
/// The test passes if execution of the provided input fails with an error of the provided category.
/// Every error that reaches the host must carry a source locator, and this is checked too.
pub fn run_error_category_test<S>(
    input: &str,
    category: error::Category,
    options: &[TestOption<S>],
) where
    S: Default + HasComponent<TestingComponent>,
{
    let err = run_failure_test(input, options);
    assert_eq!(err.category(), category, "unexpected category for error: {err}");
    assert!(err.locator().is_some(), "error has no locator: {err}");
}

struct ResolvedOptions<'a, S> {
    built_in_commands: &'a dyn Fn() -> HashMap<&'static str, command::BuiltIn<S>>,
    custom_vm_initialization: &'a dyn Fn(&mut VM<S>),
}

impl<'a, S> ResolvedOptions<'a, S> {
    pub fn new(options: &'a [TestOption<S>]) -> Self {
        let mut resolved = Self {
            built_in_commands: &HashMap::new,
            custom_vm_initialization: &|_| {},
        };
        for option in options {
            match option {
                TestOption::BuiltInCommands(f) => resolved.built_in_commands = f,
                TestOption::BuiltInCommandsDyn(f) => resolved.built_in_commands = f,
                TestOption::CustomVMInitialization(f) => resolved.custom_vm_initialization = f,
                TestOption::CustomVMInitializationDyn(f) => resolved.custom_vm_initialization = f,
            }
        }
        resolved
    }
}

fn initialize_vm<S: Default>(options: &ResolvedOptions<S>) -> Box<vm::VM<S>> {
    let mut vm = VM::<S>::new((options.built_in_commands)());
    (options.custom_vm_initialization)(&mut vm);
    vm
}

/// Execute source code in a VM and return the tokens that reached the handlers.
fn execute_source_code<S>(
    vm: &mut vm::VM<S>,
    source: &str,
) -> Result<Vec<token::Token>, Box<error::Error>>
where
    S: Default + HasComponent<TestingComponent>,
{
    vm.push_source("testing.tex", source)?;
    vm.run::<Handlers>()?;
    Ok(vm.state.component_mut().take_tokens())
}

struct Handlers;

impl<S: HasComponent<TestingComponent>> vm::Handlers<S> for Handlers {
    fn character_handler(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> Result<(), Box<error::Error>> {
        input.state_mut().component_mut().tokens.push(token);
        Ok(())
    }

    fn unexpanded_expansion_command(
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
    ) -> Result<(), Box<error::Error>> {
        input.state_mut().component_mut().tokens.push(token);
        Ok(())
    }
}

/// Macro to generate a suite of unit tests
///
/// The general use of this macros looks like this:
/// ```
/// # use texpand_testing::*;
/// # use std::collections::HashMap;
/// # use texpand::command;
/// # fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
/// #   HashMap::new()
/// # }
/// test_suite![
///     state(State),
///     options(TestOption::BuiltInCommands(built_in_commands)),
///     expansion_equality_tests(
///         (case_1, "lhs_1", "lhs_1"),
///         (case_2, "lhs_2", "lhs_2"),
///     ),
///     failure_tests(
///         (case_3, "}"),
///     ),
///     error_category_tests(
///         (case_4, "}", texpand::error::Category::Group),
///     ),
/// ];
/// ```
///
/// The arguments to the macro are:
///
/// - `state(State)`: defines which Rust type to use as the VM state in the tests.
///     This can be omitted, in which case it defaults to the type name `State` in the current scope.
///
/// - `options(option_1, option_2, ..., option_n)`: options to pass to the test runner.
///     This is a list of values of type [TestOption].
///     The options can be omitted, in which case they default to `options(TestOption::BuiltInCommands(built_in_commands))`.
///     In this case `built_in_commands` is a static function that returns a list of built-in primitives
///     to initialize the VM with.
///
/// - `expansion_equality_tests(cases...)`: a list of expansion equality test cases.
///     Each case is of the form (case name, left hand side, right hand side).
///     The data here is fed into the [run_expansion_equality_test] test runner.
///
/// - `failure_tests(cases...)`: a list of failure test cases.
///     Each case is of the form (case name, input).
///     The data here is fed into the [run_failure_test] test runner.
///
/// - `error_category_tests(cases...)`: a list of error category test cases.
///     Each case is of the form (case name, input, category).
///     The data here is fed into the [run_error_category_test] test runner.
///
/// Only one `state()` argument may be provided, and if provided it must be in the first position.
/// Only one `options()` argument may be provided, and if provided it must be in the first position
///     or after the `state()` argument.
/// Zero or more of the other arguments may be provided, and in any order.
#[macro_export]
macro_rules! test_suite {
    ( state($state: ty), options $options: tt, expansion_equality_tests ( $( ($name: ident, $lhs: expr, $rhs: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let lhs = $lhs;
                let rhs = $rhs;
                let options = vec! $options;
                $crate::run_expansion_equality_test::<$state>(&lhs, &rhs, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, expansion_equality_tests $test_body: tt $(,)? ) => (
        compile_error!("Invalid test cases for expansion_equality_tests: must be a list of tuples (name, lhs, rhs)");
    );
    ( state($state: ty), options $options: tt, failure_tests ( $( ($name: ident, $input: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                $crate::run_failure_test::<$state>(&input, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, error_category_tests ( $( ($name: ident, $input: expr, $category: expr $(,)? ) ),* $(,)? ) $(,)? ) => (
        $(
            #[test]
            fn $name() {
                let input = $input;
                let options = vec! $options;
                $crate::run_error_category_test::<$state>(&input, $category, &options);
            }
        )*
    );
    ( state($state: ty), options $options: tt, $test_kind: ident $test_cases: tt $(,)? ) => (
        compile_error!("Invalid keyword: test_suite! only accepts the following keywords: `state, `options`, `expansion_equality_tests`, `failure_tests`, `error_category_tests`");
    );
    ( state($state: ty), options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $(
            $crate::test_suite![state($state), options $options, $test_kind $test_cases,];
        )+
    );
    ( options $options: tt, $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $crate::test_suite![state(State), options $options, $( $test_kind $test_cases, )+ ];
    );
    ( $( $test_kind: ident $test_cases: tt ),+ $(,)? ) => (
        $crate::test_suite![options ($crate::TestOption::BuiltInCommands(built_in_commands)), $( $test_kind $test_cases, )+ ];
    );
}
