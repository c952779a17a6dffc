//! Variable commands.
//!
//! A variable command like `\count` or `\catcode` references a cell in the
//!     [Context](crate::context::Context).
//! When the command appears in the main loop it performs an assignment:
//!
//! ```tex
//! \count 4 = 17
//! ```
//!
//! When it appears where a number is expected, the current value of the cell is read.
//! Resolving the command to a specific [context::Key] may involve reading from the input,
//!     as in the `4` above.

use crate::context;
use crate::error;
use crate::parse;
use crate::parse::OptionalEquals;
use crate::prelude as txl;
use crate::token;
use crate::token::CatCode;
use crate::traits::*;
use crate::vm;
use std::rc::Rc;
use texpand_stdext::collections::groupingmap;

/// Specification for how the cell of a variable command is determined.
pub enum IndexResolver<S> {
    /// A fixed cell.
    ///
    /// For example, `\endlinechar` always references the same cell.
    Static(context::Key),
    /// A cell determined by reading the input token stream.
    ///
    /// For example, in `\count 4` the cell is determined by parsing a number
    /// from the input token stream.
    Dynamic(fn(token::Token, &mut vm::ExpandedStream<S>) -> txl::Result<context::Key>),
}

impl<S> IndexResolver<S> {
    fn resolve(
        &self,
        token: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Key> {
        match self {
            IndexResolver::Static(key) => Ok(*key),
            IndexResolver::Dynamic(f) => f(token, input),
        }
    }
}

/// A variable command.
pub struct Command<S> {
    index_resolver: IndexResolver<S>,
}

impl<S> Command<S> {
    /// Creates a command that references a single cell.
    pub fn new_singleton(key: context::Key) -> Command<S> {
        Command {
            index_resolver: IndexResolver::Static(key),
        }
    }

    /// Creates a command that references one cell of an array.
    ///
    /// The provided function reads the index from the input.
    pub fn new_array(
        f: fn(token::Token, &mut vm::ExpandedStream<S>) -> txl::Result<context::Key>,
    ) -> Command<S> {
        Command {
            index_resolver: IndexResolver::Dynamic(f),
        }
    }
}

impl<S: TexlangState> Command<S> {
    /// Determines the cell the command references.
    pub fn resolve(
        &self,
        token: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Key> {
        match self.index_resolver.resolve(token, input) {
            Ok(key) => Ok(key),
            Err(err) => Err(error::Error::new_propagated(
                input.vm(),
                error::PropagationContext::VariableIndex,
                token,
                err,
            )),
        }
    }

    /// Resolves the command and returns the current value of the cell.
    pub fn value(
        &self,
        token: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Value> {
        let key = self.resolve(token, input)?;
        Ok(input.vm().context.get(&key))
    }

    /// Resolves the command and assigns a value read from the input.
    ///
    /// The value is preceded by an optional equals sign.
    /// Its type is determined by the cell: a category code, a braced list of tokens,
    ///     or an integer.
    pub fn set_value_using_input(
        &self,
        token: token::Token,
        input: &mut vm::ExecutionInput<S>,
        scope: groupingmap::Scope,
    ) -> txl::Result<()> {
        let key = self.resolve(token, input.as_mut())?;
        let value = match read_value(key, token, input) {
            Ok(value) => value,
            Err(err) => {
                return Err(error::Error::new_propagated(
                    input.vm(),
                    error::PropagationContext::VariableAssignment,
                    token,
                    err,
                ))
            }
        };
        input.context_mut().set(key, value, scope);
        Ok(())
    }
}

fn read_value<S: TexlangState>(
    key: context::Key,
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<context::Value> {
    OptionalEquals::parse(input)?;
    Ok(match key {
        context::Key::CatCode(_) => context::Value::CatCode(CatCode::parse(input)?),
        context::Key::TokenList(_) => {
            let mut tokens = vec![];
            parse::parse_braced_tokens(input.unexpanded(), &mut tokens)?;
            context::Value::Tokens(Rc::from(tokens))
        }
        context::Key::Namespace | context::Key::Interaction => {
            return Err(error::SimpleTokenError::new(
                input.vm(),
                token,
                "this variable cannot be assigned to directly",
            )
            .into());
        }
        context::Key::Count(_) | context::Key::EndLineChar | context::Key::Integer(_) => {
            context::Value::Int(i32::parse(input)?)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command;
    use crate::parse::Uint;
    use std::collections::HashMap;

    fn count_key<S: TexlangState>(
        _: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Key> {
        let Uint(i) = Uint::<256>::parse(input)?;
        Ok(context::Key::Count(i as u16))
    }

    fn catcode_key<S: TexlangState>(
        _: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Key> {
        Ok(context::Key::CatCode(char::parse(input)?))
    }

    fn toks_key<S: TexlangState>(
        _: token::Token,
        input: &mut vm::ExpandedStream<S>,
    ) -> txl::Result<context::Key> {
        let Uint(i) = Uint::<256>::parse(input)?;
        Ok(context::Key::TokenList(i as u16))
    }

    fn new_vm(source: &str) -> Box<vm::VM<()>> {
        let built_ins: HashMap<&str, command::BuiltIn<()>> = HashMap::from([
            ("count", Command::new_array(count_key).into()),
            ("catcode", Command::new_array(catcode_key).into()),
            ("toks", Command::new_array(toks_key).into()),
            (
                "endlinechar",
                Command::new_singleton(context::Key::EndLineChar).into(),
            ),
            (
                "namespace",
                Command::new_singleton(context::Key::Namespace).into(),
            ),
        ]);
        let mut vm = vm::VM::<()>::new(built_ins);
        vm.context.set(
            context::Key::EndLineChar,
            context::Value::Int(-1),
            groupingmap::Scope::Global,
        );
        vm.push_source("input.tex", source).unwrap();
        vm
    }

    fn run(source: &str) -> txl::Result<Box<vm::VM<()>>> {
        let mut vm = new_vm(source);
        vm.run::<vm::DefaultHandlers>()?;
        Ok(vm)
    }

    fn run_err(source: &str) -> Box<error::Error> {
        match run(source) {
            Ok(_) => panic!("running {source:?} succeeded"),
            Err(err) => err,
        }
    }

    #[test]
    fn assign_count() {
        let vm = run(r"\count 4 = 17").unwrap();
        assert_eq!(vm.context.count(4), 17);
    }

    #[test]
    fn assign_count_without_equals() {
        let vm = run(r"\count 4 -3").unwrap();
        assert_eq!(vm.context.count(4), -3);
    }

    #[test]
    fn assign_count_from_count() {
        let vm = run(r"\count 1 = 5 \count 2 = \count 1").unwrap();
        assert_eq!(vm.context.count(2), 5);
    }

    #[test]
    fn internal_integer_does_not_read_ahead() {
        let mut vm = new_vm(r"\endlinechar\undefined");
        let input = vm::ExecutionInput::new(&mut vm);
        match i32::parse(input) {
            Ok(i) => assert_eq!(i, -1),
            Err(err) => panic!("{err}"),
        }
        let next = input.unexpanded().next().unwrap().unwrap();
        assert!(matches!(next.value(), token::Value::CommandRef(_)));
    }

    #[test]
    fn assign_count_from_catcode() {
        let vm = run(r"\count 1 = \catcode `\{").unwrap();
        assert_eq!(vm.context.count(1), 1);
    }

    #[test]
    fn assign_catcode() {
        let vm = run(r"\catcode `\A = 12").unwrap();
        assert_eq!(vm.context.cat_code('A'), CatCode::Other);
    }

    #[test]
    fn assign_token_list() {
        let vm = run(r"\toks 3 = {a\count b}").unwrap();
        assert_eq!(
            token::write_tokens(vm.context.token_list(3).iter(), vm.cs_name_interner()),
            r"a\count b"
        );
    }

    #[test]
    fn local_assignment_is_undone_at_group_end() {
        let vm = run(r"\count 1 = 5 {\count 1 = 6}").unwrap();
        assert_eq!(vm.context.count(1), 5);
    }

    #[test]
    fn value_reads_current_cell() {
        let mut vm = new_vm(r"\count 7");
        vm.context.set_count(7, 99, groupingmap::Scope::Local);
        let input = vm::ExecutionInput::new(&mut vm);
        let token = input.next().unwrap().unwrap();
        let token::Value::CommandRef(command_ref) = token.value() else {
            panic!("expected a command");
        };
        let Some(command::Command::Variable(cmd)) =
            input.commands_map().get_command(&command_ref).cloned()
        else {
            panic!("expected a variable command");
        };
        assert_eq!(
            cmd.value(token, input.as_mut()).unwrap(),
            context::Value::Int(99)
        );
    }

    #[test]
    fn index_out_of_range() {
        let err = run_err(r"\count 256 = 1");
        let (stack, root) = err.stack_view();
        assert_eq!(stack.len(), 1);
        assert_eq!(stack[0].context, error::PropagationContext::VariableIndex);
        assert_eq!(root.category(), error::Category::Syntax);
    }

    #[test]
    fn invalid_value() {
        let err = run_err(r"\count 1 = a");
        let (stack, _) = err.stack_view();
        assert_eq!(stack.len(), 1);
        assert_eq!(
            stack[0].context,
            error::PropagationContext::VariableAssignment
        );
        assert_eq!(err.category(), error::Category::Syntax);
    }

    #[test]
    fn namespace_cannot_be_assigned() {
        let err = run_err(r"\namespace = 1");
        assert_eq!(
            err.title(),
            "this variable cannot be assigned to directly"
        );
    }
}
