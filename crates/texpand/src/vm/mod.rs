//! The Texpand virtual machine (VM).
//!
//! This module contains the definition of the runtime VM,
//!     the input streams that wrap the VM
//!     and the main loop that is used to run Texpand.
//!
//! The VM owns everything a single run needs:
//!     the stack of token sources, the [Context](context::Context),
//!     the [command map](command::Map) and the host's custom state.
//! Independent runs each get their own VM.

use crate::command;
use crate::command::BuiltIn;
use crate::command::Command;
use crate::context;
use crate::error;
use crate::prelude as txl;
use crate::texmacro;
use crate::token;
use crate::token::lexer;
use crate::token::trace;
use crate::token::CsNameInterner;
use crate::token::Namespace;
use crate::token::NamespaceInterner;
use crate::token::Token;
use crate::token::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use texpand_stdext::collections::groupingmap;

mod streams;
pub use streams::*;

/// What the main loop does with tokens that the engine does not handle itself.
///
/// The loop runs execution commands, performs variable assignments, follows `\let` aliases
///     of characters, and opens and closes groups for `{` and `}`.
/// Everything else is passed to a handler, whose default does nothing:
///
/// | token | example | handler |
/// | --- | --- | --- |
/// | character | `b` | [character_handler](Handlers::character_handler) |
/// | expandable command that was not expanded | `\the` in `\noexpand\the` | [unexpanded_expansion_command](Handlers::unexpanded_expansion_command) |
///
/// An undefined control sequence fails with [UndefinedCommandError](error::UndefinedCommandError)
///     before it reaches a handler, unless it follows `\noexpand`.
pub trait Handlers<S: TexlangState> {
    /// Called for letters, other characters, spaces and the remaining character tokens
    ///     except braces and active characters.
    fn character_handler(token: Token, input: &mut ExecutionInput<S>) -> txl::Result<()> {
        _ = (token, input);
        Ok(())
    }

    /// Called for an expandable command that reached the main loop unexpanded.
    fn unexpanded_expansion_command(token: Token, input: &mut ExecutionInput<S>) -> txl::Result<()> {
        _ = (token, input);
        Ok(())
    }
}

pub struct DefaultHandlers;

impl<S: TexlangState> Handlers<S> for DefaultHandlers {}

impl<S: TexlangState> VM<S> {
    /// Run the VM.
    ///
    /// It is assumed that the VM has been preloaded with source code using the
    /// [VM::push_source] or [VM::push_file] methods.
    pub fn run<H: Handlers<S>>(&mut self) -> txl::Result<()> {
        let input = ExecutionInput::new(self);
        loop {
            let token = match input.next()? {
                None => break,
                Some(token) => token,
            };
            match token.value() {
                Value::CommandRef(command_ref) => {
                    let command = input.commands_map().get_command(&command_ref).cloned();
                    match command {
                        Some(Command::Execution(cmd, _)) => {
                            if let Err(err) = cmd(token, input) {
                                return Err(error::Error::new_propagated(
                                    input.vm(),
                                    error::PropagationContext::Execution,
                                    token,
                                    err,
                                ));
                            }
                        }
                        Some(Command::Variable(cmd)) => {
                            let scope = S::variable_assignment_scope_hook(input.state_mut());
                            cmd.set_value_using_input(token, input, scope)?;
                        }
                        Some(Command::CharacterTokenAlias(value)) => {
                            let aliased = Token::new_from_value(value, token.trace_key());
                            match value {
                                Value::BeginGroup(_) => {
                                    input.begin_group(context::GroupKind::Simple)
                                }
                                Value::EndGroup(_) => {
                                    input.end_group(context::GroupKind::Simple, aliased)?
                                }
                                _ => H::character_handler(aliased, input)?,
                            }
                        }
                        Some(Command::Expansion(..) | Command::Macro(_) | Command::Conditional(_))
                        | None => H::unexpanded_expansion_command(token, input)?,
                    }
                }
                Value::BeginGroup(_) => {
                    input.begin_group(context::GroupKind::Simple);
                }
                Value::EndGroup(_) => {
                    input.end_group(context::GroupKind::Simple, token)?;
                }
                Value::MathShift(_)
                | Value::AlignmentTab(_)
                | Value::Parameter(_)
                | Value::Superscript(_)
                | Value::Subscript(_)
                | Value::Space(_)
                | Value::Letter(_)
                | Value::Other(_) => H::character_handler(token, input)?,
            };
        }
        let vm = input.vm();
        if let Some(entry) = vm.context.top_conditional() {
            log::warn!(
                "the input ended with {} open conditional(s); the innermost started at {}",
                vm.conditional_depth(),
                locator(&vm.trace(entry.token)),
            );
        }
        if vm.context.group_depth() > 0 {
            log::warn!(
                "the input ended with {} open group(s)",
                vm.context.group_depth()
            );
        }
        Ok(())
    }
}

fn locator(trace: &trace::SourceCodeTrace) -> String {
    format!["{}:{}:{}", trace.origin, trace.line_number, trace.index + 1]
}

/// Limits that keep pathological input from exhausting the host.
///
/// Exceeding a limit fails with a [CapacityExceededError](error::CapacityExceededError).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of expandable commands that may be running at the same time.
    ///
    /// A macro whose expansion ends with another macro does not count twice:
    ///     the expansion loop is iterative.
    /// Nesting arises when a command reads expanded input, like `\ifnum` reading a number.
    pub max_expansion_depth: usize,
    /// Maximum number of sources in the source stack.
    pub max_input_levels: usize,
    /// Maximum number of tokens pushed back onto a source and not yet read.
    pub max_pending_tokens: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_expansion_depth: 10_000,
            max_input_levels: 500,
            max_pending_tokens: 1_000_000,
        }
    }
}

/// The Texpand virtual machine.
pub struct VM<S> {
    /// The custom state of the host.
    pub state: S,

    /// The binding table.
    pub commands_map: command::Map<S>,

    /// The group-scoped mutable state.
    pub context: context::Context,

    /// Where `\input` and [VM::push_file] read files from. Tests swap in an in-memory version.
    pub file_system: Box<dyn FileSystem>,

    /// The working directory which is used as the root for relative file paths.
    ///
    /// This is [None] if the working directory could not be determined.
    pub working_directory: Option<PathBuf>,

    pub limits: Limits,

    internal: Internal,
}

/// Read access to files.
pub trait FileSystem {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String>;
}

struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
        std::fs::read_to_string(path)
    }
}

/// Implementations of this trait may be used as the state in a Texpand VM.
///
/// The trait has no required methods, so for any type it can be implemented trivially:
/// ```
/// # use texpand::traits::TexlangState;
/// struct SomeNewType;
///
/// impl TexlangState for SomeNewType {}
/// ```
///
/// Methods of the trait are invoked at certain points when the VM is running,
///     and offer a way of customizing the behavior of the VM.
/// The trait methods are all dispatched statically.
pub trait TexlangState: Sized {
    /// Hook that is invoked after a macro is expanded.
    ///
    /// This hook is designed to support the `\tracingmacros` primitive.
    fn post_macro_expansion_hook(
        token: Token,
        input: &ExpansionInput<Self>,
        tex_macro: &texmacro::Macro,
        arguments: &[&[Token]],
        reversed_expansion: &[Token],
    ) {
        _ = (token, input, tex_macro, arguments, reversed_expansion);
    }

    /// Hook that potentially overrides the expansion of an expansion primitive.
    ///
    /// This hook is invoked before an expansion primitive is expanded.
    /// If the result of the hook is non-empty, that token is considered the expansion
    ///     and is returned without being expanded.
    ///
    /// This hook is designed to support the `\noexpand` primitive.
    fn expansion_override_hook(
        token: Token,
        input: &mut ExpansionInput<Self>,
        tag: Option<command::Tag>,
    ) -> txl::Result<Option<Token>> {
        _ = (token, input, tag);
        Ok(None)
    }

    /// Hook that determines the scope of a variable assignment.
    ///
    /// This hook is designed to support the `\global` prefix.
    fn variable_assignment_scope_hook(state: &mut Self) -> groupingmap::Scope {
        _ = state;
        groupingmap::Scope::Local
    }
}

impl TexlangState for () {}

impl<S: Default> VM<S> {
    /// Create a new VM.
    pub fn new(initial_built_ins: HashMap<&str, BuiltIn<S>>) -> Box<VM<S>> {
        let mut internal = Internal::new();
        let initial_built_ins = initial_built_ins
            .into_iter()
            .map(|(key, value)| (internal.cs_name_interner.get_or_intern(key), value))
            .collect();
        Box::new(VM {
            state: Default::default(),
            commands_map: command::Map::new(initial_built_ins),
            context: Default::default(),
            internal,
            file_system: Box::new(RealFileSystem {}),
            working_directory: match std::env::current_dir() {
                Ok(path_buf) => Some(path_buf),
                Err(err) => {
                    log::warn!("failed to determine the working directory: {err}");
                    None
                }
            },
            limits: Default::default(),
        })
    }
}

impl<S> VM<S> {
    /// Add new source code to the VM.
    ///
    /// Source code is organized as a stack.
    /// Pushing source code onto the stack means it is read first.
    pub fn push_source<T1: Into<PathBuf>, T2: Into<String>>(
        &mut self,
        file_name: T1,
        source_code: T2,
    ) -> txl::Result<()> {
        self.push_source_internal(None, file_name.into(), source_code.into())
    }

    /// Read a file using the VM's [FileSystem] and add its content to the VM.
    ///
    /// Relative paths are resolved against the working directory.
    pub fn push_file<T: Into<PathBuf>>(&mut self, path: T) -> txl::Result<()> {
        let path = self.resolve_path(path.into());
        match self.file_system.read_to_string(&path) {
            Ok(source_code) => self.push_source_internal(None, path, source_code),
            Err(err) => {
                Err(error::ResourceError::new(self, None, &path.display().to_string(), &err).into())
            }
        }
    }

    /// Resolves a relative path against the working directory.
    pub fn resolve_path(&self, path: PathBuf) -> PathBuf {
        match &self.working_directory {
            Some(working_directory) if path.is_relative() => working_directory.join(path),
            _ => path,
        }
    }

    fn push_source_internal(
        &mut self,
        token: Option<Token>,
        file_name: PathBuf,
        source_code: String,
    ) -> txl::Result<()> {
        if self.internal.sources.len() + 1 >= self.limits.max_input_levels {
            return Err(error::CapacityExceededError::new(
                self,
                token,
                "input levels",
                self.limits.max_input_levels,
            )
            .into());
        }
        log::debug!(
            "pushing source `{}` at input level {}",
            file_name.display(),
            self.internal.sources.len() + 1
        );
        let trace_key_range = self.internal.tracer.register_source_code(
            token,
            trace::Origin::File(file_name),
            &source_code,
        );
        let mut new_source = Source::new(source_code, trace_key_range);
        std::mem::swap(&mut new_source, &mut self.internal.current_source);
        self.internal.sources.push(new_source);
        Ok(())
    }

    /// Push tokens to the front of the input.
    ///
    /// The first token in the slice is the next token read.
    pub fn push_back(&mut self, tokens: &[Token]) {
        self.internal.push_expansion(tokens)
    }

    /// Clear all source code from the VM.
    pub fn clear_sources(&mut self) {
        self.internal.clear_sources()
    }

    /// Return a reference to the control sequence name string interner.
    ///
    /// This interner can be used to resolve [CsName](token::CsName) types into regular strings.
    #[inline]
    pub fn cs_name_interner(&self) -> &CsNameInterner {
        &self.internal.cs_name_interner
    }

    /// Return a reference to the namespace name interner.
    pub fn namespace_interner(&self) -> &NamespaceInterner {
        &self.internal.namespace_interner
    }

    /// Returns the namespace with the provided name, creating it if needed.
    ///
    /// Returns [None] if the maximum number of namespaces has been reached.
    pub fn intern_namespace(&mut self, name: &str) -> Option<Namespace> {
        self.internal.namespace_interner.try_get_or_intern(name)
    }

    /// Begins a group in both the context and the command map.
    pub fn begin_group(&mut self, kind: context::GroupKind) {
        self.context.open_group(kind);
        self.commands_map.begin_group();
    }

    /// Ends the innermost group, undoing its local assignments and definitions.
    ///
    /// The token is the command that ends the group and is used for error messages.
    pub fn end_group(&mut self, kind: context::GroupKind, token: Token) -> txl::Result<()> {
        match self.context.close_group(kind) {
            Ok(()) => {}
            Err(context::GroupError::NoGroup) => {
                return Err(error::EndOfGroupError {
                    trace: self.trace(token),
                }
                .into())
            }
            Err(context::GroupError::Mismatch { open, close }) => {
                return Err(error::GroupMismatchError {
                    trace: self.trace(token),
                    open: open.to_string(),
                    close: close.to_string(),
                }
                .into())
            }
        }
        if self.commands_map.end_group().is_err() {
            return Err(error::EndOfGroupError {
                trace: self.trace(token),
            }
            .into());
        }
        Ok(())
    }

    /// Copies every exported binding of the source namespace into the current namespace.
    ///
    /// The copy is made now; later changes in the source namespace are not seen.
    /// Returns the number of bindings copied.
    pub fn import_namespace(&mut self, source: Namespace, scope: groupingmap::Scope) -> usize {
        let target = self.context.namespace();
        let mut imported = 0_usize;
        for name in self.context.exports(source).to_vec() {
            let from = token::CommandRef::ControlSequence(name, source);
            let Some(command) = self.commands_map.get_command_in_namespace(&from).cloned() else {
                continue;
            };
            self.commands_map
                .insert(from.in_namespace(target), command, scope);
            imported += 1;
        }
        log::debug!(
            "imported {imported} binding(s) from namespace `{}` into `{}`",
            self.internal.namespace_interner.resolve(source).unwrap_or(""),
            self.internal.namespace_interner.resolve(target).unwrap_or(""),
        );
        imported
    }

    /// Returns the number of open conditionals.
    pub fn conditional_depth(&self) -> usize {
        self.context.conditionals().len()
    }

    /// Returns the number of expandable commands currently running.
    pub fn expansion_depth(&self) -> usize {
        self.internal.expansion_depth
    }

    /// Returns the largest expansion depth reached so far.
    pub fn max_expansion_depth_reached(&self) -> usize {
        self.internal.max_expansion_depth_reached
    }

    /// Returns the number of sources in the source stack.
    pub fn input_levels(&self) -> usize {
        self.internal.sources.len()
    }

    pub fn trace(&self, token: Token) -> trace::SourceCodeTrace {
        self.internal
            .tracer
            .trace(token, &self.internal.cs_name_interner)
    }

    pub fn trace_end_of_input(&self) -> trace::SourceCodeTrace {
        self.internal.tracer.trace_end_of_input()
    }
}

/// Parts of the VM that are private.
struct Internal {
    // The sources form a stack. We store the top element directly on the VM
    // for performance reasons.
    current_source: Source,
    sources: Vec<Source>,

    cs_name_interner: CsNameInterner,
    namespace_interner: NamespaceInterner,

    tracer: trace::Tracer,

    // Pool of empty token vectors that keep their capacity between uses.
    token_buffers: Vec<Vec<Token>>,

    expansion_depth: usize,
    max_expansion_depth_reached: usize,
}

impl Internal {
    fn new() -> Self {
        let mut namespace_interner = NamespaceInterner::default();
        // The root namespace is the first interned name.
        namespace_interner.get_or_intern("");
        Internal {
            current_source: Default::default(),
            sources: Default::default(),
            cs_name_interner: Default::default(),
            namespace_interner,
            tracer: Default::default(),
            token_buffers: Default::default(),
            expansion_depth: 0,
            max_expansion_depth_reached: 0,
        }
    }

    fn clear_sources(&mut self) {
        self.current_source = Default::default();
        self.sources.clear();
    }

    fn end_current_file(&mut self) {
        self.current_source.root.end_after_current_line()
    }

    #[inline]
    fn push_expansion(&mut self, expansion: &[Token]) {
        self.current_source
            .expansions
            .extend(expansion.iter().rev());
    }

    #[inline]
    fn expansions(&self) -> &Vec<Token> {
        &self.current_source.expansions
    }

    #[inline]
    fn expansions_mut(&mut self) -> &mut Vec<Token> {
        &mut self.current_source.expansions
    }

    fn take_token_buffer(&mut self) -> Vec<Token> {
        self.token_buffers.pop().unwrap_or_default()
    }

    fn give_back_token_buffer(&mut self, mut buffer: Vec<Token>) {
        buffer.clear();
        self.token_buffers.push(buffer);
    }

    fn pop_source(&mut self) -> bool {
        match self.sources.pop() {
            None => false,
            Some(source) => {
                self.current_source = source;
                log::debug!("popped source, input level is now {}", self.sources.len());
                true
            }
        }
    }
}

struct Source {
    // Tokens pushed back onto the source. The next token is the last element.
    expansions: Vec<Token>,
    root: lexer::Lexer,
    // A pushed back token that must not be expanded when it is read, with its index.
    frozen: Option<(usize, Token)>,
}

impl Source {
    pub fn new(source_code: String, trace_key_range: trace::KeyRange) -> Source {
        Source {
            expansions: Vec::with_capacity(32),
            root: lexer::Lexer::new(source_code, trace_key_range),
            frozen: None,
        }
    }

    /// Pops the next pushed back token, and returns whether it is frozen.
    #[inline]
    fn pop_expansion(&mut self) -> Option<(Token, bool)> {
        let token = self.expansions.pop()?;
        let frozen = match self.frozen {
            Some((i, frozen)) if i >= self.expansions.len() => {
                self.frozen = None;
                i == self.expansions.len() && frozen == token
            }
            _ => false,
        };
        Some((token, frozen))
    }

    fn is_top_frozen(&self) -> bool {
        match (self.frozen, self.expansions.last()) {
            (Some((i, frozen)), Some(top)) => i + 1 == self.expansions.len() && frozen == *top,
            _ => false,
        }
    }

    fn push_frozen(&mut self, token: Token) {
        self.frozen = Some((self.expansions.len(), token));
        self.expansions.push(token);
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::new("".into(), trace::KeyRange::empty())
    }
}

/// Access to one component of the VM state.
///
/// Commands that keep private state (the `\global` flag, the output of a script run)
///     store it in a component type defined next to the command.
/// The command's trait bounds require `HasComponent<ThatComponent>`,
///     so any state that contains the component can use the command.
pub trait HasComponent<C>: TexlangState {
    fn component(&self) -> &C;

    fn component_mut(&mut self) -> &mut C;
}

/// Implements [HasComponent] for components that are fields of the state struct.
///
/// ```
/// # mod counter { pub struct Component; }
/// # mod output { pub struct Component; }
/// # use texpand::vm::implement_has_component;
/// # use texpand::traits::*;
/// struct State {
///     counter: counter::Component,
///     output: output::Component,
/// }
///
/// impl TexlangState for State {}
///
/// implement_has_component![
///     State,
///     (counter::Component, counter),
///     (output::Component, output),
/// ];
/// ```
///
/// A single component can also be written as `implement_has_component![State, counter::Component, counter]`.
#[macro_export]
macro_rules! implement_has_component {
    ( $type: path, $component: path, $field: ident ) => {
        implement_has_component![$type, ($component, $field),];
    };
    ( $type: path, $(($component: path, $field: ident),)+) => {
        $(
            impl ::texpand::vm::HasComponent<$component> for $type {
                #[inline]
                fn component(&self) -> &$component {
                    &self.$field
                }
                #[inline]
                fn component_mut(&mut self) -> &mut $component {
                    &mut self.$field
                }
            }
        )*
    };
}

pub use implement_has_component;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Category;
    use crate::traits::*;
    use std::cell::RefCell;

    fn new_vm() -> Box<VM<()>> {
        let mut vm: Box<VM<()>> = VM::new(crate::conditional::built_ins().into_iter().collect());
        vm.context.set(
            context::Key::EndLineChar,
            context::Value::Int(-1),
            groupingmap::Scope::Global,
        );
        vm
    }

    fn read_all(vm: &mut VM<()>) -> txl::Result<Vec<Token>> {
        let input = ExecutionInput::new(vm);
        let mut tokens = vec![];
        while let Some(token) = input.next()? {
            tokens.push(token);
        }
        Ok(tokens)
    }

    #[test]
    fn push_back_round_trip() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "xyz").unwrap();
        let original: Vec<Token> = {
            let input = ExecutionInput::new(&mut vm);
            (0..3).map(|_| input.next().unwrap().unwrap()).collect()
        };
        vm.push_source("input2.tex", "tail").unwrap();
        for n in 0..=original.len() {
            vm.push_back(&original[..n]);
            let input = ExecutionInput::new(&mut vm);
            let popped: Vec<Token> = (0..n)
                .map(|_| input.unexpanded().next().unwrap().unwrap())
                .collect();
            assert_eq!(popped, original[..n].to_vec());
        }
        let rest = read_all(&mut vm).unwrap();
        assert_eq!(token::write_tokens(&rest, vm.cs_name_interner()), "tail");
    }

    #[test]
    fn push_back_is_read_before_source() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "b").unwrap();
        let a = Token::new_letter('a', trace::Key::dummy());
        vm.push_back(&[a, a]);
        let tokens = read_all(&mut vm).unwrap();
        assert_eq!(token::write_tokens(&tokens, vm.cs_name_interner()), "aab");
    }

    #[test]
    fn end_of_input_only_after_every_source() {
        let mut vm = new_vm();
        vm.push_source("outer.tex", "A").unwrap();
        vm.push_source("empty.tex", "").unwrap();
        vm.push_source("inner.tex", "B").unwrap();
        assert_eq!(vm.input_levels(), 3);
        let tokens = read_all(&mut vm).unwrap();
        assert_eq!(token::write_tokens(&tokens, vm.cs_name_interner()), "BA");
        let input = ExecutionInput::new(&mut vm);
        assert!(input.next().unwrap().is_none());
    }

    #[test]
    fn conditionals_are_expanded_eagerly() {
        let mut vm = new_vm();
        vm.push_source("input.tex", r"\iftrue\iftrue\iffalse\else A\fi\fi\fi").unwrap();
        let input = ExecutionInput::new(&mut vm);
        let first = input.peek().unwrap().copied();
        assert_eq!(first.map(|t| t.value()), Some(Value::Letter('A')));
        assert_eq!(input.vm().conditional_depth(), 3);
        assert_eq!(input.next().unwrap(), first);
    }

    #[test]
    fn expand_once() {
        let mut vm = new_vm();
        vm.push_source("input.tex", r"\iftrue A\fi").unwrap();
        let input = ExecutionInput::new(&mut vm);
        assert!(input.as_mut().expand_once().unwrap());
        assert_eq!(input.vm().conditional_depth(), 1);
        assert!(!input.as_mut().expand_once().unwrap());
        assert_eq!(
            input.unexpanded().next().unwrap().map(|t| t.value()),
            Some(Value::Letter('A'))
        );
    }

    #[test]
    fn undefined_control_sequence() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "A\n  \\undefined").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::UndefinedControlSequence);
        assert_eq!(err.title(), "undefined control sequence \\undefined");
        let locator = err.locator().unwrap();
        assert_eq!(locator.line_number, 2);
        assert_eq!(locator.index, 2);
    }

    #[test]
    fn undefined_control_sequence_suggestion() {
        let mut vm = new_vm();
        vm.push_source("input.tex", r"\iftrux").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        let root = err.root();
        let notes: Vec<String> = root.notes().iter().map(|n| format!["{n}"]).collect();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].contains("iftrue"), "{notes:?}");
    }

    // Reads the next expanded token, which runs this command again one level deeper.
    fn deep_expansion_fn(_: Token, input: &mut ExpansionInput<()>) -> txl::Result<()> {
        if let Some(next) = input.next()? {
            input.back(next);
        }
        Ok(())
    }

    #[test]
    fn expansion_depth_is_limited() {
        let mut built_ins: HashMap<&str, BuiltIn<()>> = HashMap::new();
        built_ins.insert("deep", BuiltIn::new_expansion(deep_expansion_fn));
        let mut vm: Box<VM<()>> = VM::new(built_ins);
        vm.limits.max_expansion_depth = 50;
        vm.push_source("input.tex", r"\deep\deep\deep".repeat(40)).unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::Capacity);
        assert_eq!(vm.max_expansion_depth_reached(), 50);
        assert_eq!(vm.expansion_depth(), 0);
    }

    #[test]
    fn simple_expansion_chains_do_not_nest() {
        let mut vm = new_vm();
        vm.push_source("input.tex", r"\iftrue \fi".repeat(1000) + " A").unwrap();
        let tokens = read_all(&mut vm).unwrap();
        assert_eq!(token::write_tokens(&tokens, vm.cs_name_interner()), "A");
        assert_eq!(vm.max_expansion_depth_reached(), 1);
    }

    fn self_doubling_fn(token: Token, input: &mut ExpansionInput<()>) -> txl::Result<()> {
        input.expansions_mut().push(token);
        input.expansions_mut().push(token);
        Ok(())
    }

    #[test]
    fn pending_tokens_are_limited() {
        let mut built_ins: HashMap<&str, BuiltIn<()>> = HashMap::new();
        built_ins.insert("double", BuiltIn::new_expansion(self_doubling_fn));
        let mut vm: Box<VM<()>> = VM::new(built_ins);
        vm.limits.max_pending_tokens = 1_000;
        vm.push_source("input.tex", r"\double").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::Capacity);
        assert!(err.title().contains("pending tokens"), "{}", err.title());
    }

    #[test]
    fn input_levels_are_limited() {
        let mut vm = new_vm();
        vm.limits.max_input_levels = 4;
        for i in 0..3 {
            vm.push_source(format!["{i}.tex"], "A").unwrap();
        }
        let err = vm.push_source("3.tex", "A").unwrap_err();
        assert_eq!(err.category(), Category::Capacity);
    }

    #[test]
    fn malformed_caret_notation() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "A^^^^00g").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::MalformedToken);
        let root = err.root();
        assert_eq!(root.title(), "malformed token `^^^^00`");
    }

    #[test]
    fn empty_control_sequence() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "A\\").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::MalformedToken);
        assert_eq!(err.title(), "malformed token `\\`");
    }

    #[test]
    fn invalid_character() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "A\u{7F}").unwrap();
        let err = read_all(&mut vm).unwrap_err();
        assert_eq!(err.category(), Category::MalformedToken);
    }

    #[test]
    fn groups_scope_context_and_bindings() {
        let mut vm = new_vm();
        vm.push_source("input.tex", "").unwrap();
        let iftrue = vm.cs_name_interner().get("iftrue").unwrap();
        let alias = token::CommandRef::ControlSequence(iftrue, Namespace::ROOT);
        vm.begin_group(context::GroupKind::SemiSimple);
        vm.context.set_count(1, 5, groupingmap::Scope::Local);
        vm.commands_map.remove(&alias, groupingmap::Scope::Local);
        assert!(vm.commands_map.get_command(&alias).is_none());
        let token = Token::new_other('x', trace::Key::dummy());
        let err = vm.end_group(context::GroupKind::Simple, token).unwrap_err();
        assert_eq!(err.category(), Category::Group);
        vm.end_group(context::GroupKind::SemiSimple, token).unwrap();
        assert_eq!(vm.context.count(1), 0);
        assert!(vm.commands_map.get_command(&alias).is_some());
        let err = vm.end_group(context::GroupKind::SemiSimple, token).unwrap_err();
        assert_eq!(err.title(), "there is no group to end");
    }

    #[test]
    fn run_handles_groups_and_characters() {
        struct Recorder;
        thread_local! {
            static SEEN: RefCell<String> = const { RefCell::new(String::new()) };
        }
        impl Handlers<()> for Recorder {
            fn character_handler(token: Token, input: &mut ExecutionInput<()>) -> txl::Result<()> {
                let depth = input.vm().context.group_depth();
                SEEN.with(|seen| {
                    seen.borrow_mut()
                        .push_str(&format!["{}{depth}", token.char().unwrap_or('?')])
                });
                Ok(())
            }
        }
        let mut vm = new_vm();
        vm.push_source("input.tex", "a{b{c}}d").unwrap();
        vm.run::<Recorder>().unwrap();
        SEEN.with(|seen| assert_eq!(*seen.borrow(), "a0b1c2d0"));

        let mut vm = new_vm();
        vm.push_source("input.tex", "}").unwrap();
        let err = vm.run::<DefaultHandlers>().unwrap_err();
        assert_eq!(err.category(), Category::Group);
    }

    #[test]
    fn namespaces_import_copies_exported_bindings() {
        let mut vm = new_vm();
        let library = vm.intern_namespace("library").unwrap();
        let user = vm.intern_namespace("user").unwrap();
        assert_ne!(library, Namespace::ROOT);
        let iftrue = vm.cs_name_interner().get("iftrue").unwrap();
        let iffalse = vm.cs_name_interner().get("iffalse").unwrap();
        let in_library = token::CommandRef::ControlSequence(iftrue, library);
        let iffalse_binding = vm
            .commands_map
            .lookup(iffalse, Namespace::ROOT)
            .cloned()
            .unwrap();
        vm.commands_map
            .insert(in_library, iffalse_binding, groupingmap::Scope::Local);
        vm.context.export(library, [iftrue]);

        vm.context
            .set_namespace(user, groupingmap::Scope::Local);
        assert_eq!(vm.import_namespace(library, groupingmap::Scope::Local), 1);
        let in_user = vm.commands_map.lookup(iftrue, user).unwrap();
        let root_iffalse = vm
            .commands_map
            .lookup(iffalse, Namespace::ROOT)
            .cloned()
            .unwrap();
        assert!(in_user.is_same(&root_iffalse));

        // The import is a copy.
        vm.commands_map
            .remove(&in_library, groupingmap::Scope::Local);
        assert!(vm.commands_map.lookup(iftrue, user).unwrap().is_same(&root_iffalse));
    }

    struct InMemoryFileSystem(HashMap<PathBuf, String>);

    impl FileSystem for InMemoryFileSystem {
        fn read_to_string(&self, path: &std::path::Path) -> std::io::Result<String> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        }
    }

    #[test]
    fn push_file() {
        let mut vm = new_vm();
        vm.working_directory = Some(PathBuf::from("/work"));
        vm.file_system = Box::new(InMemoryFileSystem(HashMap::from([(
            PathBuf::from("/work/a.tex"),
            "A".to_string(),
        )])));
        vm.push_file("a.tex").unwrap();
        let tokens = read_all(&mut vm).unwrap();
        assert_eq!(token::write_tokens(&tokens, vm.cs_name_interner()), "A");

        let err = vm.push_file("missing.tex").unwrap_err();
        assert_eq!(err.category(), Category::Resource);
        assert!(err.locator().is_some());
    }
}
