use std::path::PathBuf;

use super::TexlangState;
use crate::prelude as txl;
use crate::token::trace;
use crate::token::Token;
use crate::*;
use texpand_stdext::collections::groupingmap;

/// A source of tokens that are produced on demand.
///
/// The four implementations are [ExecutionInput], [ExpansionInput], [ExpandedStream]
///     and [UnexpandedStream]; the trait lets parsing code accept any of them.
///
/// Tokens are lexed only when they are requested because earlier tokens can change how
///     later characters are lexed.
/// In `\catcode`\@=11 \a@` the `@` is a letter by the time it is read,
///     so the second control sequence is `\a@` and not `\a` followed by `@`.
pub trait TokenStream {
    /// The type of the custom state in the VM.
    type S;

    /// Removes and returns the next token.
    ///
    /// `Ok(None)` means every source on the stack is exhausted.
    fn next(&mut self) -> txl::Result<Option<Token>>;

    /// Returns the next token without removing it.
    ///
    /// Peeking needs mutable access: the lexer may have to run,
    ///     and on an expanded stream the next command is expanded in place, which cannot be undone.
    fn peek(&mut self) -> txl::Result<Option<&Token>>;

    /// Pushes a token to the front of the stream, so that it is the next token read.
    ///
    /// When read from an expanded stream the token is subject to expansion again.
    fn back(&mut self, token: Token);

    /// Drops the next token, usually one that was just peeked at.
    fn consume(&mut self) -> txl::Result<()> {
        self.next().map(|_| ())
    }

    /// Gets the next token, or fails if the input has ended.
    ///
    /// The argument describes what was being done when the input ended,
    ///     and appears in the error title.
    fn next_or_err(&mut self, doing: &str) -> txl::Result<Token> {
        match self.next()? {
            Some(token) => Ok(token),
            None => Err(error::SimpleEndOfInputError::new(
                self.vm(),
                format!["the input ended while {doing}"],
            )
            .into()),
        }
    }

    fn vm(&self) -> &vm::VM<Self::S>;

    #[inline]
    fn commands_map(&self) -> &command::Map<Self::S> {
        &self.vm().commands_map
    }

    #[inline]
    fn state(&self) -> &Self::S {
        &self.vm().state
    }

    fn trace(&self, token: Token) -> trace::SourceCodeTrace {
        self.vm().trace(token)
    }

    fn trace_end_of_input(&self) -> trace::SourceCodeTrace {
        self.vm().trace_end_of_input()
    }
}

/// The input with every expandable command expanded before it is returned.
#[repr(transparent)]
pub struct ExpandedStream<S>(UnexpandedStream<S>);

impl<S> std::convert::AsMut<ExpandedStream<S>> for ExpandedStream<S> {
    fn as_mut(&mut self) -> &mut ExpandedStream<S> {
        self
    }
}

impl<S: TexlangState> ExpandedStream<S> {
    /// Returns the underlying unexpanded stream.
    pub fn unexpanded(&mut self) -> &mut UnexpandedStream<S> {
        &mut self.0
    }

    /// Expands the next token if it is expandable, and nothing after it.
    ///
    /// Returns whether an expansion happened.
    pub fn expand_once(&mut self) -> txl::Result<bool> {
        stream::expand_once(&mut self.0 .0)
    }
}

impl<S: TexlangState> TokenStream for ExpandedStream<S> {
    type S = S;

    #[inline]
    fn next(&mut self) -> txl::Result<Option<Token>> {
        stream::next_expanded(&mut self.0 .0)
    }

    #[inline]
    fn peek(&mut self) -> txl::Result<Option<&Token>> {
        stream::peek_expanded(&mut self.0 .0)
    }

    #[inline]
    fn back(&mut self, token: Token) {
        self.0 .0.internal.expansions_mut().push(token);
    }

    #[inline]
    fn vm(&self) -> &vm::VM<Self::S> {
        &self.0 .0
    }
}

/// The input as it is, without expansion.
///
/// Used for macro parameter and replacement text, `\let` targets and conditional skipping.
#[repr(transparent)]
pub struct UnexpandedStream<S>(vm::VM<S>);

impl<S: TexlangState> TokenStream for UnexpandedStream<S> {
    type S = S;

    #[inline]
    fn next(&mut self) -> txl::Result<Option<Token>> {
        stream::next_unexpanded(&mut self.0)
    }

    #[inline]
    fn peek(&mut self) -> txl::Result<Option<&Token>> {
        stream::peek_unexpanded(&mut self.0)
    }

    #[inline]
    fn back(&mut self, token: Token) {
        self.0.internal.expansions_mut().push(token);
    }

    #[inline]
    fn vm(&self) -> &vm::VM<S> {
        &self.0
    }
}

impl<S> UnexpandedStream<S> {
    /// Returns the next token and whether `\noexpand` marked it as not to be expanded.
    ///
    /// The mark only applies to the read that consumes the token.
    pub fn next_with_mark(&mut self) -> txl::Result<Option<(Token, bool)>> {
        stream::next_unexpanded_and_frozen(&mut self.0)
    }
}

/// What an expansion command sees of the VM.
///
/// As a [TokenStream] it yields expanded tokens; [unexpanded](ExpansionInput::unexpanded)
///     gives the raw input.
/// The VM itself is read only, apart from the front of the input:
///     expansion commands may push tokens ([push_expansion](ExpansionInput::push_expansion),
///     [expansions_mut](ExpansionInput::expansions_mut)) and source code
///     ([push_source](ExpansionInput::push_source)).
///
/// Parsing code takes this type when it must accept both inputs,
///     since an [ExecutionInput] can be viewed as one without gaining any access.
#[repr(transparent)]
pub struct ExpansionInput<S>(ExpandedStream<S>);

impl<S> std::convert::AsMut<ExpandedStream<S>> for ExpansionInput<S> {
    fn as_mut(&mut self) -> &mut ExpandedStream<S> {
        &mut self.0
    }
}

impl<S: TexlangState> TokenStream for ExpansionInput<S> {
    type S = S;

    fn next(&mut self) -> txl::Result<Option<Token>> {
        self.0.next()
    }

    fn peek(&mut self) -> txl::Result<Option<&Token>> {
        self.0.peek()
    }

    fn back(&mut self, token: Token) {
        self.0.back(token)
    }

    fn vm(&self) -> &vm::VM<Self::S> {
        self.0.vm()
    }
}

impl<S> ExpansionInput<S> {
    /// Creates a mutable reference to this type from the [VM](vm::VM) type.
    #[inline]
    pub fn new(vm: &mut vm::VM<S>) -> &mut ExpansionInput<S> {
        unsafe { &mut *(vm as *mut vm::VM<S> as *mut ExpansionInput<S>) }
    }

    #[inline]
    fn vm_mut(&mut self) -> &mut vm::VM<S> {
        &mut self.0 .0 .0
    }

    #[inline]
    pub fn unexpanded(&mut self) -> &mut UnexpandedStream<S> {
        &mut self.0 .0
    }

    #[inline]
    pub fn expanded(&mut self) -> &mut ExpandedStream<S> {
        &mut self.0
    }

    /// Push source code to the front of the input stream.
    ///
    /// The token is the command that requested the source, and is used in error messages.
    #[inline]
    pub fn push_source(
        &mut self,
        token: Token,
        file_name: PathBuf,
        source_code: String,
    ) -> txl::Result<()> {
        self.vm_mut()
            .push_source_internal(Some(token), file_name, source_code)
    }

    /// Read a file using the VM's [FileSystem](super::FileSystem) and push its content to the front of the input.
    pub fn push_file(&mut self, token: Token, path: PathBuf) -> txl::Result<()> {
        let vm = self.vm_mut();
        let path = vm.resolve_path(path);
        match vm.file_system.read_to_string(&path) {
            Ok(source_code) => vm.push_source_internal(Some(token), path, source_code),
            Err(err) => Err(error::ResourceError::new(
                vm,
                Some(token),
                &path.display().to_string(),
                &err,
            )
            .into()),
        }
    }

    /// End the current file.
    ///
    /// This method is used by `\endinput` primitive.
    pub fn end_current_file(&mut self) {
        self.vm_mut().internal.end_current_file()
    }

    /// Push the characters of the string to the front of the input as character tokens.
    ///
    /// Spaces become space tokens and every other character becomes an other token.
    pub fn push_string_tokens(&mut self, token: Token, s: &str) {
        let trace_key = token.trace_key();
        for c in s.chars().rev() {
            let token = match c {
                ' ' => token::Token::new_space(' ', trace_key),
                _ => token::Token::new_other(c, trace_key),
            };
            self.expansions_mut().push(token);
        }
    }

    /// Push tokens to the front of the input stream.
    ///
    /// The first token in the provided slice will be the next token read.
    #[inline]
    pub fn push_expansion(&mut self, expansion: &[Token]) {
        self.vm_mut().internal.push_expansion(expansion)
    }

    /// Tokens pushed to the front of the input, in reverse order: the last one is read next.
    #[inline]
    pub fn expansions(&self) -> &Vec<Token> {
        self.0 .0 .0.internal.expansions()
    }

    /// Mutable access to the pushed-back tokens; the last token is read next.
    ///
    /// Pushing here directly avoids building a slice for [ExpansionInput::push_expansion].
    #[inline]
    pub fn expansions_mut(&mut self) -> &mut Vec<Token> {
        self.vm_mut().internal.expansions_mut()
    }

    /// Returns a mutable reference to the context.
    ///
    /// Only the conditional machinery mutates the context during expansion.
    #[inline]
    pub(crate) fn context_mut(&mut self) -> &mut context::Context {
        &mut self.vm_mut().context
    }

    /// Takes an empty vector from the VM's pool of token buffers.
    ///
    /// Buffers keep their capacity between uses, so macro argument collection rarely allocates.
    /// Nested macro expansions each take their own buffer.
    /// Give it back with [return_token_buffer](ExpansionInput::return_token_buffer).
    pub fn checkout_token_buffer(&mut self) -> Vec<Token> {
        self.vm_mut().internal.take_token_buffer()
    }

    /// Hands a buffer from [checkout_token_buffer](ExpansionInput::checkout_token_buffer) back to the pool.
    pub fn return_token_buffer(&mut self, token_buffer: Vec<Token>) {
        self.vm_mut().internal.give_back_token_buffer(token_buffer)
    }
}

/// What an execution command sees of the VM.
///
/// Like [ExpansionInput] it reads expanded tokens by default.
/// In addition it can change the VM: the state ([state_mut](ExecutionInput::state_mut)),
///     the context ([context_mut](ExecutionInput::context_mut))
///     and the bindings ([commands_map_mut](ExecutionInput::commands_map_mut)).
#[repr(transparent)]
pub struct ExecutionInput<S>(ExpandedStream<S>);

impl<S> std::convert::AsMut<ExpandedStream<S>> for ExecutionInput<S> {
    fn as_mut(&mut self) -> &mut ExpandedStream<S> {
        &mut self.0
    }
}

impl<S: TexlangState> TokenStream for ExecutionInput<S> {
    type S = S;

    fn next(&mut self) -> txl::Result<Option<Token>> {
        self.0.next()
    }

    fn peek(&mut self) -> txl::Result<Option<&Token>> {
        self.0.peek()
    }

    fn back(&mut self, token: Token) {
        self.0.back(token)
    }

    fn vm(&self) -> &vm::VM<Self::S> {
        self.0.vm()
    }
}

impl<S> ExecutionInput<S> {
    /// Creates a mutable reference to this type from the [VM](vm::VM) type.
    #[inline]
    pub fn new(vm: &mut vm::VM<S>) -> &mut ExecutionInput<S> {
        unsafe { &mut *(vm as *mut vm::VM<S> as *mut ExecutionInput<S>) }
    }

    #[inline]
    fn vm_mut(&mut self) -> &mut vm::VM<S> {
        &mut self.0 .0 .0
    }

    #[inline]
    pub fn unexpanded(&mut self) -> &mut UnexpandedStream<S> {
        &mut self.0 .0
    }

    #[inline]
    pub fn commands_map_mut(&mut self) -> &mut command::Map<S> {
        &mut self.vm_mut().commands_map
    }

    /// Returns a mutable reference to the state.
    #[inline]
    pub fn state_mut(&mut self) -> &mut S {
        &mut self.vm_mut().state
    }

    /// Returns a mutable reference to the context.
    #[inline]
    pub fn context_mut(&mut self) -> &mut context::Context {
        &mut self.vm_mut().context
    }

    /// Returns the namespace with the provided name, creating it if needed.
    ///
    /// The token is the command that requested the namespace, and is used in error messages.
    pub fn intern_namespace(&mut self, token: Token, name: &str) -> txl::Result<token::Namespace> {
        match self.vm_mut().intern_namespace(name) {
            Some(namespace) => Ok(namespace),
            None => Err(error::CapacityExceededError::new(
                self.vm_mut(),
                Some(token),
                "namespaces",
                u16::MAX as usize - 1,
            )
            .into()),
        }
    }

    /// See [VM::import_namespace](vm::VM::import_namespace).
    pub fn import_namespace(
        &mut self,
        source: token::Namespace,
        scope: groupingmap::Scope,
    ) -> usize {
        self.vm_mut().import_namespace(source, scope)
    }

    pub fn begin_group(&mut self, kind: context::GroupKind) {
        self.vm_mut().begin_group(kind)
    }

    pub fn end_group(&mut self, kind: context::GroupKind, token: Token) -> txl::Result<()> {
        self.vm_mut().end_group(kind, token)
    }

    /// Push tokens to the front of the input stream.
    ///
    /// The first token in the provided slice will be the next token read.
    #[inline]
    pub fn push_expansion(&mut self, expansion: &[Token]) {
        self.vm_mut().internal.push_expansion(expansion)
    }

    /// See [ExpansionInput::checkout_token_buffer].
    pub fn checkout_token_buffer(&mut self) -> Vec<Token> {
        self.vm_mut().internal.take_token_buffer()
    }

    /// See [ExpansionInput::return_token_buffer].
    pub fn return_token_buffer(&mut self, token_buffer: Vec<Token>) {
        self.vm_mut().internal.give_back_token_buffer(token_buffer)
    }
}

/// Detaches a token reference from the borrow of the VM.
///
/// Only for returning a reference out of a loop that conditionally mutates the VM,
///     which the current borrow checker rejects even though it is sound.
#[inline]
unsafe fn launder<'a>(token: &Token) -> &'a Token {
    &*(token as *const Token)
}

mod stream {
    use super::*;
    use crate::error::Error;
    use crate::token::lexer;

    /// Result of attempting to expand a token.
    enum Expanded {
        /// The token is not expandable.
        No,
        /// The token was expanded and its expansion pushed onto the input.
        Yes,
        /// The expansion override hook replaced the expansion with this token.
        Override(Token),
    }

    /// Reads the next unexpanded token, and whether it was marked as not to be expanded.
    ///
    /// Exhausted sources are popped until a token is found or the last source is exhausted.
    #[inline]
    pub fn next_unexpanded_and_frozen<S>(vm: &mut vm::VM<S>) -> txl::Result<Option<(Token, bool)>> {
        loop {
            if let Some(next) = vm.internal.current_source.pop_expansion() {
                return Ok(Some(next));
            }
            let internal = &mut vm.internal;
            match internal
                .current_source
                .root
                .next(&vm.context, &mut internal.cs_name_interner)
            {
                Ok(Some(token)) => return Ok(Some((token, false))),
                Ok(None) => {}
                Err(err) => return Err(lexer_error(vm, err)),
            }
            if !vm.internal.pop_source() {
                return Ok(None);
            }
        }
    }

    #[inline]
    pub fn next_unexpanded<S>(vm: &mut vm::VM<S>) -> txl::Result<Option<Token>> {
        Ok(next_unexpanded_and_frozen(vm)?.map(|(token, _)| token))
    }

    #[inline]
    pub fn peek_unexpanded<S>(vm: &mut vm::VM<S>) -> txl::Result<Option<&Token>> {
        loop {
            if let Some(token) = vm.internal.current_source.expansions.last() {
                return Ok(Some(unsafe { launder(token) }));
            }
            let internal = &mut vm.internal;
            match internal
                .current_source
                .root
                .next(&vm.context, &mut internal.cs_name_interner)
            {
                Ok(Some(token)) => {
                    vm.internal.current_source.expansions.push(token);
                    return Ok(vm.internal.current_source.expansions.last());
                }
                Ok(None) => {}
                Err(err) => return Err(lexer_error(vm, err)),
            }
            if !vm.internal.pop_source() {
                return Ok(None);
            }
        }
    }

    fn lexer_error<S>(vm: &vm::VM<S>, err: lexer::Error) -> Box<Error> {
        match err {
            lexer::Error::InvalidCharacter(c, key) => error::InvalidCharacterError {
                trace: vm.trace(Token::new_other(c, key)),
                char: c,
            }
            .into(),
            lexer::Error::EmptyControlSequence(key) => {
                let trace = vm.trace(Token::new_other('\\', key));
                let escape = trace
                    .line_content
                    .chars()
                    .nth(trace.index)
                    .unwrap_or('\\');
                error::MalformedTokenError {
                    trace,
                    partial: escape.to_string(),
                    constraint: "an escape character followed by at least one character".into(),
                }
                .into()
            }
            lexer::Error::MalformedCaretNotation { partial, key } => {
                let first = partial.chars().next().unwrap_or('^');
                error::MalformedTokenError {
                    trace: vm.trace(Token::new_other(first, key)),
                    partial,
                    constraint: "four superscript characters followed by exactly four hexadecimal digits".into(),
                }
                .into()
            }
        }
    }

    pub fn next_expanded<S: TexlangState>(vm: &mut vm::VM<S>) -> txl::Result<Option<Token>> {
        loop {
            let token = match next_unexpanded_and_frozen(vm)? {
                None => return Ok(None),
                Some((token, true)) => return Ok(Some(token)),
                Some((token, false)) => token,
            };
            match expand(vm, token)? {
                Expanded::No => return Ok(Some(token)),
                Expanded::Yes => continue,
                Expanded::Override(token) => return Ok(Some(token)),
            }
        }
    }

    pub fn peek_expanded<S: TexlangState>(vm: &mut vm::VM<S>) -> txl::Result<Option<&Token>> {
        loop {
            let token = match peek_unexpanded(vm)? {
                None => return Ok(None),
                Some(token) => *token,
            };
            if !matches!(token.value(), token::Value::CommandRef(_))
                || vm.internal.current_source.is_top_frozen()
            {
                return Ok(vm.internal.expansions().last());
            }
            consume_peek(vm);
            match expand(vm, token)? {
                Expanded::No => {
                    vm.internal.expansions_mut().push(token);
                    return Ok(vm.internal.expansions().last());
                }
                Expanded::Yes => continue,
                Expanded::Override(token) => {
                    vm.internal.current_source.push_frozen(token);
                    return Ok(vm.internal.expansions().last());
                }
            }
        }
    }

    pub fn expand_once<S: TexlangState>(vm: &mut vm::VM<S>) -> txl::Result<bool> {
        let token = match peek_unexpanded(vm)? {
            None => return Ok(false),
            Some(token) => *token,
        };
        if !matches!(token.value(), token::Value::CommandRef(_))
            || vm.internal.current_source.is_top_frozen()
        {
            return Ok(false);
        }
        consume_peek(vm);
        match expand(vm, token)? {
            Expanded::No => {
                vm.internal.expansions_mut().push(token);
                Ok(false)
            }
            Expanded::Yes => Ok(true),
            Expanded::Override(token) => {
                vm.internal.current_source.push_frozen(token);
                Ok(true)
            }
        }
    }

    #[inline]
    fn consume_peek<S>(vm: &mut vm::VM<S>) {
        // When we peek at a token, it is placed on top of the expansions stack.
        // So to consume the token, we just need to remove it from the stack.
        vm.internal.current_source.pop_expansion();
    }

    /// Expands the token if it is bound to an expandable command.
    fn expand<S: TexlangState>(vm: &mut vm::VM<S>, token: Token) -> txl::Result<Expanded> {
        let token::Value::CommandRef(command_ref) = token.value() else {
            return Ok(Expanded::No);
        };
        match vm.commands_map.get_command(&command_ref) {
            None => Err(error::UndefinedCommandError::new(vm, token).into()),
            Some(command::Command::Expansion(command, tag)) => {
                let command = *command;
                let tag = *tag;
                match S::expansion_override_hook(token, ExpansionInput::new(vm), tag) {
                    Ok(None) => (),
                    Ok(Some(override_expansion)) => {
                        return Ok(Expanded::Override(override_expansion));
                    }
                    Err(err) => return Err(convert_command_error(vm, token, err)),
                };
                invoke(vm, token, |input| command(token, input))
            }
            Some(command::Command::Macro(command)) => {
                let command = command.clone();
                invoke(vm, token, |input| command.call(token, input))
            }
            Some(command::Command::Conditional(condition)) => {
                let condition = *condition;
                invoke(vm, token, |input| {
                    conditional::evaluate(condition, token, input)
                })
            }
            Some(_) => Ok(Expanded::No),
        }
    }

    /// Runs an expandable command while enforcing the expansion limits.
    fn invoke<S, F>(vm: &mut vm::VM<S>, token: Token, f: F) -> txl::Result<Expanded>
    where
        F: FnOnce(&mut ExpansionInput<S>) -> txl::Result<()>,
    {
        let limits = vm.limits;
        if vm.internal.expansion_depth >= limits.max_expansion_depth {
            return Err(error::CapacityExceededError::new(
                vm,
                Some(token),
                "expansion depth",
                limits.max_expansion_depth,
            )
            .into());
        }
        vm.internal.expansion_depth += 1;
        vm.internal.max_expansion_depth_reached = std::cmp::max(
            vm.internal.max_expansion_depth_reached,
            vm.internal.expansion_depth,
        );
        let result = f(ExpansionInput::new(vm));
        vm.internal.expansion_depth -= 1;
        if let Err(err) = result {
            return Err(convert_command_error(vm, token, err));
        }
        if vm.internal.expansions().len() > limits.max_pending_tokens {
            return Err(error::CapacityExceededError::new(
                vm,
                Some(token),
                "pending tokens",
                limits.max_pending_tokens,
            )
            .into());
        }
        Ok(Expanded::Yes)
    }

    fn convert_command_error<S>(vm: &vm::VM<S>, token: Token, err: Box<Error>) -> Box<Error> {
        Error::new_propagated(vm, error::PropagationContext::Expansion, token, err)
    }
}
