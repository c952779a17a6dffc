//! Error types and error display logic.
//!
//! Every concrete error implements [TexError].
//! Errors are created with a [SourceCodeTrace](trace::SourceCodeTrace) of the token
//!     (or end of input) where they happened,
//!     so the locator is always available to the host.
//! As an error propagates out of command invocations the VM wraps it in
//!     [PropagatedError]s, building up a stack trace of the commands that were running.

use crate::token;
use crate::token::trace;
use crate::vm;
use texpand_stdext::algorithms::spellcheck;

pub mod display;

#[derive(Debug)]
pub enum Error {
    Tex(Box<dyn TexError + 'static>),
    Propagated(PropagatedError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display::format_error(f, self)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new_propagated<S>(
        vm: &vm::VM<S>,
        context: PropagationContext,
        token: token::Token,
        error: Box<Error>,
    ) -> Box<Error> {
        Box::new(Error::Propagated(PropagatedError {
            context,
            token,
            trace: vm.trace(token),
            error,
        }))
    }

    /// Returns the commands that were running when the error happened, outermost first,
    ///     and the underlying error.
    pub fn stack_view(&self) -> (Vec<&PropagatedError>, &dyn TexError) {
        let mut stack: Vec<&PropagatedError> = vec![];
        let mut last = self;
        loop {
            match last {
                Error::Tex(error) => {
                    return (stack, error.as_ref());
                }
                Error::Propagated(propagated) => {
                    stack.push(propagated);
                    last = &propagated.error;
                }
            }
        }
    }

    /// Returns the underlying error.
    pub fn root(&self) -> &dyn TexError {
        self.stack_view().1
    }

    /// Returns the category of the underlying error.
    pub fn category(&self) -> Category {
        self.root().category()
    }

    /// Returns the title of the underlying error.
    pub fn title(&self) -> String {
        self.root().title()
    }

    /// Returns the source code location of the error.
    ///
    /// This is the location of the underlying error if it has one,
    ///     and otherwise the location of the innermost command that was running.
    pub fn locator(&self) -> Option<&trace::SourceCodeTrace> {
        let (stack, root) = self.stack_view();
        match root.kind() {
            Kind::Token(trace) | Kind::EndOfInput(trace) => Some(trace),
            Kind::FailedPrecondition => stack.last().map(|propagated| &propagated.trace),
        }
    }
}

impl<T: TexError + 'static> From<T> for Box<Error> {
    fn from(err: T) -> Self {
        Box::new(Error::Tex(Box::new(err)))
    }
}

/// An error that propagated out of a command invocation.
#[derive(Debug)]
pub struct PropagatedError {
    pub context: PropagationContext,
    pub token: token::Token,
    pub trace: trace::SourceCodeTrace,
    pub error: Box<Error>,
}

/// What was happening to the command when the error propagated out of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationContext {
    Expansion,
    Execution,
    VariableIndex,
    VariableAssignment,
}

impl PropagationContext {
    pub fn action(&self) -> &'static str {
        match self {
            PropagationContext::Expansion => "expanding this command",
            PropagationContext::Execution => "executing this command",
            PropagationContext::VariableIndex => "determining the index of this variable",
            PropagationContext::VariableAssignment => {
                "determining the value to assign to this variable"
            }
        }
    }
}

/// Where an error happened.
#[derive(Debug)]
pub enum Kind<'a> {
    Token(&'a trace::SourceCodeTrace),
    EndOfInput(&'a trace::SourceCodeTrace),
    /// The error is not associated to a specific token.
    /// It is located at the command that was running.
    FailedPrecondition,
}

/// The taxonomy of errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    /// An input could not be read.
    Resource,
    UndefinedControlSequence,
    /// Extra `\else`, `\or` or `\fi`, misuse of `\unless`,
    ///     or the input ended inside a conditional.
    ConditionalStack,
    /// The lexer could not form a token.
    MalformedToken,
    /// A configured limit like the maximum expansion depth was exceeded.
    Capacity,
    /// Extra group end or mismatched group kinds.
    Group,
    /// The tokens do not have the form a command expected.
    Syntax,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Resource => "resource",
            Category::UndefinedControlSequence => "undefined control sequence",
            Category::ConditionalStack => "conditional stack",
            Category::MalformedToken => "malformed token",
            Category::Capacity => "capacity exceeded",
            Category::Group => "group",
            Category::Syntax => "syntax",
        };
        write!(f, "{s}")
    }
}

/// Implementations of this trait are errors that can be returned from the engine.
pub trait TexError: std::fmt::Debug {
    fn kind(&self) -> Kind;

    fn category(&self) -> Category;

    fn title(&self) -> String;

    fn notes(&self) -> Vec<display::Note> {
        vec![]
    }

    fn source_annotation(&self) -> String {
        TexError::default_source_annotation(self)
    }

    fn default_source_annotation(&self) -> String {
        match TexError::kind(self) {
            Kind::Token(s) => match s.token.map(|t| (t.char(), t.cat_code())) {
                Some((Some(c), Some(code))) => {
                    format!["character token with value {c} and category code {code}",]
                }
                _ => "control sequence".to_string(),
            },
            Kind::EndOfInput(_) => "input ended here".into(),
            Kind::FailedPrecondition => "error while running this command".into(),
        }
    }
}

#[derive(Debug)]
pub struct SimpleTokenError {
    pub token: token::Token,
    pub trace: trace::SourceCodeTrace,
    pub title: String,
    pub category: Category,
    pub text_notes: Vec<String>,
}

impl SimpleTokenError {
    /// Create a new simple token error with category [Category::Syntax].
    pub fn new<S, T: AsRef<str>>(vm: &vm::VM<S>, token: token::Token, title: T) -> Self {
        SimpleTokenError {
            token,
            trace: vm.trace(token),
            title: title.as_ref().into(),
            category: Category::Syntax,
            text_notes: vec![],
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl TexError for SimpleTokenError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        self.category
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<display::Note> {
        self.text_notes.iter().map(|n| n.into()).collect()
    }
}

#[derive(Debug)]
pub struct SimpleEndOfInputError {
    pub trace: trace::SourceCodeTrace,
    pub title: String,
    pub text_notes: Vec<String>,
}

impl SimpleEndOfInputError {
    /// Create a new simple end of input error.
    pub fn new<S, T: AsRef<str>>(vm: &vm::VM<S>, title: T) -> Self {
        Self {
            trace: vm.trace_end_of_input(),
            title: title.as_ref().into(),
            text_notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl TexError for SimpleEndOfInputError {
    fn kind(&self) -> Kind {
        Kind::EndOfInput(&self.trace)
    }

    fn category(&self) -> Category {
        Category::Syntax
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<display::Note> {
        self.text_notes.iter().map(|n| n.into()).collect()
    }
}

#[derive(Debug)]
pub struct SimpleFailedPreconditionError {
    pub title: String,
    pub category: Category,
    pub text_notes: Vec<String>,
}

impl SimpleFailedPreconditionError {
    pub fn new<T: AsRef<str>>(category: Category, title: T) -> Self {
        Self {
            title: title.as_ref().into(),
            category,
            text_notes: vec![],
        }
    }

    pub fn with_note<T: Into<String>>(mut self, note: T) -> Self {
        self.text_notes.push(note.into());
        self
    }
}

impl TexError for SimpleFailedPreconditionError {
    fn kind(&self) -> Kind {
        Kind::FailedPrecondition
    }

    fn category(&self) -> Category {
        self.category
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn notes(&self) -> Vec<display::Note> {
        self.text_notes.iter().map(|n| n.into()).collect()
    }
}

/// A control sequence or active character with no binding was expanded.
#[derive(Debug)]
pub struct UndefinedCommandError {
    pub trace: trace::SourceCodeTrace,
    /// Name of the command, like `\foo` or `~`.
    pub name: String,
    pub close_names: Vec<String>,
}

impl UndefinedCommandError {
    pub fn new<S>(vm: &vm::VM<S>, token: token::Token) -> UndefinedCommandError {
        let trace = vm.trace(token);
        let close_names = match token.value() {
            token::Value::CommandRef(token::CommandRef::ControlSequence(name, _)) => {
                let interner = vm.cs_name_interner();
                let defined: Vec<&str> = vm
                    .commands_map
                    .defined_cs_names()
                    .filter_map(|cs_name| interner.resolve(cs_name))
                    .collect();
                let name = interner.resolve(name).unwrap_or("");
                spellcheck::find_close_words(defined, name, 2)
                    .into_iter()
                    .map(String::from)
                    .collect()
            }
            _ => vec![],
        };
        UndefinedCommandError {
            name: trace.value.clone(),
            trace,
            close_names,
        }
    }
}

impl TexError for UndefinedCommandError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        Category::UndefinedControlSequence
    }

    fn title(&self) -> String {
        format!["undefined control sequence {}", &self.name]
    }

    fn notes(&self) -> Vec<display::Note> {
        use colored::Colorize;
        match self.close_names.first() {
            None => vec![],
            Some(close_name) => vec![format!["did you mean \\{}?", close_name.bold()].into()],
        }
    }
}

/// An input could not be read.
#[derive(Debug)]
pub struct ResourceError {
    pub trace: trace::SourceCodeTrace,
    pub path: String,
    pub message: String,
}

impl ResourceError {
    pub fn new<S>(
        vm: &vm::VM<S>,
        token: Option<token::Token>,
        path: &str,
        err: &std::io::Error,
    ) -> Self {
        ResourceError {
            trace: match token {
                None => vm.trace_end_of_input(),
                Some(token) => vm.trace(token),
            },
            path: path.into(),
            message: err.to_string(),
        }
    }
}

impl TexError for ResourceError {
    fn kind(&self) -> Kind {
        match self.trace.token {
            None => Kind::EndOfInput(&self.trace),
            Some(_) => Kind::Token(&self.trace),
        }
    }

    fn category(&self) -> Category {
        Category::Resource
    }

    fn title(&self) -> String {
        format!["could not read `{}`", self.path]
    }

    fn notes(&self) -> Vec<display::Note> {
        vec![format!["underlying error: {}", self.message].into()]
    }
}

/// The lexer could not form a token.
///
/// The error carries the text read so far and the constraint that it violates.
#[derive(Debug)]
pub struct MalformedTokenError {
    pub trace: trace::SourceCodeTrace,
    pub partial: String,
    pub constraint: String,
}

impl TexError for MalformedTokenError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        Category::MalformedToken
    }

    fn title(&self) -> String {
        format!["malformed token `{}`", self.partial]
    }

    fn source_annotation(&self) -> String {
        format!["expected {}", self.constraint]
    }

    fn notes(&self) -> Vec<display::Note> {
        vec![format!["a token here must consist of {}", self.constraint].into()]
    }
}

/// A character with category code invalid was read.
#[derive(Debug)]
pub struct InvalidCharacterError {
    pub trace: trace::SourceCodeTrace,
    pub char: char,
}

impl TexError for InvalidCharacterError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        Category::MalformedToken
    }

    fn title(&self) -> String {
        format!["input contains a character with category code invalid (15): {:?}", self.char]
    }

    fn source_annotation(&self) -> String {
        "invalid character".into()
    }
}

/// A configured limit was exceeded.
#[derive(Debug)]
pub struct CapacityExceededError {
    pub trace: trace::SourceCodeTrace,
    pub what: &'static str,
    pub limit: usize,
}

impl CapacityExceededError {
    /// Creates a new error located at the token, or at the end of the input if there is no token.
    pub fn new<S>(
        vm: &vm::VM<S>,
        token: Option<token::Token>,
        what: &'static str,
        limit: usize,
    ) -> Self {
        CapacityExceededError {
            trace: match token {
                None => vm.trace_end_of_input(),
                Some(token) => vm.trace(token),
            },
            what,
            limit,
        }
    }
}

impl TexError for CapacityExceededError {
    fn kind(&self) -> Kind {
        match self.trace.token {
            None => Kind::EndOfInput(&self.trace),
            Some(_) => Kind::Token(&self.trace),
        }
    }

    fn category(&self) -> Category {
        Category::Capacity
    }

    fn title(&self) -> String {
        format!["capacity exceeded: {} (limit {})", self.what, self.limit]
    }

    fn notes(&self) -> Vec<display::Note> {
        vec!["this is usually caused by a macro that expands to itself without end".into()]
    }
}

/// A group was closed when none was open.
#[derive(Debug)]
pub struct EndOfGroupError {
    pub trace: trace::SourceCodeTrace,
}

impl TexError for EndOfGroupError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        Category::Group
    }

    fn title(&self) -> String {
        "there is no group to end".into()
    }
}

/// A group was closed by a command of the wrong kind, e.g. `{ \endgroup`.
#[derive(Debug)]
pub struct GroupMismatchError {
    pub trace: trace::SourceCodeTrace,
    pub open: String,
    pub close: String,
}

impl TexError for GroupMismatchError {
    fn kind(&self) -> Kind {
        Kind::Token(&self.trace)
    }

    fn category(&self) -> Category {
        Category::Group
    }

    fn title(&self) -> String {
        format!["a {} group cannot be closed by this {} group end", self.open, self.close]
    }
}
