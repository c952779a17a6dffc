//! Commands and the binding registry.
//!
//! A command is the binding of a control sequence or active character.
//! Every command has a [Capability] that determines how the engine treats it:
//!
//! |            | examples                           | handled by
//! |------------|------------------------------------|-----------
//! | expandable | macros, `\iftrue`, `\else`, `\the` | the expansion loop, which replaces the token by its expansion
//! | executable | `\def`, `\relax`, `\let\a=b`      | the main VM loop
//! | assignable | `\count`, `\catcode`              | the main VM loop, as an assignment through the [Context](crate::context::Context)
//!
//! Expandable commands can read tokens from the input and push tokens back onto it,
//!     but cannot change the state.
//! They are run even when tokens are only being expanded, for example inside `\edef`.

use crate::conditional;
use crate::prelude as txl;
use crate::texmacro;
use crate::token;
use crate::variable;
use crate::vm;
use std::num;
use std::rc;
use std::sync::atomic;

pub(crate) mod map;

pub use map::Map;

/// The Rust type of expansion primitive functions.
pub type ExpansionFn<S> =
    fn(token: token::Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()>;

/// The Rust type of execution primitive functions.
pub type ExecutionFn<S> =
    fn(token: token::Token, input: &mut vm::ExecutionInput<S>) -> txl::Result<()>;

/// A command.
pub enum Command<S> {
    /// An expansion primitive.
    ///
    /// Examples: `\the`, `\else`, `\noexpand`.
    Expansion(ExpansionFn<S>, Option<Tag>),

    /// A user defined macro.
    Macro(rc::Rc<texmacro::Macro>),

    /// A conditional like `\iftrue` or `\ifcase`.
    ///
    /// The command only provides the evaluation of the condition.
    /// Pushing onto the conditional stack and skipping branches is done by the engine.
    Conditional(conditional::Condition<S>),

    /// A non-expansion primitive that may change the state.
    ///
    /// Examples: `\def`, `\relax`.
    Execution(ExecutionFn<S>, Option<Tag>),

    /// A command that references a variable, like a register or a parameter.
    ///
    /// Examples: `\count`, `\catcode`.
    Variable(rc::Rc<variable::Command<S>>),

    /// A command that aliases a character token.
    ///
    /// Created using `\let\cmd=<character>`.
    CharacterTokenAlias(token::Value),
}

/// How the engine treats a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Expandable,
    Executable,
    Assignable,
}

impl<S> std::fmt::Display for Command<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Expansion(_, _) => write![f, "an expansion command"],
            Command::Macro(_) => write![f, "a user-defined macro"],
            Command::Conditional(_) => write![f, "a conditional"],
            Command::Execution(_, _) => write![f, "an execution command"],
            Command::Variable(_) => write![f, "a variable command"],
            Command::CharacterTokenAlias(_) => write![f, "a character token alias"],
        }
    }
}

impl<S> Command<S> {
    /// Gets the tag associated to this command, or [None] if the command has no tag.
    pub fn tag(&self) -> Option<Tag> {
        match self {
            Command::Expansion(_, tag) | Command::Execution(_, tag) => *tag,
            Command::Macro(_)
            | Command::Conditional(_)
            | Command::Variable(_)
            | Command::CharacterTokenAlias(_) => None,
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Command::Expansion(..) | Command::Macro(_) | Command::Conditional(_) => {
                Capability::Expandable
            }
            Command::Execution(..) | Command::CharacterTokenAlias(_) => Capability::Executable,
            Command::Variable(_) => Capability::Assignable,
        }
    }

    /// Returns whether the two commands are the same primitive, macro or alias.
    ///
    /// This is the equality used by `\ifx`.
    pub fn is_same(&self, other: &Command<S>) -> bool {
        match (self, other) {
            (Command::Expansion(a, t_a), Command::Expansion(b, t_b)) => {
                *a as usize == *b as usize && t_a == t_b
            }
            (Command::Execution(a, t_a), Command::Execution(b, t_b)) => {
                *a as usize == *b as usize && t_a == t_b
            }
            (Command::Macro(a), Command::Macro(b)) => rc::Rc::ptr_eq(a, b) || a == b,
            (Command::Conditional(a), Command::Conditional(b)) => a.is_same(b),
            (Command::Variable(a), Command::Variable(b)) => rc::Rc::ptr_eq(a, b),
            (Command::CharacterTokenAlias(a), Command::CharacterTokenAlias(b)) => a == b,
            _ => false,
        }
    }
}

/// A built-in command. This is a command provided at VM initialization.
///
/// This struct is simply a combination of a [Command] and a documentation string for the command.
pub struct BuiltIn<S> {
    cmd: Command<S>,
    doc: Option<&'static str>,
}

impl<S> BuiltIn<S> {
    /// Create a new expansion built-in command.
    pub fn new_expansion(t: ExpansionFn<S>) -> BuiltIn<S> {
        t.into()
    }

    /// Create a new execution built-in command.
    pub fn new_execution(t: ExecutionFn<S>) -> BuiltIn<S> {
        t.into()
    }

    /// Create a new variable built-in command.
    pub fn new_variable(cmd: variable::Command<S>) -> BuiltIn<S> {
        Command::Variable(rc::Rc::new(cmd)).into()
    }

    /// Create a new boolean conditional.
    pub fn new_boolean_conditional(f: conditional::BooleanFn<S>) -> BuiltIn<S> {
        Command::Conditional(conditional::Condition::Boolean(f)).into()
    }

    /// Create a new case conditional, like `\ifcase`.
    pub fn new_case_conditional(f: conditional::CaseFn<S>) -> BuiltIn<S> {
        Command::Conditional(conditional::Condition::Case(f)).into()
    }

    /// Set the tag for this built-in command.
    ///
    /// Only expansion and execution primitives can have tags;
    ///     for other commands this is a no-op.
    pub fn with_tag(mut self, tag: Tag) -> BuiltIn<S> {
        match self.cmd {
            Command::Expansion(_, ref mut t) | Command::Execution(_, ref mut t) => {
                *t = Some(tag)
            }
            Command::Macro(_)
            | Command::Conditional(_)
            | Command::Variable(_)
            | Command::CharacterTokenAlias(_) => {
                log::warn!("ignoring a tag on {} which cannot have tags", self.cmd);
            }
        }
        self
    }

    /// Set the doc for this built-in command.
    pub fn with_doc(mut self, doc: &'static str) -> BuiltIn<S> {
        self.doc = Some(doc);
        self
    }

    pub fn cmd(&self) -> &Command<S> {
        &self.cmd
    }

    pub fn doc(&self) -> Option<&'static str> {
        self.doc
    }
}

// We need to implement Clone manually as the derived implementation requires S to be Clone.
impl<S> Clone for Command<S> {
    fn clone(&self) -> Self {
        match self {
            Command::Expansion(e, t) => Command::Expansion(*e, *t),
            Command::Macro(m) => Command::Macro(m.clone()),
            Command::Conditional(c) => Command::Conditional(*c),
            Command::Execution(e, t) => Command::Execution(*e, *t),
            Command::Variable(v) => Command::Variable(v.clone()),
            Command::CharacterTokenAlias(tv) => Command::CharacterTokenAlias(*tv),
        }
    }
}

impl<S> Clone for BuiltIn<S> {
    fn clone(&self) -> Self {
        Self {
            cmd: self.cmd.clone(),
            doc: self.doc,
        }
    }
}

impl<S> From<ExpansionFn<S>> for BuiltIn<S> {
    fn from(cmd: ExpansionFn<S>) -> Self {
        Command::Expansion(cmd, None).into()
    }
}

impl<S> From<rc::Rc<texmacro::Macro>> for BuiltIn<S> {
    fn from(cmd: rc::Rc<texmacro::Macro>) -> Self {
        Command::Macro(cmd).into()
    }
}

impl<S> From<ExecutionFn<S>> for BuiltIn<S> {
    fn from(cmd: ExecutionFn<S>) -> Self {
        Command::Execution(cmd, None).into()
    }
}

impl<S> From<variable::Command<S>> for BuiltIn<S> {
    fn from(cmd: variable::Command<S>) -> Self {
        Command::Variable(rc::Rc::new(cmd)).into()
    }
}

impl<S> From<Command<S>> for BuiltIn<S> {
    fn from(cmd: Command<S>) -> Self {
        BuiltIn { cmd, doc: None }
    }
}

/// A tag is a piece of metadata that is optionally attached to a command.
///
/// Tags let the engine recognize commands without running them.
/// The main example is conditional branch skipping:
///     when a branch is skipped the engine scans the input for commands
///     whose tag is the `\else`, `\or` or `\fi` tag.
/// Because tags belong to commands and not to names,
///     `\let\endif=\fi` makes `\endif` end conditionals too.
///
/// Tags are non-zero 32 bit integers handed out from a global counter,
///     so `Option<Tag>` is 4 bytes.
#[derive(PartialEq, Eq, Clone, Copy, Debug, PartialOrd, Ord, Hash)]
pub struct Tag(num::NonZeroU32);

static NEXT_TAG_VALUE: atomic::AtomicU32 = atomic::AtomicU32::new(1);

impl Tag {
    /// Creates a new unique tag.
    ///
    /// ```
    /// # use texpand::command::Tag;
    /// let tag_1 = Tag::new();
    /// let tag_2 = Tag::new();
    /// assert_ne!(tag_1, tag_2);
    /// ```
    #[allow(clippy::new_without_default)]
    pub fn new() -> Tag {
        let n = NEXT_TAG_VALUE.fetch_add(1, atomic::Ordering::Relaxed);
        match num::NonZeroU32::new(n) {
            Some(n) => Tag(n),
            None => panic!("all command tags have been used"),
        }
    }
}

/// A static tag enables creating a tag in a static variable.
///
/// ```
/// # use texpand::command::StaticTag;
/// static TAG: StaticTag = StaticTag::new();
///
/// assert_eq!(TAG.get(), TAG.get());
/// ```
pub struct StaticTag(std::sync::OnceLock<Tag>);

impl Default for StaticTag {
    fn default() -> Self {
        StaticTag::new()
    }
}

impl StaticTag {
    pub const fn new() -> StaticTag {
        StaticTag(std::sync::OnceLock::new())
    }

    /// Get the [Tag], creating it on first use.
    pub fn get(&self) -> Tag {
        *self.0.get_or_init(Tag::new)
    }
}
