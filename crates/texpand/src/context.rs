//! The group-scoped mutable state of a run.
//!
//! The [Context] is a single store of mutable cells: category codes,
//!     count registers, token list registers, the end line character, the current namespace,
//!     the interaction mode and named integer parameters.
//! Every cell is visible everywhere; only the undo behavior is scoped.
//! Local assignments are rolled back when the enclosing group ends,
//!     while global assignments survive all enclosing groups.
//!
//! The context also owns the conditional stack and the namespace export table.
//! Neither of these is affected by groups.

use crate::conditional;
use crate::token::{CatCode, CsName, Namespace, Token};
use std::collections::HashMap;
use std::rc::Rc;
use texpand_stdext::collections::groupingmap::{GroupingHashMap, Scope};

/// Identifies a cell in the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    CatCode(char),
    Count(u16),
    TokenList(u16),
    EndLineChar,
    Namespace,
    Interaction,
    /// A named integer parameter like `\tracingmacros`.
    Integer(&'static str),
}

/// The value of a cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i32),
    CatCode(CatCode),
    Tokens(Rc<[Token]>),
    Namespace(Namespace),
    Interaction(InteractionMode),
}

/// How the host reacts to errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionMode {
    /// Errors are logged and the run continues. Nothing is printed to the terminal.
    Batch,
    /// Errors are printed and the run continues.
    NonStop,
    /// Errors are printed and the run stops.
    Scroll,
    /// Errors are printed and the run stops.
    #[default]
    ErrorStop,
}

impl std::fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InteractionMode::Batch => "batch",
            InteractionMode::NonStop => "nonstop",
            InteractionMode::Scroll => "scroll",
            InteractionMode::ErrorStop => "errorstop",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for InteractionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "batch" => Ok(InteractionMode::Batch),
            "nonstop" => Ok(InteractionMode::NonStop),
            "scroll" => Ok(InteractionMode::Scroll),
            "errorstop" => Ok(InteractionMode::ErrorStop),
            _ => Err(format!(
                "unknown interaction mode `{s}`; expected batch, nonstop, scroll or errorstop"
            )),
        }
    }
}

/// The kind of a group.
///
/// Undo semantics are the same for every kind;
///     the kind only determines which command may end the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// Begun by `{` and ended by `}`.
    Simple,
    /// Begun by `\begingroup` and ended by `\endgroup`.
    SemiSimple,
    /// Begun and ended by `$`.
    Math,
}

impl std::fmt::Display for GroupKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            GroupKind::Simple => "simple",
            GroupKind::SemiSimple => "semi-simple",
            GroupKind::Math => "math shift",
        };
        write!(f, "{s}")
    }
}

/// Error returned when a group cannot be closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupError {
    NoGroup,
    Mismatch { open: GroupKind, close: GroupKind },
}

#[derive(Default)]
pub struct Context {
    cells: GroupingHashMap<Key, Value>,
    groups: Vec<GroupKind>,
    conditionals: Vec<conditional::Entry>,
    exports: HashMap<Namespace, Vec<CsName>>,
}

impl Context {
    /// Returns the current value of the cell.
    ///
    /// Cells that were never assigned have a default value:
    ///     the plain TeX category code for catcodes, `\r` for the end line character,
    ///     the root namespace, error stop mode, an empty token list and zero for integers.
    pub fn get(&self, key: &Key) -> Value {
        match self.cells.get(key) {
            Some(value) => value.clone(),
            None => Context::default_value(key),
        }
    }

    fn default_value(key: &Key) -> Value {
        match key {
            Key::CatCode(c) => Value::CatCode(CatCode::default_for(*c)),
            Key::Count(_) | Key::Integer(_) => Value::Int(0),
            Key::TokenList(_) => Value::Tokens(Rc::from(Vec::new())),
            Key::EndLineChar => Value::Int('\r' as i32),
            Key::Namespace => Value::Namespace(Namespace::ROOT),
            Key::Interaction => Value::Interaction(InteractionMode::default()),
        }
    }

    /// Assigns a value to the cell.
    ///
    /// A local assignment is undone when the current group ends.
    /// Only the first local assignment of a key in a group records an undo entry.
    /// A global assignment also erases the pending undo entries for the key in every open group.
    pub fn set(&mut self, key: Key, value: Value, scope: Scope) {
        self.cells.insert(key, value, scope);
    }

    pub fn cat_code(&self, c: char) -> CatCode {
        match self.cells.get(&Key::CatCode(c)) {
            Some(Value::CatCode(cat_code)) => *cat_code,
            _ => CatCode::default_for(c),
        }
    }

    pub fn set_cat_code(&mut self, c: char, cat_code: CatCode, scope: Scope) {
        self.set(Key::CatCode(c), Value::CatCode(cat_code), scope);
    }

    /// Returns the value of an integer cell, or 0 if the cell holds a different type.
    pub fn int(&self, key: Key) -> i32 {
        match self.cells.get(&key) {
            Some(Value::Int(i)) => *i,
            Some(Value::CatCode(cat_code)) => *cat_code as i32,
            Some(_) => 0,
            None => match Context::default_value(&key) {
                Value::Int(i) => i,
                Value::CatCode(cat_code) => cat_code as i32,
                _ => 0,
            },
        }
    }

    pub fn count(&self, index: u16) -> i32 {
        self.int(Key::Count(index))
    }

    pub fn set_count(&mut self, index: u16, value: i32, scope: Scope) {
        self.set(Key::Count(index), Value::Int(value), scope);
    }

    pub fn token_list(&self, index: u16) -> Rc<[Token]> {
        match self.get(&Key::TokenList(index)) {
            Value::Tokens(tokens) => tokens,
            _ => Rc::from(Vec::new()),
        }
    }

    /// Returns the current end line character, or [None] if it is negative or not a valid character.
    pub fn end_line_char(&self) -> Option<char> {
        u32::try_from(self.int(Key::EndLineChar))
            .ok()
            .and_then(char::from_u32)
    }

    pub fn namespace(&self) -> Namespace {
        match self.cells.get(&Key::Namespace) {
            Some(Value::Namespace(namespace)) => *namespace,
            _ => Namespace::ROOT,
        }
    }

    pub fn set_namespace(&mut self, namespace: Namespace, scope: Scope) {
        self.set(Key::Namespace, Value::Namespace(namespace), scope);
    }

    pub fn interaction_mode(&self) -> InteractionMode {
        match self.cells.get(&Key::Interaction) {
            Some(Value::Interaction(mode)) => *mode,
            _ => InteractionMode::default(),
        }
    }

    pub fn set_interaction_mode(&mut self, mode: InteractionMode, scope: Scope) {
        self.set(Key::Interaction, Value::Interaction(mode), scope);
    }

    /// Opens a group of the provided kind.
    pub fn open_group(&mut self, kind: GroupKind) {
        log::trace!("opening {kind} group at depth {}", self.groups.len() + 1);
        self.groups.push(kind);
        self.cells.begin_group();
    }

    /// Closes the innermost group, undoing its local assignments in reverse order.
    ///
    /// The innermost group must have the provided kind.
    pub fn close_group(&mut self, kind: GroupKind) -> Result<(), GroupError> {
        match self.groups.last() {
            None => return Err(GroupError::NoGroup),
            Some(open) if *open != kind => {
                return Err(GroupError::Mismatch {
                    open: *open,
                    close: kind,
                })
            }
            Some(_) => {}
        }
        self.groups.pop();
        log::trace!("closing {kind} group at depth {}", self.groups.len() + 1);
        self.cells.end_group().map_err(|_| GroupError::NoGroup)
    }

    /// Returns the number of open groups.
    pub fn group_depth(&self) -> usize {
        self.groups.len()
    }

    /// Returns the number of undo entries recorded by the innermost group.
    pub fn pending_undos(&self) -> usize {
        self.cells.pending_undos()
    }

    pub fn push_conditional(&mut self, entry: conditional::Entry) {
        self.conditionals.push(entry);
    }

    /// Pops the innermost conditional, or returns [None] if there is no open conditional.
    pub fn pop_conditional(&mut self) -> Option<conditional::Entry> {
        self.conditionals.pop()
    }

    pub fn top_conditional(&self) -> Option<&conditional::Entry> {
        self.conditionals.last()
    }

    pub fn top_conditional_mut(&mut self) -> Option<&mut conditional::Entry> {
        self.conditionals.last_mut()
    }

    pub fn conditionals(&self) -> &[conditional::Entry] {
        &self.conditionals
    }

    /// Marks control sequence names of the namespace as exported.
    pub fn export(&mut self, namespace: Namespace, names: impl IntoIterator<Item = CsName>) {
        let exported = self.exports.entry(namespace).or_default();
        for name in names {
            if !exported.contains(&name) {
                exported.push(name);
            }
        }
    }

    /// Returns the exported names of the namespace, in the order they were exported.
    pub fn exports(&self, namespace: Namespace) -> &[CsName] {
        self.exports
            .get(&namespace)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl crate::token::lexer::Config for Context {
    #[inline]
    fn cat_code(&self, c: char) -> CatCode {
        Context::cat_code(self, c)
    }

    #[inline]
    fn end_line_char(&self) -> Option<char> {
        Context::end_line_char(self)
    }

    #[inline]
    fn namespace(&self) -> Namespace {
        Context::namespace(self)
    }
}
