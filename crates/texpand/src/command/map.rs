//! The binding table.
use super::*;
use crate::token::{CommandRef, CsName, Namespace};
use std::collections::HashMap;
use std::fmt;
use texpand_stdext::collections::groupingmap;
use texpand_stdext::collections::groupingmap::GroupingHashMap;
use texpand_stdext::collections::groupingmap::GroupingVec;
use texpand_stdext::collections::interner::Key;

/// Map is a map type where the keys are command references and the values are commands.
///
/// Bindings in the root namespace are the common case and are stored separately
///     so that retrieving them is fast:
///     control sequence commands live in a vector indexed by the interned name.
/// Bindings in other namespaces live in a hash map keyed by the full command reference.
///
/// Resolving a reference in a non-root namespace first looks in that namespace
///     and then falls back to the root namespace.
/// This is how built-in commands, which are all defined in the root namespace,
///     remain available everywhere.
/// Removing a binding in a non-root namespace stores an explicit undefined entry,
///     so the namespace no longer sees the root binding of that name.
///
/// All three backing containers are grouping containers,
///     and groups are begun and ended on all of them together.
pub struct Map<S> {
    commands: GroupingVec<Command<S>>,
    active_chars: GroupingHashMap<char, Command<S>>,
    // None marks a name that was made undefined in its namespace.
    namespaced: GroupingHashMap<CommandRef, Option<Command<S>>>,

    built_in_commands: HashMap<CsName, BuiltIn<S>>,
}

impl<S> Map<S> {
    pub(crate) fn new(built_in_commands: HashMap<CsName, BuiltIn<S>>) -> Map<S> {
        Self {
            commands: built_in_commands
                .iter()
                .map(|(k, v)| (k.to_usize(), v.cmd.clone()))
                .collect(),
            active_chars: Default::default(),
            namespaced: Default::default(),
            built_in_commands,
        }
    }

    /// Resolves a command reference to its binding, or [None] if it is undefined.
    #[inline]
    pub fn get_command(&self, command_ref: &CommandRef) -> Option<&Command<S>> {
        if command_ref.namespace().is_root() {
            return self.get_root_command(command_ref);
        }
        match self.namespaced.get(command_ref) {
            Some(binding) => binding.as_ref(),
            None => self.get_root_command(command_ref),
        }
    }

    /// Resolves a command reference without falling back to the root namespace.
    pub fn get_command_in_namespace(&self, command_ref: &CommandRef) -> Option<&Command<S>> {
        if command_ref.namespace().is_root() {
            self.get_root_command(command_ref)
        } else {
            self.namespaced.get(command_ref).and_then(Option::as_ref)
        }
    }

    #[inline]
    fn get_root_command(&self, command_ref: &CommandRef) -> Option<&Command<S>> {
        match command_ref {
            CommandRef::ControlSequence(name, _) => self.commands.get(&name.to_usize()),
            CommandRef::ActiveCharacter(c, _) => self.active_chars.get(c),
        }
    }

    /// Looks up a control sequence by name in a namespace.
    pub fn lookup(&self, name: CsName, namespace: Namespace) -> Option<&Command<S>> {
        self.get_command(&CommandRef::ControlSequence(name, namespace))
    }

    pub fn built_in_commands(&self) -> &HashMap<CsName, BuiltIn<S>> {
        &self.built_in_commands
    }

    /// Returns the names of all control sequences that are currently defined in any namespace.
    pub fn defined_cs_names(&self) -> impl Iterator<Item = CsName> + '_ {
        let root = self
            .commands
            .iter()
            .filter_map(|(index, _)| CsName::try_from_usize(index));
        let namespaced = self
            .namespaced
            .iter()
            .filter_map(|(command_ref, binding)| match (command_ref, binding) {
                (CommandRef::ControlSequence(name, _), Some(_)) => Some(name),
                _ => None,
            });
        root.chain(namespaced)
    }

    pub fn insert_macro(
        &mut self,
        name: CommandRef,
        texmacro: texmacro::Macro,
        scope: groupingmap::Scope,
    ) {
        self.insert(name, Command::Macro(rc::Rc::new(texmacro)), scope);
    }

    /// Binds `alias` to the command currently bound to `command`.
    pub fn alias_control_sequence(
        &mut self,
        alias: CommandRef,
        command: &CommandRef,
        scope: groupingmap::Scope,
    ) -> std::result::Result<(), InvalidAlias> {
        let command = match self.get_command(command) {
            None => return Err(InvalidAlias {}),
            Some(t) => t.clone(),
        };
        self.insert(alias, command, scope);
        Ok(())
    }

    pub fn alias_token(&mut self, alias: CommandRef, token: token::Token, scope: groupingmap::Scope) {
        self.insert(alias, Command::CharacterTokenAlias(token.value()), scope);
    }

    /// Registers a binding for the command reference.
    pub fn insert(&mut self, command_ref: CommandRef, command: Command<S>, scope: groupingmap::Scope) {
        if !command_ref.namespace().is_root() {
            self.namespaced.insert(command_ref, Some(command), scope);
            return;
        }
        match command_ref {
            CommandRef::ControlSequence(name, _) => {
                self.commands.insert(name.to_usize(), command, scope);
            }
            CommandRef::ActiveCharacter(c, _) => {
                self.active_chars.insert(c, command, scope);
            }
        }
    }

    /// Removes the binding for the command reference, making it undefined.
    ///
    /// In a non-root namespace the name becomes undefined even if the root namespace binds it.
    pub fn remove(&mut self, command_ref: &CommandRef, scope: groupingmap::Scope) {
        if !command_ref.namespace().is_root() {
            self.namespaced.insert(*command_ref, None, scope);
            return;
        }
        match command_ref {
            CommandRef::ControlSequence(name, _) => {
                self.commands.remove(&name.to_usize(), scope);
            }
            CommandRef::ActiveCharacter(c, _) => {
                self.active_chars.remove(c, scope);
            }
        }
    }

    pub(crate) fn begin_group(&mut self) {
        self.commands.begin_group();
        self.active_chars.begin_group();
        self.namespaced.begin_group();
    }

    pub(crate) fn end_group(&mut self) -> std::result::Result<(), groupingmap::NoGroupToEndError> {
        self.commands.end_group()?;
        self.active_chars.end_group()?;
        self.namespaced.end_group()?;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn len(&self) -> usize {
        let namespaced = self
            .namespaced
            .iter()
            .filter(|(_, binding)| binding.is_some())
            .count();
        self.commands.len() + self.active_chars.len() + namespaced
    }
}

#[derive(Debug)]
pub struct InvalidAlias;

impl fmt::Display for InvalidAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid alias: the control sequence to alias is undefined"
        )
    }
}

impl std::error::Error for InvalidAlias {}
