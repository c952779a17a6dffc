//! The conditional stack machine.
//!
//! Every open conditional has an [Entry] on the conditional stack in the
//!     [Context](crate::context::Context).
//! The entry records the token that opened the conditional, whether the conditional is
//!     boolean or a case statement, which [Branch] is running and whether the
//!     conditional was negated with `\unless`.
//!
//! A conditional command only evaluates its condition.
//! The engine then applies the outcome:
//!
//! - If the outcome is true the entry is pushed with branch [Branch::InThen]
//!     and the true branch is expanded normally.
//!
//! - Otherwise the input is skipped up to the matching `\else` or `\fi`.
//!     Skipping reads unexpanded tokens and keeps a nesting counter:
//!     every conditional command adds one and every `\fi` subtracts one.
//!     `\unless` contributes nothing, so `\unless\ifx` is counted exactly once.
//!     Reaching `\else` at nesting level zero pushes an entry with branch [Branch::InElse];
//!     reaching `\fi` ends the conditional without pushing anything.
//!
//! When `\else` or `\or` is expanded while the true branch (or the running case) is active,
//!     the rest of the conditional is skipped up to the matching `\fi` and the entry is popped.
//! The commands `\else`, `\or` and `\fi` are recognized while skipping by their
//!     [tags](crate::command::Tag), so aliases created with `\let` work too.

use crate::command;
use crate::error;
use crate::parse::Parsable;
use crate::prelude as txl;
use crate::token;
use crate::token::trace;
use crate::token::Token;
use crate::traits::*;
use crate::vm;

/// Evaluation function of a boolean conditional like `\ifnum`.
pub type BooleanFn<S> = fn(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<bool>;

/// Evaluation function of a case conditional like `\ifcase`.
///
/// The result is the 0-based index of the case to run.
pub type CaseFn<S> = fn(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<i32>;

/// The condition of a conditional command.
pub enum Condition<S> {
    Boolean(BooleanFn<S>),
    Case(CaseFn<S>),
}

impl<S> Clone for Condition<S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S> Copy for Condition<S> {}

impl<S> Condition<S> {
    pub fn kind(&self) -> Kind {
        match self {
            Condition::Boolean(_) => Kind::Boolean,
            Condition::Case(_) => Kind::Case,
        }
    }

    /// Returns whether the two conditions have the same evaluation function.
    pub fn is_same(&self, other: &Condition<S>) -> bool {
        match (self, other) {
            (Condition::Boolean(a), Condition::Boolean(b)) => *a as usize == *b as usize,
            (Condition::Case(a), Condition::Case(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Boolean,
    Case,
}

/// The state of an open conditional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// The true branch, or the selected case, is running.
    /// An `\else` or `\or` ends it.
    InThen,
    /// The else branch is running. Only `\fi` can end it.
    InElse,
    /// The rest of the conditional is being skipped.
    Skipped,
}

/// An entry in the conditional stack.
#[derive(Debug, Clone, Copy)]
pub struct Entry {
    /// The token that opened the conditional. Used to locate the conditional in errors.
    pub token: Token,
    pub kind: Kind,
    pub branch: Branch,
    /// Whether the conditional was entered via `\unless`.
    pub negated: bool,
}

static ELSE_TAG: command::StaticTag = command::StaticTag::new();
static OR_TAG: command::StaticTag = command::StaticTag::new();
static FI_TAG: command::StaticTag = command::StaticTag::new();
static UNLESS_TAG: command::StaticTag = command::StaticTag::new();

pub fn else_tag() -> command::Tag {
    ELSE_TAG.get()
}

pub fn or_tag() -> command::Tag {
    OR_TAG.get()
}

pub fn fi_tag() -> command::Tag {
    FI_TAG.get()
}

pub fn unless_tag() -> command::Tag {
    UNLESS_TAG.get()
}

/// Returns the conditional primitives of the engine and their names.
pub fn built_ins<S: TexlangState>() -> Vec<(&'static str, command::BuiltIn<S>)> {
    vec![
        ("else", get_else()),
        ("fi", get_fi()),
        ("ifcase", get_ifcase()),
        ("iffalse", get_iffalse()),
        ("iftrue", get_iftrue()),
        ("or", get_or()),
        ("unless", get_unless()),
    ]
}

/// Get the `\iftrue` primitive.
pub fn get_iftrue<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(iftrue_fn)
        .with_doc("Begin a conditional whose true branch always runs")
}

fn iftrue_fn<S>(_: Token, _: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    Ok(true)
}

/// Get the `\iffalse` primitive.
pub fn get_iffalse<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_boolean_conditional(iffalse_fn)
        .with_doc("Begin a conditional whose true branch never runs")
}

fn iffalse_fn<S>(_: Token, _: &mut vm::ExpansionInput<S>) -> txl::Result<bool> {
    Ok(false)
}

/// Get the `\ifcase` primitive.
pub fn get_ifcase<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_case_conditional(ifcase_fn)
        .with_doc("Begin a case statement; cases are separated by \\or")
}

fn ifcase_fn<S: TexlangState>(_: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<i32> {
    i32::parse(input)
}

/// Get the `\else` primitive.
pub fn get_else<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(else_fn)
        .with_tag(else_tag())
        .with_doc("Begin the false branch of a conditional")
}

fn else_fn<S: TexlangState>(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    let conditional_token = match input.context_mut().top_conditional_mut() {
        Some(entry) if entry.branch == Branch::InThen => {
            entry.branch = Branch::Skipped;
            entry.token
        }
        _ => return Err(ConditionalStackError::extra(input.vm(), token, Extra::Else).into()),
    };
    skip(conditional_token, input, SkipMode::FiOnly)?;
    pop(input);
    Ok(())
}

/// Get the `\or` primitive.
pub fn get_or<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(or_fn)
        .with_tag(or_tag())
        .with_doc("Begin the next case of a \\ifcase statement")
}

fn or_fn<S: TexlangState>(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    let conditional_token = match input.context_mut().top_conditional_mut() {
        Some(entry) if entry.branch == Branch::InThen && entry.kind == Kind::Case => {
            entry.branch = Branch::Skipped;
            entry.token
        }
        _ => return Err(ConditionalStackError::extra(input.vm(), token, Extra::Or).into()),
    };
    skip(conditional_token, input, SkipMode::FiOnly)?;
    pop(input);
    Ok(())
}

/// Get the `\fi` primitive.
pub fn get_fi<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(fi_fn)
        .with_tag(fi_tag())
        .with_doc("End a conditional")
}

fn fi_fn<S: TexlangState>(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    match pop(input) {
        Some(_) => Ok(()),
        None => Err(ConditionalStackError::extra(input.vm(), token, Extra::Fi).into()),
    }
}

/// Get the `\unless` primitive.
pub fn get_unless<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_expansion(unless_fn)
        .with_tag(unless_tag())
        .with_doc("Invert the outcome of the following boolean conditional")
}

fn unless_fn<S: TexlangState>(token: Token, input: &mut vm::ExpansionInput<S>) -> txl::Result<()> {
    let Some(next) = input.unexpanded().next()? else {
        return Err(ConditionalStackError::cant_use_after(input.vm(), token, None).into());
    };
    let condition = match next.value() {
        token::Value::CommandRef(command_ref) => match input.commands_map().get_command(&command_ref) {
            Some(command::Command::Conditional(Condition::Boolean(f))) => Some(*f),
            _ => None,
        },
        _ => None,
    };
    let Some(f) = condition else {
        return Err(ConditionalStackError::cant_use_after(input.vm(), token, Some(next)).into());
    };
    let outcome = f(next, input)?;
    apply_boolean(next, input, !outcome, true)
}

/// Evaluates a conditional command and applies the outcome.
///
/// This is invoked by the expansion loop when a [command::Command::Conditional] is expanded.
pub(crate) fn evaluate<S: TexlangState>(
    condition: Condition<S>,
    token: Token,
    input: &mut vm::ExpansionInput<S>,
) -> txl::Result<()> {
    match condition {
        Condition::Boolean(f) => {
            let outcome = f(token, input)?;
            apply_boolean(token, input, outcome, false)
        }
        Condition::Case(f) => {
            let n = f(token, input)?;
            apply_case(token, input, n)
        }
    }
}

fn apply_boolean<S: TexlangState>(
    token: Token,
    input: &mut vm::ExpansionInput<S>,
    outcome: bool,
    negated: bool,
) -> txl::Result<()> {
    if outcome {
        push(input, token, Kind::Boolean, Branch::InThen, negated);
        return Ok(());
    }
    match skip(token, input, SkipMode::ElseOrFi)? {
        Stop::Else => {
            push(input, token, Kind::Boolean, Branch::InElse, negated);
            Ok(())
        }
        Stop::Fi => Ok(()),
        Stop::Or(or_token) => {
            Err(ConditionalStackError::extra(input.vm(), or_token, Extra::Or).into())
        }
    }
}

fn apply_case<S: TexlangState>(
    token: Token,
    input: &mut vm::ExpansionInput<S>,
    n: i32,
) -> txl::Result<()> {
    if n == 0 {
        push(input, token, Kind::Case, Branch::InThen, false);
        return Ok(());
    }
    // A negative case never matches an \or.
    let mut remaining = n;
    loop {
        match skip(token, input, SkipMode::ElseOrFi)? {
            Stop::Or(_) => {
                if remaining > 0 {
                    remaining -= 1;
                    if remaining == 0 {
                        push(input, token, Kind::Case, Branch::InThen, false);
                        return Ok(());
                    }
                }
            }
            Stop::Else => {
                push(input, token, Kind::Case, Branch::InElse, false);
                return Ok(());
            }
            Stop::Fi => return Ok(()),
        }
    }
}

fn push<S: TexlangState>(
    input: &mut vm::ExpansionInput<S>,
    token: Token,
    kind: Kind,
    branch: Branch,
    negated: bool,
) {
    input.context_mut().push_conditional(Entry {
        token,
        kind,
        branch,
        negated,
    });
    log::trace!(
        "pushed conditional {:?} in {:?}, depth {}",
        kind,
        branch,
        input.vm().conditional_depth()
    );
}

fn pop<S: TexlangState>(input: &mut vm::ExpansionInput<S>) -> Option<Entry> {
    let entry = input.context_mut().pop_conditional()?;
    log::trace!(
        "popped conditional {:?}, depth {}",
        entry.kind,
        input.vm().conditional_depth()
    );
    Some(entry)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipMode {
    /// Stop at `\else`, `\or` or `\fi` at nesting level zero.
    ElseOrFi,
    /// Stop only at `\fi` at nesting level zero.
    FiOnly,
}

#[derive(Debug)]
enum Stop {
    Else,
    Or(Token),
    Fi,
}

/// Skips unexpanded tokens up to the matching `\else`, `\or` or `\fi`.
///
/// The token that stops skipping is consumed.
fn skip<S: TexlangState>(
    conditional_token: Token,
    input: &mut vm::ExpansionInput<S>,
    mode: SkipMode,
) -> txl::Result<Stop> {
    let (else_tag, or_tag, fi_tag) = (else_tag(), or_tag(), fi_tag());
    let mut depth = 0_usize;
    loop {
        let token = match input.unexpanded().next()? {
            None => {
                return Err(IncompleteConditionalError::new(input.vm(), conditional_token).into())
            }
            Some(token) => token,
        };
        let command_ref = match token.value() {
            token::Value::CommandRef(command_ref) => command_ref,
            _ => continue,
        };
        let tag = match input.commands_map().get_command(&command_ref) {
            Some(command::Command::Conditional(_)) => {
                depth += 1;
                continue;
            }
            Some(command) => command.tag(),
            None => None,
        };
        let Some(tag) = tag else {
            continue;
        };
        if tag == fi_tag {
            if depth == 0 {
                return Ok(Stop::Fi);
            }
            depth -= 1;
        } else if depth == 0 && mode == SkipMode::ElseOrFi {
            if tag == else_tag {
                return Ok(Stop::Else);
            }
            if tag == or_tag {
                return Ok(Stop::Or(token));
            }
        }
    }
}

/// Which command was extra.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extra {
    Else,
    Or,
    Fi,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalStackErrorKind {
    /// An `\else`, `\or` or `\fi` appeared where no open conditional can accept it.
    Extra(Extra),
    /// `\unless` was followed by something other than a boolean conditional.
    CantUseAfter,
}

/// Misuse of the conditional stack.
#[derive(Debug)]
pub struct ConditionalStackError {
    pub trace: trace::SourceCodeTrace,
    pub kind: ConditionalStackErrorKind,
    /// The `\unless` that could not be applied.
    pub unless: Option<trace::SourceCodeTrace>,
}

impl ConditionalStackError {
    fn extra<S>(vm: &vm::VM<S>, token: Token, extra: Extra) -> Self {
        ConditionalStackError {
            trace: vm.trace(token),
            kind: ConditionalStackErrorKind::Extra(extra),
            unless: None,
        }
    }

    fn cant_use_after<S>(vm: &vm::VM<S>, unless_token: Token, next: Option<Token>) -> Self {
        ConditionalStackError {
            trace: match next {
                None => vm.trace_end_of_input(),
                Some(next) => vm.trace(next),
            },
            kind: ConditionalStackErrorKind::CantUseAfter,
            unless: Some(vm.trace(unless_token)),
        }
    }
}

impl error::TexError for ConditionalStackError {
    fn kind(&self) -> error::Kind {
        match self.trace.token {
            None => error::Kind::EndOfInput(&self.trace),
            Some(_) => error::Kind::Token(&self.trace),
        }
    }

    fn category(&self) -> error::Category {
        error::Category::ConditionalStack
    }

    fn title(&self) -> String {
        match self.kind {
            ConditionalStackErrorKind::Extra(Extra::Else) => "extra \\else".into(),
            ConditionalStackErrorKind::Extra(Extra::Or) => "extra \\or".into(),
            ConditionalStackErrorKind::Extra(Extra::Fi) => "extra \\fi".into(),
            ConditionalStackErrorKind::CantUseAfter => match self.trace.token {
                None => "you can't use \\unless at the end of the input".into(),
                Some(_) => format!["you can't use \\unless before {}", self.trace.value],
            },
        }
    }

    fn notes(&self) -> Vec<error::display::Note> {
        match self.kind {
            ConditionalStackErrorKind::Extra(Extra::Else) => {
                vec!["an \\else must be inside the true branch of a conditional or a running case of \\ifcase".into()]
            }
            ConditionalStackErrorKind::Extra(Extra::Or) => {
                vec!["an \\or must be inside a running case of \\ifcase".into()]
            }
            ConditionalStackErrorKind::Extra(Extra::Fi) => {
                vec!["there is no open conditional to end".into()]
            }
            ConditionalStackErrorKind::CantUseAfter => {
                let mut notes: Vec<error::display::Note> =
                    vec!["\\unless must be followed by a boolean conditional like \\iftrue or \\ifnum".into()];
                if let Some(unless) = &self.unless {
                    notes.push(error::display::Note::SourceCodeTrace(
                        "the \\unless is here:".into(),
                        unless,
                    ));
                }
                notes
            }
        }
    }
}

/// The input ended while a conditional branch was being skipped.
#[derive(Debug)]
pub struct IncompleteConditionalError {
    pub trace: trace::SourceCodeTrace,
    pub conditional: trace::SourceCodeTrace,
}

impl IncompleteConditionalError {
    fn new<S>(vm: &vm::VM<S>, conditional_token: Token) -> Self {
        IncompleteConditionalError {
            trace: vm.trace_end_of_input(),
            conditional: vm.trace(conditional_token),
        }
    }
}

impl error::TexError for IncompleteConditionalError {
    fn kind(&self) -> error::Kind {
        error::Kind::EndOfInput(&self.trace)
    }

    fn category(&self) -> error::Category {
        error::Category::ConditionalStack
    }

    fn title(&self) -> String {
        "input ended while skipping a conditional branch".into()
    }

    fn notes(&self) -> Vec<error::display::Note> {
        vec![error::display::Note::SourceCodeTrace(
            "the conditional started here:".into(),
            &self.conditional,
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Category;
    use std::collections::HashMap;

    fn ifletter_fn<S: TexlangState>(
        token: Token,
        input: &mut vm::ExpansionInput<S>,
    ) -> txl::Result<bool> {
        match input.unexpanded().next()? {
            None => Err(error::SimpleTokenError::new(input.vm(), token, "missing argument").into()),
            Some(next) => Ok(matches!(next.value(), token::Value::Letter(_))),
        }
    }

    fn new_vm() -> Box<vm::VM<()>> {
        let mut built_ins: HashMap<&str, command::BuiltIn<()>> =
            built_ins().into_iter().collect();
        built_ins.insert(
            "ifletter",
            command::BuiltIn::new_boolean_conditional(ifletter_fn),
        );
        vm::VM::new(built_ins)
    }

    fn expand(source: &str) -> txl::Result<(String, usize)> {
        let mut vm = new_vm();
        vm.push_source("input.tex", source)?;
        let mut tokens = vec![];
        {
            let input = vm::ExecutionInput::new(&mut vm);
            while let Some(token) = input.next()? {
                tokens.push(token);
            }
        }
        Ok((
            token::write_tokens(&tokens, vm.cs_name_interner()),
            vm.conditional_depth(),
        ))
    }

    fn expand_ok(source: &str) -> String {
        match expand(source) {
            Ok((output, _)) => output,
            Err(err) => panic!("expansion of {source:?} failed: {err}"),
        }
    }

    macro_rules! expansion_tests {
        ($( ($name: ident, $input: expr, $want: expr) ),+ $(,)?) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(expand_ok($input), $want);
                }
            )+
        };
    }

    expansion_tests![
        (iftrue_runs_true_branch, r"\iftrue AB\else CD\fi", "AB"),
        (iffalse_runs_false_branch, r"\iffalse AB\else CD\fi", "CD"),
        (unless_inverts_iftrue, r"\unless\iftrue AB\else CD\fi", "CD"),
        (unless_inverts_iffalse, r"\unless\iffalse AB\else CD\fi", "AB"),
        (nested_skip_balances_inner_fi, r"\iftrue \iffalse X\fi Y\fi", "Y"),
        (iffalse_no_else, r"\iffalse AB\fi CD", "CD"),
        (iftrue_skips_extra_text_after_else, r"\iftrue A\else B\else C\fi D", "AD"),
        (nested_in_skipped_true_branch, r"\iffalse \iftrue A\else B\fi C\else D\fi", "D"),
        (nested_in_skipped_else_branch, r"\iftrue A\else \iffalse B\else C\fi D\fi E", "AE"),
        (unless_in_skipped_true_branch, r"\iffalse \unless\iftrue A\else B\fi C\else D\fi", "D"),
        (unless_in_skipped_else_branch, r"\iftrue X\else \unless\iffalse Y\fi\fi Z", "XZ"),
        (lone_unless_in_skipped_branch, r"\iffalse \unless A\else B\fi", "B"),
        (undefined_commands_are_skipped, r"\iffalse \undefined\fi A", "A"),
        (ifcase_zero, r"\ifcase 0 a\or b\or c\fi", "a"),
        (ifcase_two, r"\ifcase 2 a\or b\or c\or d\else e\fi", "c"),
        (ifcase_else, r"\ifcase 7 a\or b\else e\fi", "e"),
        (ifcase_no_match, r"\ifcase 7 a\or b\fi x", "x"),
        (ifcase_negative, r"\ifcase -1 a\or b\else e\fi", "e"),
        (ifcase_nested_or_is_ignored, r"\ifcase 1 \iftrue x\else y\fi \or z\fi", "z"),
        (ifcase_nested_ifcase, r"\ifcase 1 \ifcase 0 \or\or\fi\or B\or C\fi", "B"),
        (ifcase_running_case_else_skips, r"\ifcase 0 a\else b\fi c", "ac"),
        (custom_boolean_conditional, r"\ifletter a T\else F\fi", "T"),
        (unless_custom_boolean_conditional, r"\unless\ifletter 1 T\else F\fi", "T"),
    ];

    fn expect_category(source: &str, want: Category, want_title: &str) {
        match expand(source) {
            Ok((output, _)) => panic!("expansion of {source:?} succeeded with output {output:?}"),
            Err(err) => {
                assert_eq!(err.category(), want, "{err}");
                assert_eq!(err.title(), want_title);
                assert!(err.locator().is_some());
            }
        }
    }

    #[test]
    fn lone_fi() {
        expect_category(r"\fi", Category::ConditionalStack, "extra \\fi");
    }

    #[test]
    fn lone_else() {
        expect_category(r"A\else", Category::ConditionalStack, "extra \\else");
    }

    #[test]
    fn else_in_else_branch() {
        expect_category(
            r"\iffalse A\else B\else C\fi",
            Category::ConditionalStack,
            "extra \\else",
        );
    }

    #[test]
    fn or_in_boolean_conditional() {
        expect_category(r"\iftrue A\or B\fi", Category::ConditionalStack, "extra \\or");
    }

    #[test]
    fn or_while_skipping_boolean_conditional() {
        expect_category(r"\iffalse A\or B\fi", Category::ConditionalStack, "extra \\or");
    }

    #[test]
    fn unless_ifcase() {
        expect_category(
            r"\unless\ifcase 0 A\fi",
            Category::ConditionalStack,
            "you can't use \\unless before \\ifcase",
        );
    }

    #[test]
    fn unless_character() {
        expect_category(
            r"\unless A",
            Category::ConditionalStack,
            "you can't use \\unless before A",
        );
    }

    #[test]
    fn unless_end_of_input() {
        expect_category(
            r"\unless",
            Category::ConditionalStack,
            "you can't use \\unless at the end of the input",
        );
    }

    #[test]
    fn unless_error_points_at_the_unless() {
        colored::control::set_override(false);
        let err = match expand(r"AB\unless C") {
            Ok((output, _)) => panic!("expansion succeeded with output {output:?}"),
            Err(err) => err,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("the \\unless is here:"), "{rendered}");
        assert!(rendered.contains("input.tex:1:3"), "{rendered}");
    }

    #[test]
    fn unless_undefined() {
        expect_category(
            r"\unless\undefined",
            Category::ConditionalStack,
            "you can't use \\unless before \\undefined",
        );
    }

    #[test]
    fn incomplete_conditional() {
        expect_category(
            r"\iffalse A",
            Category::ConditionalStack,
            "input ended while skipping a conditional branch",
        );
    }

    #[test]
    fn open_conditionals_are_observable() {
        let (_, depth) = expand(r"\iftrue \iftrue \iffalse\else A").unwrap();
        assert_eq!(depth, 3);
    }

    #[test]
    fn entries_record_branch_and_negation() {
        let mut vm = new_vm();
        vm.push_source("input.tex", r"\unless\iftrue A\else B").unwrap();
        let input = vm::ExecutionInput::new(&mut vm);
        assert_eq!(
            input.next().unwrap().map(|t| t.value()),
            Some(token::Value::Letter('B'))
        );
        let entry = *input.vm().context.top_conditional().unwrap();
        assert_eq!(entry.kind, Kind::Boolean);
        assert_eq!(entry.branch, Branch::InElse);
        assert!(entry.negated);
        assert_eq!(input.vm().trace(entry.token).value, "\\iftrue");
    }

    /// Generates well formed conditional text with `n` levels of nesting.
    ///
    /// The seed determines which conditionals are used and which branches exist.
    fn well_formed(seed: u32, depth: u32) -> String {
        if depth == 0 {
            return "x".into();
        }
        let inner = well_formed(seed / 7, depth - 1);
        match seed % 7 {
            0 => format![r"\iftrue {inner}\fi "],
            1 => format![r"\iffalse {inner}\else {inner}\fi "],
            2 => format![r"\unless\iftrue {inner}\else {inner}\fi "],
            3 => format![r"\unless\iffalse {inner}\fi {inner}"],
            4 => format![r"\ifcase 1 {inner}\or {inner}\or {inner}\else {inner}\fi "],
            5 => format![r"\ifcase 3 {inner}\or {inner}\fi {inner}"],
            _ => format![r"\ifletter a{inner}\else {inner}\fi "],
        }
    }

    #[test]
    fn conditional_balance() {
        for seed in 0..400_u32 {
            let source = well_formed(seed.wrapping_mul(2654435761) % 100_000, 4);
            match expand(&source) {
                Ok((_, depth)) => assert_eq!(depth, 0, "{source}"),
                Err(err) => panic!("expansion of {source:?} failed: {err}"),
            }
            let unbalanced = format!["{source}\\fi"];
            let err = expand(&unbalanced).unwrap_err();
            assert_eq!(err.category(), Category::ConditionalStack, "{unbalanced}");
        }
    }

    #[test]
    fn unless_inversion_law() {
        let conditionals = [
            r"\iftrue",
            r"\iffalse",
            r"\ifletter a",
            r"\ifletter 1",
            r"\ifletter\fi",
        ];
        for conditional in conditionals {
            for (body, else_branch) in [("T", ""), ("T", r"\else F"), (r"\iftrue T\fi", r"\else \iffalse\else F\fi")] {
                let plain = expand_ok(&format![r"{conditional} {body}{else_branch}\fi"]);
                let negated = expand_ok(&format![r"\unless{conditional} {body}{else_branch}\fi"]);
                assert_eq!(
                    plain.contains('T'),
                    !negated.contains('T'),
                    "{conditional}: {plain:?} vs {negated:?}"
                );
            }
        }
    }
}
