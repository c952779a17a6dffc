//! Tokens, control sequence names and namespaces.

mod catcode;
pub mod lexer;
pub mod trace;
pub use catcode::CatCode;
use std::num;
use texpand_stdext::collections::interner;

/// Interned name of a control sequence.
///
/// The representation is opaque; names are resolved back to strings
///     using the [CsNameInterner] owned by the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CsName(num::NonZeroU32);

impl CsName {
    /// Index of the name in the interner. The first interned name has index 0.
    #[inline]
    pub fn to_usize(&self) -> usize {
        interner::Key::into_usize(self.0)
    }
}

/// String interner for control sequence names.
pub type CsNameInterner = interner::Interner<CsName>;

impl interner::Key for CsName {
    fn try_from_usize(index: usize) -> Option<Self> {
        num::NonZeroU32::try_from_usize(index).map(CsName)
    }

    fn into_usize(self) -> usize {
        self.0.into_usize()
    }
}

/// A partition of the binding table.
///
/// Every control sequence and active character token is created in a namespace,
///     namely the namespace that was current when the lexer produced it.
/// The [root namespace](Namespace::ROOT) is the namespace with the empty name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Namespace(num::NonZeroU16);

impl Namespace {
    /// The root namespace.
    ///
    /// The namespace interner always interns the empty string first, so it gets this key.
    pub const ROOT: Namespace = Namespace(num::NonZeroU16::MIN);

    pub fn is_root(&self) -> bool {
        *self == Namespace::ROOT
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::ROOT
    }
}

/// String interner for namespace names.
pub type NamespaceInterner = interner::Interner<Namespace>;

impl interner::Key for Namespace {
    fn try_from_usize(index: usize) -> Option<Self> {
        num::NonZeroU16::try_from_usize(index).map(Namespace)
    }

    fn into_usize(self) -> usize {
        self.0.into_usize()
    }
}

/// The value of a token.
///
/// Category codes that only the lexer sees have no corresponding variant.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    BeginGroup(char),
    EndGroup(char),
    MathShift(char),
    AlignmentTab(char),
    Parameter(char),
    Superscript(char),
    Subscript(char),
    Space(char),
    Letter(char),
    Other(char),
    CommandRef(CommandRef),
}

/// The value of a token that references a command.
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandRef {
    ControlSequence(CsName, Namespace),
    ActiveCharacter(char, Namespace),
}

impl CommandRef {
    pub fn namespace(&self) -> Namespace {
        match self {
            CommandRef::ControlSequence(_, namespace) => *namespace,
            CommandRef::ActiveCharacter(_, namespace) => *namespace,
        }
    }

    /// Returns the same reference in a different namespace.
    pub fn in_namespace(self, namespace: Namespace) -> CommandRef {
        match self {
            CommandRef::ControlSequence(name, _) => CommandRef::ControlSequence(name, namespace),
            CommandRef::ActiveCharacter(c, _) => CommandRef::ActiveCharacter(c, namespace),
        }
    }

    /// Returns a human readable form like `\relax` or `~`.
    ///
    /// The namespace is not included.
    pub fn to_string(&self, cs_name_interner: &CsNameInterner) -> String {
        match self {
            CommandRef::ControlSequence(cs_name, _) => {
                format!("\\{}", cs_name_interner.resolve(*cs_name).unwrap_or(""))
            }
            CommandRef::ActiveCharacter(c, _) => format!("{c}"),
        }
    }
}

impl Value {
    /// Creates the value of a character token.
    ///
    /// Returns [None] if the category code does not produce tokens.
    /// Active characters are created in the root namespace.
    pub fn new(c: char, cat_code: CatCode) -> Option<Value> {
        Some(match cat_code {
            CatCode::BeginGroup => Value::BeginGroup(c),
            CatCode::EndGroup => Value::EndGroup(c),
            CatCode::MathShift => Value::MathShift(c),
            CatCode::AlignmentTab => Value::AlignmentTab(c),
            CatCode::Parameter => Value::Parameter(c),
            CatCode::Superscript => Value::Superscript(c),
            CatCode::Subscript => Value::Subscript(c),
            CatCode::Space => Value::Space(c),
            CatCode::Letter => Value::Letter(c),
            CatCode::Other => Value::Other(c),
            CatCode::Active => {
                Value::CommandRef(CommandRef::ActiveCharacter(c, Namespace::ROOT))
            }
            CatCode::Escape
            | CatCode::EndOfLine
            | CatCode::Ignored
            | CatCode::Comment
            | CatCode::Invalid => return None,
        })
    }
}

/// A token.
///
/// A token is a [Value] together with a [trace::Key] that locates it in the source code.
/// Equality only compares values.
#[derive(Debug, Eq, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Token {
    value: Value,
    trace_key: trace::Key,
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

macro_rules! token_constructor {
    ($name: ident, $value: expr) => {
        pub fn $name(c: char, trace_key: trace::Key) -> Token {
            Token {
                value: $value(c),
                trace_key,
            }
        }
    };
}

impl Token {
    token_constructor!(new_begin_group, Value::BeginGroup);
    token_constructor!(new_end_group, Value::EndGroup);
    token_constructor!(new_math_shift, Value::MathShift);
    token_constructor!(new_alignment_tab, Value::AlignmentTab);
    token_constructor!(new_parameter, Value::Parameter);
    token_constructor!(new_superscript, Value::Superscript);
    token_constructor!(new_subscript, Value::Subscript);
    token_constructor!(new_space, Value::Space);
    token_constructor!(new_letter, Value::Letter);
    token_constructor!(new_other, Value::Other);

    pub fn new_active_character(c: char, namespace: Namespace, trace_key: trace::Key) -> Token {
        Token {
            value: Value::CommandRef(CommandRef::ActiveCharacter(c, namespace)),
            trace_key,
        }
    }

    pub fn new_control_sequence(name: CsName, namespace: Namespace, trace_key: trace::Key) -> Token {
        Token {
            value: Value::CommandRef(CommandRef::ControlSequence(name, namespace)),
            trace_key,
        }
    }

    pub fn new_from_value(value: Value, trace_key: trace::Key) -> Token {
        Token { value, trace_key }
    }

    #[inline]
    pub fn value(&self) -> Value {
        self.value
    }

    #[inline]
    pub fn trace_key(&self) -> trace::Key {
        self.trace_key
    }

    /// Returns the character of a character token or active character.
    pub fn char(&self) -> Option<char> {
        match self.value {
            Value::BeginGroup(c)
            | Value::EndGroup(c)
            | Value::MathShift(c)
            | Value::AlignmentTab(c)
            | Value::Parameter(c)
            | Value::Superscript(c)
            | Value::Subscript(c)
            | Value::Space(c)
            | Value::Letter(c)
            | Value::Other(c)
            | Value::CommandRef(CommandRef::ActiveCharacter(c, _)) => Some(c),
            Value::CommandRef(CommandRef::ControlSequence(..)) => None,
        }
    }

    /// Returns the category code of the token, or [None] for control sequences.
    pub fn cat_code(&self) -> Option<CatCode> {
        Some(match self.value {
            Value::BeginGroup(_) => CatCode::BeginGroup,
            Value::EndGroup(_) => CatCode::EndGroup,
            Value::MathShift(_) => CatCode::MathShift,
            Value::AlignmentTab(_) => CatCode::AlignmentTab,
            Value::Parameter(_) => CatCode::Parameter,
            Value::Superscript(_) => CatCode::Superscript,
            Value::Subscript(_) => CatCode::Subscript,
            Value::Space(_) => CatCode::Space,
            Value::Letter(_) => CatCode::Letter,
            Value::Other(_) => CatCode::Other,
            Value::CommandRef(CommandRef::ActiveCharacter(..)) => CatCode::Active,
            Value::CommandRef(CommandRef::ControlSequence(..)) => return None,
        })
    }
}

/// Writes tokens as text.
///
/// Runs of spaces collapse to a single space and leading and trailing whitespace is dropped.
/// Space tokens with the character `\n` are written as newlines and are not collapsed.
/// A space is inserted after a control word if the next token is a letter.
pub struct Writer<I> {
    io_writer: I,
    pending_space: bool,
    pending_newlines: usize,
    started: bool,
    after_control_word: bool,
}

impl<I: Default> Default for Writer<I> {
    fn default() -> Self {
        Writer::new(Default::default())
    }
}

impl<I> Writer<I> {
    /// Create a new writer that writes output to the provided IO writer.
    pub fn new(io_writer: I) -> Self {
        Self {
            io_writer,
            pending_space: false,
            pending_newlines: 0,
            started: false,
            after_control_word: false,
        }
    }

    pub fn take_io_writer(self) -> I {
        self.io_writer
    }
}

impl<I: std::io::Write> Writer<I> {
    /// Write a token.
    pub fn write(&mut self, interner: &CsNameInterner, token: Token) -> std::io::Result<()> {
        match token.value {
            Value::Space('\n') if self.started => {
                self.pending_newlines += 1;
                return Ok(());
            }
            Value::Space(_) => {
                self.pending_space = self.started;
                return Ok(());
            }
            _ => {}
        }
        if self.pending_newlines > 0 {
            for _ in 0..self.pending_newlines {
                writeln!(self.io_writer)?;
            }
            self.after_control_word = false;
        } else if self.pending_space {
            write!(self.io_writer, " ")?;
            self.after_control_word = false;
        }
        self.pending_space = false;
        self.pending_newlines = 0;
        match token.value {
            Value::CommandRef(CommandRef::ControlSequence(name, _)) => {
                let name = interner.resolve(name).unwrap_or("");
                write!(self.io_writer, "\\{name}")?;
                self.after_control_word = name.chars().all(char::is_alphabetic) && !name.is_empty();
            }
            _ => {
                let c = token.char().unwrap_or_default();
                if self.after_control_word && c.is_alphabetic() {
                    write!(self.io_writer, " ")?;
                }
                write!(self.io_writer, "{c}")?;
                self.after_control_word = false;
            }
        }
        self.started = true;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.io_writer.flush()
    }
}

/// Write a collection of tokens to a string.
pub fn write_tokens<'a, T>(tokens: T, interner: &CsNameInterner) -> String
where
    T: IntoIterator<Item = &'a Token>,
{
    let mut writer: Writer<Vec<u8>> = Default::default();
    for token in tokens.into_iter() {
        // Writing to a vector cannot fail.
        let _ = writer.write(interner, *token);
    }
    String::from_utf8_lossy(&writer.take_io_writer()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    enum PreInternedToken {
        ControlSequence(&'static str),
        Character(char, CatCode),
    }

    macro_rules! write_tokens_test {
        ($name: ident, $input: expr, $want: expr) => {
            #[test]
            fn $name() {
                let mut tokens: Vec<Token> = vec![];
                let mut interner = CsNameInterner::default();
                for pre_interned_token in $input {
                    let token = match pre_interned_token {
                        PreInternedToken::ControlSequence(name) => {
                            let cs_name = interner.get_or_intern(name);
                            Token::new_control_sequence(
                                cs_name,
                                Namespace::ROOT,
                                trace::Key::dummy(),
                            )
                        }
                        PreInternedToken::Character(c, code) => {
                            Token::new_from_value(Value::new(c, code).unwrap(), trace::Key::dummy())
                        }
                    };
                    tokens.push(token);
                }
                let got = write_tokens(&tokens, &interner);
                assert_eq!(got, $want.to_string());
            }
        };
    }

    write_tokens_test!(blank, Vec::<PreInternedToken>::new(), "");
    write_tokens_test![
        trim_whitespace_from_start,
        vec![
            PreInternedToken::Character(' ', CatCode::Space),
            PreInternedToken::Character(' ', CatCode::Space),
            PreInternedToken::Character('H', CatCode::Letter),
        ],
        "H"
    ];
    write_tokens_test![
        trim_whitespace_from_end,
        vec![
            PreInternedToken::Character('H', CatCode::Letter),
            PreInternedToken::Character(' ', CatCode::Space),
        ],
        "H"
    ];
    write_tokens_test![
        newlines_are_not_collapsed,
        vec![
            PreInternedToken::Character('H', CatCode::Letter),
            PreInternedToken::Character(' ', CatCode::Space),
            PreInternedToken::Character('\n', CatCode::Space),
            PreInternedToken::Character('\n', CatCode::Space),
            PreInternedToken::Character('W', CatCode::Letter),
            PreInternedToken::Character('\n', CatCode::Space),
        ],
        "H\n\nW"
    ];
    write_tokens_test![
        collapse_whitespace,
        vec![
            PreInternedToken::Character('H', CatCode::Letter),
            PreInternedToken::Character(' ', CatCode::Space),
            PreInternedToken::Character(' ', CatCode::Space),
            PreInternedToken::Character('W', CatCode::Letter),
        ],
        "H W"
    ];
    write_tokens_test![
        control_word_then_letter,
        vec![
            PreInternedToken::ControlSequence("par"),
            PreInternedToken::Character('W', CatCode::Letter),
        ],
        "\\par W"
    ];
    write_tokens_test![
        control_symbol_then_letter,
        vec![
            PreInternedToken::ControlSequence("%"),
            PreInternedToken::Character('W', CatCode::Letter),
        ],
        "\\%W"
    ];

    #[test]
    fn equality_ignores_trace_key() {
        let a = Token::new_letter('a', trace::Key::dummy());
        let b = Token::new_from_value(Value::Letter('a'), trace::Key::dummy());
        assert_eq!(a, b);
        assert_ne!(a, Token::new_other('a', trace::Key::dummy()));
    }

    #[test]
    fn command_ref_namespace() {
        let mut namespaces = NamespaceInterner::default();
        assert_eq!(namespaces.get_or_intern(""), Namespace::ROOT);
        let other = namespaces.get_or_intern("other");
        let command_ref = CommandRef::ActiveCharacter('~', Namespace::ROOT);
        assert_eq!(command_ref.in_namespace(other).namespace(), other);
        assert!(command_ref.namespace().is_root());
    }

    #[test]
    fn token_is_small() {
        assert!(std::mem::size_of::<Token>() <= 16);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let token = Token::new_letter('a', trace::Key::dummy());
        let serialized = serde_json::to_string(&token).unwrap();
        let deserialized: Token = serde_json::from_str(&serialized).unwrap();
        assert_eq!(token, deserialized);
    }
}
