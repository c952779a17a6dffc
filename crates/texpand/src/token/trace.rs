//! Locating tokens in source code.
//!
//! Error messages need the file, line and column a token came from.
//! Storing this on every token would make tokens large,
//!     so each token instead holds a 32-bit [Key] and the [Tracer]
//!     maps keys back to source code on demand.
//!
//! # How keys are assigned
//!
//! When source code is added to the input it is registered with
//!     [register_source_code](Tracer::register_source_code).
//! The tracer reserves one key per character of the source code, plus one extra key,
//!     and returns the first of them as a [KeyRange].
//! The lexer gives the token starting at character offset `n` the key `first + n`.
//! The extra key is used for the end-of-line character appended to a final line
//!     that has no trailing newline.
//!
//! Tracing a key finds the registered source code whose range contains it;
//!     the difference between the key and the first key of the range is the character offset.
use crate::token::{CommandRef, CsNameInterner, Token, Value};
use std::collections::BTreeMap;
use std::ops::Bound::Included;
use std::path::PathBuf;

/// Key attached to tokens to enable tracing them.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Key(u32);

impl Key {
    /// A key that does not correspond to any source code.
    pub fn dummy() -> Key {
        Key(u32::MAX)
    }
}

/// Keys reserved for one piece of source code.
#[derive(Debug, Clone, Copy)]
pub struct KeyRange {
    first: u32,
    limit: u32,
}

impl KeyRange {
    /// Returns the key for the character at the provided offset.
    ///
    /// Offsets past the end of the range get the last key of the range.
    pub fn key(&self, char_offset: usize) -> Key {
        if self.limit == self.first {
            return Key::dummy();
        }
        let offset = u32::try_from(char_offset).unwrap_or(u32::MAX);
        Key(self
            .first
            .saturating_add(offset)
            .min(self.limit.saturating_sub(1)))
    }

    /// A range that traces nothing. Keys from this range are dummy keys.
    pub fn empty() -> KeyRange {
        KeyRange { first: 0, limit: 0 }
    }
}

/// Where some source code came from.
#[derive(Debug, PartialEq, Eq, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Origin {
    File(PathBuf),
    Terminal,
    /// The token does not come from registered source code.
    Unknown,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::File(path) => write!(f, "{}", path.display()),
            Origin::Terminal => write!(f, "<terminal>"),
            Origin::Unknown => write!(f, "<unknown>"),
        }
    }
}

/// The result of tracing a token or the end of the input.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SourceCodeTrace {
    pub origin: Origin,
    /// Content of the line the token came from.
    pub line_content: String,
    /// Line number, starting at 1.
    pub line_number: usize,
    /// Character index within the line where the token starts.
    pub index: usize,
    /// The token as it appears in the source.
    pub value: String,
    /// The token, or [None] for an end of input trace.
    pub token: Option<Token>,
}

struct Checkpoint {
    origin: Origin,
    content: String,
}

/// Records source code so that tokens can be traced.
#[derive(Default)]
pub struct Tracer {
    checkpoints: BTreeMap<u32, Checkpoint>,
    next_key: u32,
    last_external_input: Option<u32>,
}

impl Tracer {
    /// Registers source code with the tracer and returns the keys reserved for it.
    ///
    /// The token is the command that caused the source code to be read, e.g. `\input`.
    /// Source code registered without a token is external input,
    ///     and is used when tracing the end of the input.
    pub fn register_source_code(
        &mut self,
        token: Option<Token>,
        origin: Origin,
        source_code: &str,
    ) -> KeyRange {
        let len = u32::try_from(source_code.chars().count())
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let first = self.next_key;
        let limit = match first.checked_add(len) {
            // Key::dummy() is never handed out.
            Some(limit) if limit < u32::MAX => limit,
            _ => return KeyRange::empty(),
        };
        self.checkpoints.insert(
            first,
            Checkpoint {
                origin,
                content: source_code.to_string(),
            },
        );
        if token.is_none() {
            self.last_external_input = Some(first);
        }
        self.next_key = limit;
        KeyRange { first, limit }
    }

    /// Return a trace for the provided token.
    pub fn trace(&self, token: Token, cs_name_interner: &CsNameInterner) -> SourceCodeTrace {
        let value = match token.value() {
            Value::CommandRef(CommandRef::ControlSequence(cs_name, _)) => {
                format!["\\{}", cs_name_interner.resolve(cs_name).unwrap_or("")]
            }
            _ => token.char().map(String::from).unwrap_or_default(),
        };
        let key = token.trace_key().0;
        let checkpoint = if token.trace_key() == Key::dummy() || key >= self.next_key {
            None
        } else {
            self.checkpoints
                .range((Included(&0), Included(&key)))
                .next_back()
        };
        let Some((&first_key, checkpoint)) = checkpoint else {
            return SourceCodeTrace {
                origin: Origin::Unknown,
                line_content: value.clone(),
                line_number: 0,
                index: 0,
                value,
                token: Some(token),
            };
        };
        let char_offset = (key - first_key) as usize;
        let mut line_number = 1;
        let mut byte_line_start = 0;
        let mut char_line_start = 0;
        for (char_index, (byte_index, c)) in checkpoint.content.char_indices().enumerate() {
            if char_index == char_offset {
                break;
            }
            if c == '\n' {
                byte_line_start = byte_index + 1;
                char_line_start = char_index + 1;
                line_number += 1;
            }
        }
        let tail = &checkpoint.content[byte_line_start..];
        let line_content = match tail.split_once('\n') {
            None => tail,
            Some((line, _)) => line,
        };
        SourceCodeTrace {
            origin: checkpoint.origin.clone(),
            line_content: line_content.trim_end_matches('\r').to_string(),
            line_number,
            index: char_offset - char_line_start,
            value,
            token: Some(token),
        }
    }

    /// Return a trace pointing just after the last non-blank line of the last external input.
    pub fn trace_end_of_input(&self) -> SourceCodeTrace {
        let Some(checkpoint) = self
            .last_external_input
            .and_then(|key| self.checkpoints.get(&key))
        else {
            return SourceCodeTrace {
                origin: Origin::Unknown,
                line_content: String::new(),
                line_number: 0,
                index: 0,
                value: " ".to_string(),
                token: None,
            };
        };
        let mut line_number = 1;
        let mut last_non_empty = (1, "");
        for line in checkpoint.content.split('\n') {
            if !line.trim().is_empty() {
                last_non_empty = (line_number, line);
            }
            line_number += 1;
        }
        let line_content = last_non_empty.1.trim_end();
        SourceCodeTrace {
            origin: checkpoint.origin.clone(),
            line_content: line_content.to_string(),
            line_number: last_non_empty.0,
            index: line_content.chars().count(),
            value: " ".to_string(),
            token: None,
        }
    }
}
