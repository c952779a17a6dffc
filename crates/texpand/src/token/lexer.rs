//! The lexer, which turns source code into tokens.
//!
//! The lexer is "just in time": it only produces the next token when that token is requested.
//! Lexing is controlled by category codes which can change at runtime as a result of
//!     executing earlier tokens.
//! For example, in
//! ```tex
//! \catcode`\A=10 AB
//! ```
//! the `A` must be lexed after `\catcode` has run, at which point it is a space
//!     and is skipped.
//!
//! Source code is processed one line at a time.
//! When a line is read, trailing spaces are removed and the current end-of-line character
//!     (the `\endlinechar`) is appended.
//! Caret notation (`^^M`, `^^0d`, `^^^^00e9`) is resolved in the line buffer when it is
//!     encountered, and the resulting character is lexed with its own category code.

use crate::token::trace;
use crate::token::{CatCode, CsName, CsNameInterner, Namespace, Token, Value};

/// Errors that the lexer can raise.
///
/// These are converted to [TexErrors](crate::error::TexError) by the VM,
///     which has access to the tracer.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Error {
    InvalidCharacter(char, trace::Key),
    EmptyControlSequence(trace::Key),
    MalformedCaretNotation { partial: String, key: trace::Key },
}

/// Lexer configuration that may change while lexing.
pub trait Config {
    /// Returns the current category code of a character.
    fn cat_code(&self, c: char) -> CatCode;

    /// Returns the character appended to each line, if any.
    fn end_line_char(&self) -> Option<char>;

    /// Returns the namespace control sequences and active characters are created in.
    fn namespace(&self) -> Namespace {
        Namespace::ROOT
    }
}

impl Config for std::collections::HashMap<char, CatCode> {
    fn cat_code(&self, c: char) -> CatCode {
        self.get(&c).copied().unwrap_or_else(|| CatCode::default_for(c))
    }

    fn end_line_char(&self) -> Option<char> {
        Some('\r')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    NewLine,
    MidLine,
    SkipBlanks,
}

/// The Texpand lexer.
pub struct Lexer {
    source_code: String,
    next_line_byte: usize,
    next_line_char: usize,
    // Each character of the current line with its character offset in the source code.
    line: Vec<(char, usize)>,
    pos: usize,
    state: State,
    key_range: trace::KeyRange,
    end_after_current_line: bool,
    // Control sequence names are read into a shared buffer to avoid allocating for each one.
    buffer: String,
}

impl Lexer {
    pub fn new(source_code: String, key_range: trace::KeyRange) -> Lexer {
        Lexer {
            source_code,
            next_line_byte: 0,
            next_line_char: 0,
            line: Vec::new(),
            pos: 0,
            state: State::NewLine,
            key_range,
            end_after_current_line: false,
            buffer: Default::default(),
        }
    }

    /// Stop reading after the current line, as `\endinput` does.
    pub fn end_after_current_line(&mut self) {
        self.end_after_current_line = true;
    }

    /// Returns whether the lexer will produce no more tokens without reading a new line.
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.line.len()
            && (self.end_after_current_line || self.next_line_byte >= self.source_code.len())
    }

    fn load_line<C: Config>(&mut self, config: &C) -> bool {
        if self.end_after_current_line || self.next_line_byte >= self.source_code.len() {
            return false;
        }
        let rest = &self.source_code[self.next_line_byte..];
        let (raw_line, consumed_bytes) = match rest.find('\n') {
            None => (rest, rest.len()),
            Some(i) => (&rest[..i], i + 1),
        };
        let raw_char_count = raw_line.chars().count();
        let content = raw_line.trim_end_matches('\r').trim_end_matches(' ');
        self.line.clear();
        self.line.extend(
            content
                .chars()
                .enumerate()
                .map(|(i, c)| (c, self.next_line_char + i)),
        );
        if let Some(c) = config.end_line_char() {
            self.line.push((c, self.next_line_char + raw_char_count));
        }
        self.next_line_byte += consumed_bytes;
        self.next_line_char += raw_char_count + 1;
        self.pos = 0;
        self.state = State::NewLine;
        true
    }

    pub(crate) fn next<C: Config>(
        &mut self,
        config: &C,
        cs_name_interner: &mut CsNameInterner,
    ) -> Result<Option<Token>, Error> {
        loop {
            let Some(&(c, offset)) = self.line.get(self.pos) else {
                if !self.load_line(config) {
                    return Ok(None);
                }
                continue;
            };
            let cat_code = config.cat_code(c);
            if cat_code == CatCode::Superscript && self.apply_caret_notation(self.pos)? {
                continue;
            }
            let key = self.key_range.key(offset);
            self.pos += 1;
            let token = match cat_code {
                CatCode::Escape => {
                    let name = self.read_control_sequence(config, cs_name_interner, key)?;
                    Token::new_control_sequence(name, config.namespace(), key)
                }
                CatCode::EndOfLine => {
                    self.pos = self.line.len();
                    match self.state {
                        State::NewLine => Token::new_control_sequence(
                            cs_name_interner.get_or_intern("par"),
                            config.namespace(),
                            key,
                        ),
                        State::MidLine => Token::new_space(' ', key),
                        State::SkipBlanks => continue,
                    }
                }
                CatCode::Space => match self.state {
                    State::MidLine => {
                        self.state = State::SkipBlanks;
                        Token::new_space(' ', key)
                    }
                    State::NewLine | State::SkipBlanks => continue,
                },
                CatCode::Comment => {
                    self.pos = self.line.len();
                    continue;
                }
                CatCode::Ignored => continue,
                CatCode::Invalid => return Err(Error::InvalidCharacter(c, key)),
                CatCode::Active => {
                    self.state = State::MidLine;
                    Token::new_active_character(c, config.namespace(), key)
                }
                _ => {
                    self.state = State::MidLine;
                    match Value::new(c, cat_code) {
                        None => continue,
                        Some(value) => Token::new_from_value(value, key),
                    }
                }
            };
            return Ok(Some(token));
        }
    }

    fn read_control_sequence<C: Config>(
        &mut self,
        config: &C,
        cs_name_interner: &mut CsNameInterner,
        escape_key: trace::Key,
    ) -> Result<CsName, Error> {
        self.buffer.clear();
        let first = loop {
            let Some(&(c, _)) = self.line.get(self.pos) else {
                return Err(Error::EmptyControlSequence(escape_key));
            };
            if config.cat_code(c) == CatCode::Superscript && self.apply_caret_notation(self.pos)? {
                continue;
            }
            break c;
        };
        self.pos += 1;
        self.buffer.push(first);
        match config.cat_code(first) {
            CatCode::Letter => {
                while let Some(&(c, _)) = self.line.get(self.pos) {
                    match config.cat_code(c) {
                        CatCode::Letter => {
                            self.buffer.push(c);
                            self.pos += 1;
                        }
                        CatCode::Superscript if self.apply_caret_notation(self.pos)? => {}
                        _ => break,
                    }
                }
                self.state = State::SkipBlanks;
            }
            CatCode::Space => self.state = State::SkipBlanks,
            _ => self.state = State::MidLine,
        }
        Ok(cs_name_interner.get_or_intern(&self.buffer))
    }

    /// Resolves caret notation starting at the provided position of the line buffer.
    ///
    /// Returns whether the line buffer was changed.
    fn apply_caret_notation(&mut self, pos: usize) -> Result<bool, Error> {
        let Some(&(caret, offset)) = self.line.get(pos) else {
            return Ok(false);
        };
        let char_at = |i: usize| self.line.get(pos + i).map(|(c, _)| *c);
        if char_at(1) != Some(caret) {
            return Ok(false);
        }
        if char_at(2) == Some(caret) && char_at(3) == Some(caret) {
            let digits: String = (4..8)
                .map_while(char_at)
                .take_while(is_lowercase_hex_digit)
                .collect();
            let c = if digits.len() == 4 {
                u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
            } else {
                None
            };
            let Some(c) = c else {
                return Err(Error::MalformedCaretNotation {
                    partial: format!("{caret}{caret}{caret}{caret}{digits}"),
                    key: self.key_range.key(offset),
                });
            };
            self.line.splice(pos..pos + 8, [(c, offset)]);
            return Ok(true);
        }
        let (Some(c3), c4) = (char_at(2), char_at(3)) else {
            // At the end of the line the characters are not transformed.
            return Ok(false);
        };
        if let Some(c4) = c4 {
            if is_lowercase_hex_digit(&c3) && is_lowercase_hex_digit(&c4) {
                let mut digits = String::with_capacity(2);
                digits.push(c3);
                digits.push(c4);
                if let Some(c) = u32::from_str_radix(&digits, 16)
                    .ok()
                    .and_then(char::from_u32)
                {
                    self.line.splice(pos..pos + 4, [(c, offset)]);
                    return Ok(true);
                }
            }
        }
        let Ok(u) = u8::try_from(c3 as u32) else {
            return Ok(false);
        };
        let c = match u {
            0x00..=0x3F => u + 0x40,
            0x40..=0x7F => u - 0x40,
            _ => return Ok(false),
        };
        self.line.splice(pos..pos + 3, [(c as char, offset)]);
        Ok(true)
    }
}

fn is_lowercase_hex_digit(c: &char) -> bool {
    matches!(c, '0'..='9' | 'a'..='f')
}
