//! Category codes.

use CatCode::*;

/// The 16 category codes of TeX.
///
/// The documentation of each variant gives a character that has that category code
///     in the default table used by Texpand.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CatCode {
    /// Starts a control sequence. Example: `\`.
    ///
    /// Only the lexer sees this code.
    Escape = 0,
    /// Opens a group. Example: `{`.
    BeginGroup = 1,
    /// Closes a group. Example: `}`.
    EndGroup = 2,
    /// Example: `$`.
    MathShift = 3,
    /// Example: `&`.
    AlignmentTab = 4,
    /// Ends a line of input. Example: `\r`.
    ///
    /// Behaves like [Space] except that it terminates comments
    ///     and that a blank line becomes the `\par` control sequence.
    /// Only the lexer sees this code.
    EndOfLine = 5,
    /// Introduces a macro parameter. Example: `#`.
    Parameter = 6,
    /// Example: `^`.
    /// Two equal superscript characters also begin caret notation in the lexer.
    Superscript = 7,
    /// Example: `_`.
    Subscript = 8,
    /// Dropped by the lexer. Example: ASCII null.
    Ignored = 9,
    /// Example: ` `.
    Space = 10,
    /// A character that can appear in a multi-character control sequence name.
    /// Examples: `[a-zA-Z]`.
    Letter = 11,
    /// Example: `@`.
    #[default]
    Other = 12,
    /// A single character that behaves like a control sequence. Example: `~`.
    Active = 13,
    /// Starts a comment that runs to the end of the line. Example: `%`.
    ///
    /// Only the lexer sees this code.
    Comment = 14,
    /// A character that is an error to input. Example: ASCII delete.
    ///
    /// Only the lexer sees this code.
    Invalid = 15,
}

impl TryFrom<u8> for CatCode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Escape,
            1 => BeginGroup,
            2 => EndGroup,
            3 => MathShift,
            4 => AlignmentTab,
            5 => EndOfLine,
            6 => Parameter,
            7 => Superscript,
            8 => Subscript,
            9 => Ignored,
            10 => Space,
            11 => Letter,
            12 => Other,
            13 => Active,
            14 => Comment,
            15 => Invalid,
            _ => return Err(()),
        })
    }
}

impl std::fmt::Display for CatCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} ({})", self, *self as u8)
    }
}

impl CatCode {
    /// Default category codes for all ASCII characters,
    ///     indexed by the character's code point.
    ///
    /// These are the INITEX defaults with the plainTeX changes applied.
    /// Characters outside ASCII default to [Other], except that alphabetic
    ///     characters default to [Letter]; see [CatCode::default_for].
    pub const PLAIN_TEX_DEFAULTS: [CatCode; 128] = plain_tex_defaults();

    /// Returns the default category code of a character.
    pub fn default_for(c: char) -> CatCode {
        match Self::PLAIN_TEX_DEFAULTS.get(c as usize) {
            Some(cat_code) => *cat_code,
            None if c.is_alphabetic() => Letter,
            None => Other,
        }
    }
}

const fn plain_tex_defaults() -> [CatCode; 128] {
    let mut table = [Other; 128];
    let mut i = 0_usize;
    while i < 128 {
        let b = i as u8;
        if b.is_ascii_alphabetic() {
            table[i] = Letter;
        }
        i += 1;
    }
    table[0] = Ignored;
    table[b'\t' as usize] = Space;
    table[b'\n' as usize] = EndOfLine;
    table[b'\r' as usize] = EndOfLine;
    table[b' ' as usize] = Space;
    table[b'#' as usize] = Parameter;
    table[b'$' as usize] = MathShift;
    table[b'%' as usize] = Comment;
    table[b'&' as usize] = AlignmentTab;
    table[b'\\' as usize] = Escape;
    table[b'^' as usize] = Superscript;
    table[b'_' as usize] = Subscript;
    table[b'{' as usize] = BeginGroup;
    table[b'}' as usize] = EndGroup;
    table[b'~' as usize] = Active;
    table[127] = Invalid;
    table
}
