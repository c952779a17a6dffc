//! Number parsing.
//!
//! The number may be octal, decimal, hexadecimal, cast from a character token, or read
//! from an internal variable. The full definition of a number in the TeX grammar
//! is given on page 269 of the TeXBook.

use crate::prelude as txl;
use crate::token::CatCode;
use crate::token::Value;
use crate::traits::*;
use crate::*;

impl<S: TexlangState> Parsable<S> for i32 {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        let (_, i): (token::Token, i32) = parse_number_internal(input)?;
        Ok(i)
    }
}

/// An integer in the range `[0, N)`.
#[derive(Debug, PartialEq, Eq, Default, Clone, Copy)]
pub struct Uint<const N: usize>(pub usize);

impl<S: TexlangState, const N: usize> Parsable<S> for Uint<N> {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        let (first_token, i): (token::Token, i32) = parse_number_internal(input)?;
        match usize::try_from(i) {
            Ok(u) if u < N => Ok(Uint(u)),
            _ => Err(parse::Error::new(
                input.vm(),
                format!["an integer in the range [0, {N})"],
                Some(first_token),
                "",
            )
            .with_got_override(format!["got the integer {i}"])
            .with_annotation_override("this is where the number started")
            .into()),
        }
    }
}

impl<S: TexlangState> Parsable<S> for char {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        let (first_token, i): (token::Token, i32) = parse_number_internal(input)?;
        match u32::try_from(i).ok().and_then(char::from_u32) {
            Some(c) => Ok(c),
            None => Err(parse::Error::new(
                input.vm(),
                "a character code (a Unicode scalar value)",
                Some(first_token),
                "",
            )
            .with_got_override(format!["got the integer {i}"])
            .with_annotation_override("this is where the number started")
            .into()),
        }
    }
}

impl<S: TexlangState> Parsable<S> for CatCode {
    fn parse_impl(input: &mut vm::ExpandedStream<S>) -> txl::Result<Self> {
        let (token, i): (token::Token, i32) = parse_number_internal(input)?;
        if let Ok(val_u8) = u8::try_from(i) {
            if let Ok(cat_code) = CatCode::try_from(val_u8) {
                return Ok(cat_code);
            }
        }
        Err(parse::Error::new(
            input.vm(),
            "a category code number (an integer in the range [0, 15])",
            Some(token),
            "",
        )
        .with_got_override(format!["got the integer {i}"])
        .with_annotation_override("this is where the number started")
        .into())
    }
}

const GUIDANCE_BEGINNING: &str =
    "a number begins with zero or more minus signs followed by one of the following:
- A decimal digit (0-9), which begins a decimal number.
- The character ', which indicates the beginning of an octal number
- The character \", which indicates the beginning of a hexadecimal number
- The character `, followed by a character token. The character is converted into its Unicode code point.
- A command that references an integer variable, like \\count 1.
";

fn parse_number_internal<S: TexlangState>(
    stream: &mut vm::ExpandedStream<S>,
) -> txl::Result<(token::Token, i32)> {
    let sign = parse_optional_signs(stream)?;
    let first_token = match stream.next()? {
        Some(token) => token,
        None => {
            return Err(parse::Error::new(
                stream.vm(),
                "the beginning of a number",
                None,
                GUIDANCE_BEGINNING,
            )
            .into())
        }
    };
    let constant = match first_token.value() {
        Value::Other(c @ '0'..='9') => Some(parse_constant::<S, 10>(stream, c as i32 - '0' as i32)?),
        Value::Other('\'') => Some(parse_constant::<S, 8>(stream, 0)?),
        Value::Other('"') => Some(parse_constant::<S, 16>(stream, 0)?),
        Value::Other('`') => Some(parse_character(stream)?),
        _ => None,
    };
    let result: i32 = match (constant, first_token.value()) {
        // Only constants may be terminated by a space. Looking for a space after an internal
        // integer would expand the token that follows it.
        (Some(constant), _) => {
            get_optional_element![stream, Value::Space(_) => ()];
            constant
        }
        (None, Value::CommandRef(command_ref)) => {
            match stream.commands_map().get_command(&command_ref) {
                Some(command::Command::Variable(cmd)) => {
                    let cmd = cmd.clone();
                    match cmd.value(first_token, stream)? {
                        context::Value::Int(i) => i,
                        context::Value::CatCode(c) => c as i32,
                        _ => {
                            return Err(parse::Error::new(
                                stream.vm(),
                                "the beginning of a number",
                                Some(first_token),
                                GUIDANCE_BEGINNING,
                            )
                            .with_annotation_override("non-integer variable")
                            .into());
                        }
                    }
                }
                cmd => {
                    let annotation = match cmd {
                        None => "undefined control sequence".to_string(),
                        Some(cmd) => format!["control sequence referencing {cmd}"],
                    };
                    stream.back(first_token);
                    return Err(parse::Error::new(
                        stream.vm(),
                        "the beginning of a number",
                        Some(first_token),
                        GUIDANCE_BEGINNING,
                    )
                    .with_annotation_override(annotation)
                    .into());
                }
            }
        }
        _ => {
            stream.back(first_token);
            return Err(parse::Error::new(
                stream.vm(),
                "the beginning of a number",
                Some(first_token),
                GUIDANCE_BEGINNING,
            )
            .into());
        }
    };
    let result = match sign {
        None => result,
        // The only i32 that is not safe to multiply by -1 is i32::MIN.
        // Experimentally we observe in this case that TeX wraps and the result
        // is i32::MIN again.
        Some(_) => result.wrapping_mul(-1),
    };
    Ok((first_token, result))
}

/// Parses optional signs and spaces.
///
/// If the combination of the signs is positive, [None] is returned.
/// Otherwise, the Token corresponding to the last negative sign is returned.
fn parse_optional_signs<S: TexlangState>(
    stream: &mut vm::ExpandedStream<S>,
) -> txl::Result<Option<token::Token>> {
    let mut result = None;
    while let Some((sign, token)) = get_optional_element_with_token![
        stream,
        Value::Other('+') => true,
        Value::Other('-') => false,
        Value::Space(_) => true,
    ] {
        result = match (result, sign) {
            (None, false) => Some(token),
            (Some(_), false) => None,
            (result, true) => result,
        };
    }
    Ok(result)
}

const CHARACTER_GUIDANCE: &str =
    r"a character is a character token or single-character control sequence like \a";

// TeX.2021.442
fn parse_character<S: TexlangState>(input: &mut vm::ExpandedStream<S>) -> txl::Result<i32> {
    let Some(token) = input.unexpanded().next()? else {
        return Err(parse::Error::new(input.vm(), "a character", None, CHARACTER_GUIDANCE).into());
    };
    let c = match token.value() {
        Value::CommandRef(token::CommandRef::ControlSequence(cs_name, _)) => {
            let name = input.vm().cs_name_interner().resolve(cs_name).unwrap_or("");
            let mut iter = name.chars();
            match (iter.next(), iter.count()) {
                (Some(c), 0) => c,
                _ => {
                    return Err(parse::Error::new(
                        input.vm(),
                        "a character",
                        Some(token),
                        CHARACTER_GUIDANCE,
                    )
                    .into());
                }
            }
        }
        Value::CommandRef(token::CommandRef::ActiveCharacter(c, _)) => c,
        _ => match token.char() {
            Some(c) => c,
            None => {
                return Err(parse::Error::new(
                    input.vm(),
                    "a character",
                    Some(token),
                    CHARACTER_GUIDANCE,
                )
                .into())
            }
        },
    };
    Ok(c as i32)
}

fn parse_constant<S: TexlangState, const RADIX: i32>(
    stream: &mut vm::ExpandedStream<S>,
    mut result: i32,
) -> txl::Result<i32> {
    let mut started = RADIX == 10;
    loop {
        let next = match stream.next()? {
            None => break,
            Some(next) => next,
        };
        let lsd_or = match next.value() {
            token::Value::Other(c) => {
                let d = (c as u32).wrapping_sub('0' as u32);
                if d < 10 && d < (RADIX as u32) {
                    Some(d as i32)
                } else if RADIX == 16 {
                    let d = (c as u32).wrapping_sub('A' as u32);
                    if d < 6 {
                        Some(d as i32 + 10)
                    } else {
                        None
                    }
                } else {
                    None
                }
            }
            token::Value::Letter(c) => {
                let d = (c as u32).wrapping_sub('A' as u32);
                if RADIX == 16 && d < 6 {
                    Some(d as i32 + 10)
                } else {
                    None
                }
            }
            _ => None,
        };
        let lsd = match lsd_or {
            None => {
                stream.back(next);
                break;
            }
            Some(lsd) => lsd,
        };
        started = true;
        result = match add_lsd::<RADIX>(result, lsd) {
            Some(n) => n,
            None => return Err(add_lsd_error::<S, RADIX>(stream.vm(), next, result, lsd).into()),
        }
    }
    if !started {
        let (expected, guidance) = match RADIX {
            8 => {
                ("an octal digit",
                "an octal digit is a token with value 0-7 and category other")
            },
            _ => {
                ("a hexadecimal digit",
                "a hexadecimal digit is either:\n- A character token with value 0-9 and category other, or\n- A character token with value A-F and category letter or other")
            }
        };
        let got = stream.peek()?.copied();
        return Err(parse::Error::new(stream.vm(), expected, got, guidance).into());
    }
    Ok(result)
}

fn add_lsd<const RADIX: i32>(n: i32, lsd: i32) -> Option<i32> {
    match n.checked_mul(RADIX) {
        None => None,
        Some(n) => n.checked_add(lsd),
    }
}

fn add_lsd_error<S, const RADIX: i32>(
    vm: &vm::VM<S>,
    token: token::Token,
    n: i32,
    lsd: i32,
) -> parse::Error {
    let (got, range) = match RADIX {
        8 => (
            format!["got '{n:o}{lsd:o}"],
            format!["'{:o}, '{:o}", 0, i32::MAX],
        ),
        16 => (
            format!["got \"{n:X}{lsd:X}"],
            format!["\"{:X}, \"{:X}", 0, i32::MAX],
        ),
        _ => (
            format!["got {n}{lsd}"],
            format!["{}, {}", 0, i32::MAX],
        ),
    };
    parse::Error::new(
        vm,
        format!["a number in the range [{range}]"],
        Some(token),
        "",
    )
    .with_got_override(got)
    .with_annotation_override("this digit makes the number too big")
}
