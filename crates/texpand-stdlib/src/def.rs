//! Primitives for creating user-defined macros (`\def` and friends).

use crate::prefix;
use texpand::parse;
use texpand::prelude as txl;
use texpand::texmacro::*;
use texpand::token::Token;
use texpand::token::Value;
use texpand::traits::*;
use texpand::*;
use texpand_stdext::algorithms::substringsearch::Matcher;
use texpand_stdext::collections::groupingmap;

pub const DEF_DOC: &str = "Define a custom macro";
pub const GDEF_DOC: &str = "Define a custom macro in the global scope";
pub const EDEF_DOC: &str = "Define a custom macro whose replacement text is expanded first";

/// Get the `\def` command.
pub fn get_def<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(def_primitive_fn)
        .with_tag(def_tag())
        .with_doc(DEF_DOC)
}

/// Get the `\gdef` command.
pub fn get_gdef<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(gdef_primitive_fn)
        .with_tag(def_tag())
        .with_doc(GDEF_DOC)
}

/// Get the `\edef` command.
pub fn get_edef<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(edef_primitive_fn)
        .with_tag(def_tag())
        .with_doc(EDEF_DOC)
}

static DEF_TAG: command::StaticTag = command::StaticTag::new();

pub fn def_tag() -> command::Tag {
    DEF_TAG.get()
}

fn def_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    parse_and_set_macro(def_token, input, false, false)
}

fn gdef_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    parse_and_set_macro(def_token, input, true, false)
}

fn edef_primitive_fn<S: HasComponent<prefix::Component>>(
    def_token: Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    parse_and_set_macro(def_token, input, false, true)
}

fn parse_and_set_macro<S: HasComponent<prefix::Component>>(
    _: Token,
    input: &mut vm::ExecutionInput<S>,
    set_globally_override: bool,
    expand_replacement: bool,
) -> txl::Result<()> {
    let mut scope = input.state_mut().component_mut().read_and_reset_global();
    if set_globally_override {
        scope = groupingmap::Scope::Global;
    }
    let name = token::CommandRef::parse(input)?;
    let (prefix, raw_parameters, replacement_end_token) =
        parse_prefix_and_parameters(input.unexpanded())?;
    let parameters: Vec<Parameter> = raw_parameters
        .into_iter()
        .map(|a| match a {
            RawParameter::Undelimited => Parameter::Undelimited,
            RawParameter::Delimited(vec) => {
                match Matcher::new(vec.iter().map(Token::value).collect()) {
                    None => Parameter::Undelimited,
                    Some(matcher) => Parameter::Delimited(matcher),
                }
            }
        })
        .collect();
    let mut raw_replacement = input.checkout_token_buffer();
    if expand_replacement {
        parse::finish_parsing_balanced_tokens(input, &mut raw_replacement)?;
    } else {
        parse::finish_parsing_balanced_tokens(input.unexpanded(), &mut raw_replacement)?;
    }
    let replacement = parse_replacement_text(
        input.vm(),
        &raw_replacement,
        replacement_end_token,
        parameters.len(),
    );
    input.return_token_buffer(raw_replacement);
    let user_defined_macro = Macro::new(prefix, parameters, replacement?);
    input
        .commands_map_mut()
        .insert_macro(name, user_defined_macro, scope);
    Ok(())
}

enum RawParameter {
    Undelimited,
    Delimited(Vec<Token>),
}

impl RawParameter {
    fn push(&mut self, t: Token) {
        match self {
            RawParameter::Undelimited => {
                *self = RawParameter::Delimited(vec![t]);
            }
            RawParameter::Delimited(vec) => {
                vec.push(t);
            }
        }
    }
}

fn char_to_parameter_index(c: char) -> Option<usize> {
    match c {
        '1'..='9' => Some(c as usize - '1' as usize),
        _ => None,
    }
}

const PARAMETER_NOTE: &str = "a parameter token must be followed by a single digit number, another parameter token, or a closing brace {";

fn parse_prefix_and_parameters<S: TexlangState>(
    input: &mut vm::UnexpandedStream<S>,
) -> txl::Result<(Vec<Token>, Vec<RawParameter>, Option<Token>)> {
    let mut prefix = Vec::new();
    let mut parameters: Vec<RawParameter> = Vec::new();
    let mut replacement_end_token = None;

    while let Some(token) = input.next()? {
        match token.value() {
            Value::BeginGroup(_) => {
                return Ok((prefix, parameters, replacement_end_token));
            }
            Value::EndGroup(_) => {
                return Err(error::SimpleTokenError::new(
                    input.vm(),
                    token,
                    "unexpected end group token while parsing the parameter text of a macro",
                )
                .into());
            }
            Value::Parameter(_) => {
                let parameter_token = match input.next()? {
                    None => {
                        return Err(error::SimpleEndOfInputError::new(
                            input.vm(),
                            "unexpected end of input while reading the token after a parameter token",
                        )
                        .with_note(PARAMETER_NOTE)
                        .into());
                    }
                    Some(token) => token,
                };
                match parameter_token.value() {
                    Value::BeginGroup(_) => {
                        // The #{ rule: the brace ends the parameter text and is also
                        // appended to the replacement text.
                        replacement_end_token = Some(parameter_token);
                        match parameters.last_mut() {
                            None => {
                                prefix.push(parameter_token);
                            }
                            Some(delimiter) => {
                                delimiter.push(parameter_token);
                            }
                        }
                        return Ok((prefix, parameters, replacement_end_token));
                    }
                    Value::CommandRef(token::CommandRef::ControlSequence(..)) => {
                        return Err(error::SimpleTokenError::new(
                            input.vm(),
                            parameter_token,
                            "unexpected control sequence after a parameter token",
                        )
                        .with_note(PARAMETER_NOTE)
                        .into());
                    }
                    _ => {
                        let parameter_index =
                            match parameter_token.char().and_then(char_to_parameter_index) {
                                None => {
                                    return Err(error::SimpleTokenError::new(
                                        input.vm(),
                                        parameter_token,
                                        "unexpected character after a parameter token",
                                    )
                                    .with_note(PARAMETER_NOTE)
                                    .into());
                                }
                                Some(n) => n,
                            };
                        if parameter_index != parameters.len() {
                            return Err(error::SimpleTokenError::new(
                                input.vm(),
                                parameter_token,
                                format!["unexpected parameter number {}", parameter_index + 1],
                            )
                            .with_note(format![
                                "this macro has {} parameter(s) so far, so parameter number #{} was expected",
                                parameters.len(),
                                parameters.len() + 1
                            ])
                            .into());
                        }
                        parameters.push(RawParameter::Undelimited);
                    }
                }
            }
            _ => match parameters.last_mut() {
                None => {
                    prefix.push(token);
                }
                Some(parameter) => {
                    parameter.push(token);
                }
            },
        }
    }
    Err(error::SimpleEndOfInputError::new(
        input.vm(),
        "unexpected end of input while reading the parameter text of a macro",
    )
    .with_note("the parameter text of a macro must end with an opening brace { or another token with catcode 1 (begin group)")
    .into())
}

/// Builds the replacement text from the balanced tokens after the parameter text.
///
/// The returned token lists are reversed, as [Replacement::Tokens] requires.
fn parse_replacement_text<S>(
    vm: &vm::VM<S>,
    tokens: &[Token],
    opt_final_token: Option<Token>,
    num_parameters: usize,
) -> txl::Result<Vec<Replacement>> {
    let mut result = vec![];
    let push = |result: &mut Vec<Replacement>, token| match result.last_mut() {
        Some(Replacement::Tokens(tokens)) => {
            tokens.push(token);
        }
        _ => {
            result.push(Replacement::Tokens(vec![token]));
        }
    };

    let mut iter = tokens.iter().copied();
    while let Some(token) = iter.next() {
        if !matches!(token.value(), Value::Parameter(_)) {
            push(&mut result, token);
            continue;
        }
        let parameter_token = match iter.next() {
            None => {
                return Err(error::SimpleTokenError::new(
                    vm,
                    token,
                    "unexpected end of the replacement text while reading a parameter number",
                )
                .with_note("expected a number between 1 and 9 inclusive")
                .into());
            }
            Some(token) => token,
        };
        if let Value::Parameter(_) = parameter_token.value() {
            push(&mut result, parameter_token);
            continue;
        }
        let parameter_index = match parameter_token.char().and_then(char_to_parameter_index) {
            None => {
                return Err(error::SimpleTokenError::new(
                    vm,
                    parameter_token,
                    "unexpected token while reading a parameter number",
                )
                .with_note("expected a number between 1 and 9 inclusive")
                .into())
            }
            Some(n) => n,
        };
        if parameter_index >= num_parameters {
            let note = match num_parameters {
                0 => "this macro has no parameters".to_string(),
                1 => "this macro has only 1 parameter".to_string(),
                n => format!["this macro has only {n} parameters"],
            };
            return Err(error::SimpleTokenError::new(
                vm,
                parameter_token,
                format!["reference to parameter {} is out of range", parameter_index + 1],
            )
            .with_note(note)
            .into());
        }
        result.push(Replacement::Parameter(parameter_index));
    }
    if let Some(final_token) = opt_final_token {
        push(&mut result, final_token);
    }
    for r in result.iter_mut() {
        if let Replacement::Tokens(tokens) = r {
            tokens.reverse();
        }
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expansion;
    use crate::testutil::*;
    use std::collections::HashMap;

    fn built_in_commands() -> HashMap<&'static str, command::BuiltIn<State>> {
        HashMap::from([
            ("def", get_def()),
            ("edef", get_edef()),
            ("gdef", get_gdef()),
            ("global", prefix::get_global()),
            ("noexpand", expansion::get_noexpand()),
            ("assertGlobalIsFalse", prefix::get_assert_global_is_false()),
        ])
    }

    test_suite![
        expansion_equality_tests(
            (def_parsed_successfully, r"\def\A{abc}", ""),
            (output_is_correct, r"\def\A{abc}\A", "abc"),
            (output_twice, r"\def\A{abc}\A\A", "abcabc"),
            (parse_one_parameter, r"\def\A#1{a-#1-b}", ""),
            (one_undelimited_parameter, r"\def\A#1{a-#1-b}\A1", "a-1-b"),
            (
                one_undelimited_parameter_multiple_times,
                r"\def\A#1{#1 #1 #1}\A1",
                "1 1 1"
            ),
            (
                one_undelimited_parameter_multiple_tokens,
                r"\def\A#1{a-#1-b}\A{123}",
                "a-123-b"
            ),
            (
                two_undelimited_parameters,
                r"\def\A#1#2{#2-#1}\A56",
                "6-5"
            ),
            (
                two_undelimited_parameters_multiple_token_inputs,
                r"\def\A#1#2{#2-#1}\A{abc}{xyz}",
                "xyz-abc"
            ),
            (
                consume_prefix_correctly,
                r"\def\A fgh{567}\A fghi",
                "567i"
            ),
            (
                one_undelimited_parameter_with_prefix,
                r"\def\A abc#1{y#1z}\A abcdefg",
                "ydzefg"
            ),
            (
                one_delimited_parameter,
                r"\def\A #1xxx{y#1z}\A abcxxx",
                "yabcz"
            ),
            (
                one_delimited_parameter_empty,
                r"\def\A #1xxx{y#1z}\A xxx",
                "yz"
            ),
            (
                one_delimited_parameter_with_scope,
                r"\def\A #1xxx{#1}\A abc{123xxx}xxx",
                "abc{123xxx}"
            ),
            (
                one_delimited_parameter_with_prefix,
                r"\def\A a#1c{x#1y}\A abcdef",
                "xbydef"
            ),
            (
                two_delimited_parameters_with_prefix,
                r"\def\A a#1c#2e{x#2y#1z}\A abcdef",
                "xdybzf"
            ),
            (
                one_delimited_parameter_grouped_value,
                r"\def\A #1c{x#1y}\A {Hello}c",
                "xHelloy"
            ),
            (
                parameter_brace_special_case,
                r"\def\A #{Mint}\A{Hello}",
                "Mint{Hello}"
            ),
            (
                grouping,
                r"\def\A{Hello}\A{\def\A{World}\A}\A",
                r"HelloWorldHello"
            ),
            (
                grouping_global,
                r"\def\A{Hello}\A{\global\def\A{World}\A}\A",
                r"HelloWorldWorld"
            ),
            (
                gdef,
                r"\def\A{Hello}\A{\gdef\A{World}\A}\A",
                r"HelloWorldWorld"
            ),
            (
                gdef_global,
                r"\def\A{Hello}\A{\global\gdef\A{World}\A}\A",
                r"HelloWorldWorld"
            ),
            (
                def_takes_global,
                r"\global\def\A{Hello}\assertGlobalIsFalse",
                r""
            ),
            (
                gdef_takes_global,
                r"\global\gdef\A{Hello}\assertGlobalIsFalse",
                r""
            ),
            (
                edef_takes_global,
                r"\global\edef\A{Hello}\assertGlobalIsFalse",
                r""
            ),
            (
                texbook_exercise_20_1,
                r"\def\mustnt{I must not talk in class.}%
                  \def\five{\mustnt\mustnt\mustnt\mustnt\mustnt}%
                  \def\twenty{\five\five\five\five}%
                  \def\punishment{\twenty\twenty\twenty\twenty\twenty}%
                  \punishment",
                "I must not talk in class.".repeat(100)
            ),
            (
                texbook_exercise_20_2,
                r"\def\a{\b}%
                  \def\b{A\def\a{B\def\a{C\def\a{\b}}}}%
                  \def\puzzle{\a\a\a\a\a}%
                  \puzzle",
                "ABCAB"
            ),
            (
                texbook_exercise_20_3_part_1,
                r"\def\row#1{(#1_1,#1_n)}\row{x}",
                r"(x_1,x_n)"
            ),
            (
                texbook_exercise_20_3_part_2,
                r"\def\row#1{(#1_1,#1_n)}\row{{x}}",
                r"({x}_1,{x}_n)"
            ),
            (
                texbook_exercise_20_5,
                r"\def\a#1{\def\b##1{##1#1}}\a!\b{Hello}",
                "Hello!"
            ),
            (
                double_parameter_token,
                r"\def\a{##}\a",
                "#"
            ),
            (edef_expands_macros, r"\def\a{x}\edef\b{\a\a}\def\a{y}\b", "xx"),
            (
                edef_respects_noexpand,
                r"\def\a{x}\edef\b{\a\noexpand\a}\def\a{y}\b",
                "xy"
            ),
            (
                edef_with_parameters,
                r"\def\a{x}\edef\b#1{#1\a#1}\b1",
                "1x1"
            ),
            (
                edef_nested_braces,
                r"\def\a{x}\edef\b{{\a}}\b",
                "{x}"
            ),
        ),
        failure_tests(
            (end_of_input_scanning_target, r"\def"),
            (end_of_input_scanning_argument_text, r"\def\A"),
            (end_of_input_scanning_replacement, r"\def\A{"),
            (end_of_input_scanning_nested_replacement, r"\def\A{{}"),
            (end_of_input_reading_parameter_number, r"\def\A#"),
            (unexpected_token_target, r"\def a"),
            (unexpected_token_argument, r"\def\A }"),
            (unexpected_token_parameter_number, r"\def\A #a}"),
            (unexpected_control_sequence_parameter_number, r"\def\A #\B{}"),
            (unexpected_parameter_number_in_argument, r"\def\A #2{}"),
            (unexpected_parameter_token_in_replacement, r"\def\A #1{#a}"),
            (unexpected_parameter_number_in_replacement, r"\def\A {#2}"),
            (
                unexpected_parameter_number_in_replacement_2,
                r"\def\A #1{#2}"
            ),
            (prefix_mismatch, r"\def\A abc{d}\A abd"),
            (end_of_input_reading_delimited_argument, r"\def\A #1x{d}\A abc"),
            (edef_undefined_command, r"\edef\A{\undefined}"),
        ),
        error_category_tests(
            (prefix_mismatch_category, r"\def\A abc{d}\A abd", error::Category::Syntax),
            (
                edef_undefined_command_category,
                r"\edef\A{\undefined}",
                error::Category::UndefinedControlSequence
            ),
        ),
    ];
}
