//! Implementation of TeX user defined macros.

use crate::error;
use crate::parse;
use crate::prelude as txl;
use crate::token;
use crate::token::Token;
use crate::token::Value;
use crate::traits::*;
use crate::vm;
use colored::Colorize;
use texpand_stdext::algorithms::substringsearch::Matcher;

/// A TeX Macro.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    prefix: Vec<Token>,
    parameters: Vec<Parameter>,
    replacements: Vec<Replacement>,
}

/// A token list or parameter in a replacement text.
#[derive(Debug, Clone, PartialEq)]
pub enum Replacement {
    /// A list of tokens.
    ///
    /// The tokens are stored in reverse order, so that they can be pushed onto the input directly.
    Tokens(Vec<Token>),

    /// A parameter.
    ///
    /// In order to be valid, the parameters index must be less than the number
    /// of parameters in the macro.
    Parameter(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Parameter {
    Undelimited,
    Delimited(Matcher<Value>),
}

impl Macro {
    /// Create a new macro.
    pub fn new(
        prefix: Vec<Token>,
        parameters: Vec<Parameter>,
        replacement_text: Vec<Replacement>,
    ) -> Macro {
        Macro {
            prefix,
            parameters,
            replacements: replacement_text,
        }
    }

    pub fn prefix(&self) -> &[Token] {
        &self.prefix
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn call<S: TexlangState>(
        &self,
        token: Token,
        input: &mut vm::ExpansionInput<S>,
    ) -> txl::Result<()> {
        remove_tokens_from_stream(token, &self.prefix, input.unexpanded())?;
        let mut argument_indices: Vec<(usize, usize)> = Default::default();
        let mut argument_tokens = input.checkout_token_buffer();
        for (i, parameter) in self.parameters.iter().enumerate() {
            let start_index = argument_tokens.len();
            let trim_outer_braces = parameter.parse_argument(input, i, &mut argument_tokens)?;
            let element = match trim_outer_braces {
                true => (start_index + 1, argument_tokens.len() - 1),
                false => (start_index, argument_tokens.len()),
            };
            argument_indices.push(element);
        }

        let arguments: Vec<&[Token]> = argument_indices
            .iter()
            .map(|(i, j)| &argument_tokens[*i..*j])
            .collect();

        let result = input.expansions_mut();
        let num_tokens = Macro::perform_replacement(&self.replacements, &arguments, result);

        // To keep the borrow checker happy we need to downgrade result to a shared reference.
        let result = input.expansions();
        S::post_macro_expansion_hook(
            token,
            input,
            self,
            &arguments,
            &result[result.len() - num_tokens..result.len()],
        );

        input.return_token_buffer(argument_tokens);
        Ok(())
    }

    fn perform_replacement(
        replacements: &[Replacement],
        arguments: &[&[Token]],
        result: &mut Vec<Token>,
    ) -> usize {
        let mut output_size = 0;
        for replacement in replacements.iter() {
            output_size += match replacement {
                Replacement::Tokens(tokens) => tokens.len(),
                Replacement::Parameter(i) => arguments.get(*i).map_or(0, |a| a.len()),
            };
        }
        result.reserve(output_size);
        for replacement in replacements.iter().rev() {
            match replacement {
                Replacement::Tokens(tokens) => {
                    result.extend(tokens);
                }
                Replacement::Parameter(i) => {
                    if let Some(argument) = arguments.get(*i) {
                        result.extend(argument.iter().rev().copied());
                    }
                }
            }
        }
        output_size
    }
}

impl Parameter {
    /// Parses the argument for this parameter and appends it to the result.
    ///
    /// Returns whether the argument is surrounded by braces that should be removed.
    pub fn parse_argument<S: TexlangState>(
        &self,
        input: &mut vm::ExpansionInput<S>,
        index: usize,
        result: &mut Vec<Token>,
    ) -> txl::Result<bool> {
        match self {
            Parameter::Undelimited => {
                Parameter::parse_undelimited_argument(input, index + 1, result)?;
                Ok(false)
            }
            Parameter::Delimited(matcher_factory) => Parameter::parse_delimited_argument(
                input.unexpanded(),
                matcher_factory,
                index + 1,
                result,
            ),
        }
    }

    fn parse_delimited_argument<S: TexlangState>(
        stream: &mut vm::UnexpandedStream<S>,
        matcher_factory: &Matcher<Value>,
        param_num: usize,
        result: &mut Vec<Token>,
    ) -> txl::Result<bool> {
        let mut matcher = matcher_factory.start();
        let mut scope_depth = 0;

        // This handles the case of a macro whose argument ends with the special #{ tokens. In this special case the parsing
        // will end with a scope depth of 1, because the last token parsed will be the { and all braces before that will
        // be balanced.
        let closing_scope_depth = match matcher_factory.substring().last() {
            Some(token::Value::BeginGroup(_)) => 1,
            _ => 0,
        };
        let start_index = result.len();
        loop {
            let Some(token) = stream.next()? else {
                let delimiter =
                    write_values(matcher_factory.substring(), stream.vm().cs_name_interner());
                return Err(error::SimpleEndOfInputError::new(
                    stream.vm(),
                    "the input ended while parsing a delimited argument for a macro",
                )
                .with_note(format!["this is argument number {param_num} for this macro"])
                .with_note(format!["the argument must be followed by the tokens `{delimiter}`"])
                .into());
            };
            match token.value() {
                token::Value::BeginGroup(_) => {
                    scope_depth += 1;
                }
                token::Value::EndGroup(_) => {
                    scope_depth -= 1;
                }
                _ => (),
            };
            let matches_delimiter = matcher.next(&token.value());
            result.push(token);
            if scope_depth == closing_scope_depth && matches_delimiter {
                // Remove the suffix.
                for _ in 0..matcher_factory.substring().len() {
                    result.pop();
                }
                return Ok(Parameter::should_trim_outer_braces_if_present(
                    &result[start_index..],
                ));
            }
        }
    }

    fn should_trim_outer_braces_if_present(list: &[Token]) -> bool {
        if list.len() <= 1 {
            return false;
        }
        if !matches!(list[0].value(), token::Value::BeginGroup(_)) {
            return false;
        }
        if !matches!(list[list.len() - 1].value(), token::Value::EndGroup(_)) {
            return false;
        }
        // The braces must enclose the whole argument, as in `{a}{b}` they do not.
        let mut depth = 0_usize;
        for (i, token) in list.iter().enumerate() {
            match token.value() {
                token::Value::BeginGroup(_) => depth += 1,
                token::Value::EndGroup(_) => {
                    depth -= 1;
                    if depth == 0 && i + 1 < list.len() {
                        return false;
                    }
                }
                _ => {}
            }
        }
        true
    }

    fn parse_undelimited_argument<S: TexlangState>(
        input: &mut vm::ExpansionInput<S>,
        param_num: usize,
        result: &mut Vec<Token>,
    ) -> txl::Result<()> {
        let input = input.unexpanded();
        let token = loop {
            match input.next()? {
                None => {
                    return Err(error::SimpleEndOfInputError::new(
                        input.vm(),
                        "the input ended while parsing an undelimited argument for a macro",
                    )
                    .with_note(format!["this is argument number {param_num} for this macro"])
                    .into())
                }
                Some(token) => {
                    if !matches!(token.value(), token::Value::Space(_)) {
                        break token;
                    }
                }
            }
        };
        if !matches!(token.value(), token::Value::BeginGroup(_)) {
            result.push(token);
            return Ok(());
        }
        parse::finish_parsing_balanced_tokens(input, result)?;
        Ok(())
    }
}

fn write_values(values: &[Value], interner: &token::CsNameInterner) -> String {
    let tokens: Vec<Token> = values
        .iter()
        .map(|value| Token::new_from_value(*value, token::trace::Key::dummy()))
        .collect();
    token::write_tokens(&tokens, interner)
}

fn colored_parameter_number(n: usize) -> String {
    let color = match n {
        1 => |s: String| s.bright_yellow(),
        _ => |s: String| s.bright_blue(),
    };
    format![
        "{}{}",
        color("#".to_string()).bold(),
        color(n.to_string()).bold()
    ]
}

/// Writes the replacement text with parameters highlighted, as shown by `\tracingmacros`.
pub fn pretty_print_replacement_text(
    replacements: &[Replacement],
    interner: &token::CsNameInterner,
) -> String {
    let mut b = String::default();
    for replacement in replacements.iter() {
        match replacement {
            Replacement::Parameter(i) => {
                b.push_str(colored_parameter_number(*i + 1).as_str());
            }
            Replacement::Tokens(tokens) => {
                b.push_str(&token::write_tokens(tokens.iter().rev(), interner));
            }
        }
    }
    b
}

/// Removes the provided vector of tokens from the front of the stream.
///
/// Fails if the stream does not start with the tokens.
fn remove_tokens_from_stream<S: TexlangState>(
    macro_token: Token,
    tokens: &[Token],
    stream: &mut vm::UnexpandedStream<S>,
) -> txl::Result<()> {
    for prefix_token in tokens.iter() {
        let stream_token = stream.next_or_err("matching the prefix of a user-defined macro")?;
        if stream_token.value() != prefix_token.value() {
            let name = stream.trace(macro_token).value;
            return Err(error::SimpleTokenError::new(
                stream.vm(),
                stream_token,
                format!["use of {name} doesn't match its definition"],
            )
            .with_category(error::Category::Syntax)
            .into());
        }
    }
    Ok(())
}
