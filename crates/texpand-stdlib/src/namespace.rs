//! Namespaces: `\namespace`, `\export` and `\import`
//!
//! Control sequences are read in the current namespace.
//! A control sequence that is not bound in the current namespace resolves to its
//!     binding in the root namespace, which is the namespace with the empty name.
//! A namespace makes some of its bindings available to other namespaces using `\export`;
//!     other namespaces copy the exported bindings with `\import`.

use crate::prefix;
use texpand::parse;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const NAMESPACE_DOC: &str = "Set the current namespace";
pub const EXPORT_DOC: &str = "Export control sequences of the current namespace";
pub const IMPORT_DOC: &str = "Copy the exported bindings of a namespace into the current namespace";

/// Get the `\namespace` primitive.
pub fn get_namespace<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(namespace_primitive_fn)
        .with_tag(namespace_tag())
        .with_doc(NAMESPACE_DOC)
}

static NAMESPACE_TAG: command::StaticTag = command::StaticTag::new();

pub fn namespace_tag() -> command::Tag {
    NAMESPACE_TAG.get()
}

fn namespace_primitive_fn<S: HasComponent<prefix::Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let scope = input.state_mut().component_mut().read_and_reset_global();
    let name = parse_name(input)?;
    let namespace = input.intern_namespace(token, &name)?;
    log::debug!("entering namespace `{name}`");
    input.context_mut().set_namespace(namespace, scope);
    Ok(())
}

/// Get the `\export` primitive.
pub fn get_export<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(export_primitive_fn).with_doc(EXPORT_DOC)
}

fn export_primitive_fn<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let mut tokens = input.checkout_token_buffer();
    parse::parse_braced_tokens(input.unexpanded(), &mut tokens)?;
    let mut names = Vec::with_capacity(tokens.len());
    for token in &tokens {
        match token.value() {
            token::Value::CommandRef(token::CommandRef::ControlSequence(name, _)) => {
                names.push(name)
            }
            token::Value::Space(_) => {}
            _ => {
                return Err(error::SimpleTokenError::new(
                    input.vm(),
                    *token,
                    "only control sequences can be exported",
                )
                .into())
            }
        }
    }
    input.return_token_buffer(tokens);
    let namespace = input.vm().context.namespace();
    input.context_mut().export(namespace, names);
    Ok(())
}

/// Get the `\import` primitive.
pub fn get_import<S: HasComponent<prefix::Component>>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(import_primitive_fn)
        .with_tag(import_tag())
        .with_doc(IMPORT_DOC)
}

static IMPORT_TAG: command::StaticTag = command::StaticTag::new();

pub fn import_tag() -> command::Tag {
    IMPORT_TAG.get()
}

fn import_primitive_fn<S: HasComponent<prefix::Component>>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    let scope = input.state_mut().component_mut().read_and_reset_global();
    let name = parse_name(input)?;
    let Some(source) = input.vm().namespace_interner().get(&name) else {
        return Err(error::SimpleTokenError::new(
            input.vm(),
            token,
            format!["there is no namespace named `{name}`"],
        )
        .with_note("a namespace is created the first time it is entered using `\\namespace`")
        .into());
    };
    input.import_namespace(source, scope);
    Ok(())
}

fn parse_name<S: TexlangState>(input: &mut vm::ExecutionInput<S>) -> txl::Result<String> {
    let mut tokens = input.checkout_token_buffer();
    parse::parse_braced_tokens(input.unexpanded(), &mut tokens)?;
    let mut name = String::with_capacity(tokens.len());
    for token in &tokens {
        match token.value() {
            token::Value::Letter(c) | token::Value::Other(c) => name.push(c),
            token::Value::Space(_) => {}
            _ => {
                return Err(error::SimpleTokenError::new(
                    input.vm(),
                    *token,
                    "a namespace name can only contain letter and other characters",
                )
                .into())
            }
        }
    }
    input.return_token_buffer(tokens);
    Ok(name)
}
