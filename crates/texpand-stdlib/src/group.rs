//! Semi-simple groups: `\begingroup` and `\endgroup`

use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;

pub const BEGINGROUP_DOC: &str = "Begin a semi-simple group";
pub const ENDGROUP_DOC: &str = "End a semi-simple group";

/// Get the `\begingroup` primitive.
pub fn get_begingroup<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(begingroup_primitive_fn).with_doc(BEGINGROUP_DOC)
}

/// Get the `\endgroup` primitive.
pub fn get_endgroup<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(endgroup_primitive_fn).with_doc(ENDGROUP_DOC)
}

fn begingroup_primitive_fn<S: TexlangState>(
    _: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    input.begin_group(context::GroupKind::SemiSimple);
    Ok(())
}

fn endgroup_primitive_fn<S: TexlangState>(
    token: token::Token,
    input: &mut vm::ExecutionInput<S>,
) -> txl::Result<()> {
    input.end_group(context::GroupKind::SemiSimple, token)
}
