//! Interaction modes: how the host reacts to errors
//!
//! The mode is stored in the context and read by the host after an error.
//! Changing the mode is always a global assignment.

use texpand::context::InteractionMode;
use texpand::prelude as txl;
use texpand::traits::*;
use texpand::*;
use texpand_stdext::collections::groupingmap;

pub const BATCHMODE_DOC: &str = "Log errors and keep going, printing nothing to the terminal";
pub const NONSTOPMODE_DOC: &str = "Print errors and keep going";
pub const SCROLLMODE_DOC: &str = "Print errors and stop at the first error";
pub const ERRORSTOPMODE_DOC: &str = "Print errors and stop at the first error";
pub const INTERACTIONMODE_DOC: &str = "The current interaction mode, from 0 (batch) to 3 (errorstop)";

/// Get the `\batchmode` primitive.
pub fn get_batchmode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(|_, input: &mut vm::ExecutionInput<S>| {
        set_mode(input, InteractionMode::Batch)
    })
    .with_doc(BATCHMODE_DOC)
}

/// Get the `\nonstopmode` primitive.
pub fn get_nonstopmode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(|_, input: &mut vm::ExecutionInput<S>| {
        set_mode(input, InteractionMode::NonStop)
    })
    .with_doc(NONSTOPMODE_DOC)
}

/// Get the `\scrollmode` primitive.
pub fn get_scrollmode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(|_, input: &mut vm::ExecutionInput<S>| {
        set_mode(input, InteractionMode::Scroll)
    })
    .with_doc(SCROLLMODE_DOC)
}

/// Get the `\errorstopmode` primitive.
pub fn get_errorstopmode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_execution(|_, input: &mut vm::ExecutionInput<S>| {
        set_mode(input, InteractionMode::ErrorStop)
    })
    .with_doc(ERRORSTOPMODE_DOC)
}

/// Get the `\interactionmode` variable.
///
/// The variable can be read using `\the` but not assigned.
pub fn get_interactionmode<S: TexlangState>() -> command::BuiltIn<S> {
    command::BuiltIn::new_variable(variable::Command::new_singleton(context::Key::Interaction))
        .with_doc(INTERACTIONMODE_DOC)
}

fn set_mode<S: TexlangState>(input: &mut vm::ExecutionInput<S>, mode: InteractionMode) -> txl::Result<()> {
    log::debug!("switching to {mode} mode");
    input
        .context_mut()
        .set_interaction_mode(mode, groupingmap::Scope::Global);
    Ok(())
}
