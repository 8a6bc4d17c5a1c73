//! Statement writers.
//!
//! A [`StatementsWriter`] receives the statements of a generation run. The
//! [`ScriptWriter`] formats them as a human readable script, the
//! [`ConnectedWriter`] executes them against a live database.

pub mod connected;
pub mod script;

pub use connected::{trim_statement, ConnectedWriter, SqlConnection, StatementHandle};
pub use script::ScriptWriter;

use crate::context::GenerationContext;
use crate::error::GeneratorError;
use crate::statements::EntityStatement;

/// Receives the statements of a generation run
pub trait StatementsWriter {
    fn write_statement(&mut self, stmt: &EntityStatement) -> Result<(), GeneratorError>;

    fn write_comment(&mut self, comment: &str) -> Result<(), GeneratorError>;

    /// Separates two sections of the output (e.g. two entity types).
    fn write_section_separator(&mut self) -> Result<(), GeneratorError>;

    fn flush(&mut self) -> Result<(), GeneratorError> {
        Ok(())
    }
}

/// Shutdown sequence shared by all writers: writes the alignment statements
/// of all generators and flushes the writer.
pub fn finish(
    context: &GenerationContext,
    writer: &mut dyn StatementsWriter,
) -> Result<(), GeneratorError> {
    context.write_alignment_statements(writer)?;
    writer.flush()
}
