//! Writes statements as a SQL script.

use std::io::Write;
use std::rc::Rc;

use super::{finish, StatementsWriter};
use crate::context::GenerationContext;
use crate::dialect::{render_statement, Dialect};
use crate::error::GeneratorError;
use crate::statements::EntityStatement;

/// SQL script writer
///
/// Writes one statement per line, terminated by `;`.
pub struct ScriptWriter<W: Write> {
    writer: W,
    dialect: Rc<dyn Dialect>,
    statements_count: u64,
}

impl<W: Write> ScriptWriter<W> {
    pub fn new(writer: W, context: &GenerationContext) -> Self {
        Self {
            writer,
            dialect: context.dialect(),
            statements_count: 0,
        }
    }

    pub fn statements_count(&self) -> u64 {
        self.statements_count
    }

    /// Writes the alignment statements, flushes and returns the underlying writer.
    pub fn close(mut self, context: &GenerationContext) -> Result<W, GeneratorError> {
        finish(context, &mut self)?;
        Ok(self.writer)
    }
}

impl<W: Write> StatementsWriter for ScriptWriter<W> {
    fn write_statement(&mut self, stmt: &EntityStatement) -> Result<(), GeneratorError> {
        let sql = render_statement(self.dialect.as_ref(), stmt);
        let sql = sql.trim_end();
        if sql.ends_with(';') {
            writeln!(self.writer, "{}", sql)?;
        } else {
            writeln!(self.writer, "{};", sql)?;
        }
        self.statements_count += 1;
        Ok(())
    }

    fn write_comment(&mut self, comment: &str) -> Result<(), GeneratorError> {
        writeln!(self.writer, "/* {} */", comment.replace("*/", "* /"))?;
        Ok(())
    }

    fn write_section_separator(&mut self) -> Result<(), GeneratorError> {
        writeln!(self.writer)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), GeneratorError> {
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::GenerationConfig;
    use crate::statements::{ColumnExpression, TableStatement};

    #[test]
    fn test_script_output() {
        let ctx = GenerationContext::new(GenerationConfig::default());
        let mut writer = ScriptWriter::new(Vec::new(), &ctx);

        let mut stmt = TableStatement::insert("author");
        stmt.set_column_value("name", ColumnExpression::text("Austen"));
        writer.write_comment("Author austen").unwrap();
        writer.write_statement(&stmt.into()).unwrap();
        writer.write_section_separator().unwrap();
        writer
            .write_statement(&EntityStatement::plain("BEGIN NULL; END;"))
            .unwrap();
        assert_eq!(writer.statements_count(), 2);

        let output = String::from_utf8(writer.close(&ctx).unwrap()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(
            lines,
            vec![
                "/* Author austen */",
                "INSERT INTO author (name) VALUES ('Austen');",
                "",
                "BEGIN NULL; END;",
            ]
        );
    }
}
