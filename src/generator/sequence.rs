//! Generator backed by a database sequence.

use std::rc::Rc;

use super::{relative_expression, Cursor, IdGenerator};
use crate::dialect::Dialect;
use crate::entity::IdType;
use crate::error::GeneratorError;
use crate::statements::{ColumnExpression, EntityStatement, TableStatement};
use crate::writer::StatementsWriter;

/// Mirrors a database sequence in memory.
///
/// Inserts fetch the next sequence value themselves, so the cursor only
/// predicts what the database will hand out.
#[derive(Debug)]
pub struct SequenceGenerator {
    dialect: Rc<dyn Dialect>,
    name: String,
    increment: i64,
    relative_ids: bool,
    cursor: Cursor,
}

impl SequenceGenerator {
    pub fn new(
        dialect: Rc<dyn Dialect>,
        name: impl Into<String>,
        increment: i64,
        relative_ids: bool,
    ) -> Self {
        Self {
            dialect,
            name: name.into(),
            increment,
            relative_ids,
            cursor: Cursor::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl IdGenerator for SequenceGenerator {
    fn describe(&self) -> String {
        format!("sequence {}", self.name)
    }

    fn create_next_value(&mut self, id_type: IdType) -> Result<i64, GeneratorError> {
        self.cursor.advance(self.increment, id_type)
    }

    fn is_post_increment(&self) -> bool {
        false
    }

    fn add_next_value(&self, statement: &mut TableStatement, column: &str, _value: i64) {
        statement.set_column_value(
            column,
            ColumnExpression::formula(self.dialect.next_sequence_value(&self.name, self.increment)),
        );
    }

    /// Renders `value` as an offset from the current sequence value: the
    /// newest value is the bare expression, older ones are `(current - n)`.
    fn get_expression(
        &self,
        _table: Option<&str>,
        _column: Option<&str>,
        value: i64,
        _in_where: bool,
    ) -> String {
        let current = self
            .dialect
            .current_sequence_value(&self.name, self.increment);
        relative_expression(current, self.cursor.current(), value)
    }

    fn current_value(&self) -> i64 {
        self.cursor.current()
    }

    fn set_current_value(&mut self, value: i64) -> Result<(), GeneratorError> {
        let name = self.describe();
        self.cursor.synchronize(value, &name)
    }

    fn align_next_value(&mut self, writer: &mut dyn StatementsWriter) -> Result<(), GeneratorError> {
        // Relative scripts always draw from the sequence itself.
        if self.relative_ids || !self.cursor.is_dirty() {
            return Ok(());
        }
        let next = self.cursor.current() + self.increment;
        if let Some(sql) = self.dialect.restart_sequence(&self.name, next) {
            writer.write_statement(&EntityStatement::Plain(sql))?;
        }
        self.cursor.mark_aligned();
        Ok(())
    }
}
