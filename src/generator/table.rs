//! Generator backed by a row in a counter table.

use std::rc::Rc;

use super::{relative_expression, Cursor, IdGenerator};
use crate::dialect::Dialect;
use crate::entity::IdType;
use crate::error::GeneratorError;
use crate::statements::{ColumnExpression, TableStatement};
use crate::writer::StatementsWriter;

/// Keeps the last used id in the row `key_column = key` of an ordinary table.
///
/// Values are reserved in blocks of `allocation_size`: the row is advanced by
/// a whole block before the first insert that needs a value from it, so one
/// update covers every entity sharing the counter until the block is used up.
/// The unused rest of the last block is given back at alignment.
#[derive(Debug)]
pub struct TableGenerator {
    dialect: Rc<dyn Dialect>,
    table: String,
    key_column: String,
    value_column: String,
    key: String,
    allocation_size: i64,
    cursor: Cursor,
    /// Predicted content of the counter row, in cursor units.
    row_value: i64,
}

impl TableGenerator {
    pub fn new(
        dialect: Rc<dyn Dialect>,
        table: impl Into<String>,
        key_column: impl Into<String>,
        value_column: impl Into<String>,
        key: impl Into<String>,
        allocation_size: i64,
    ) -> Self {
        Self {
            dialect,
            table: table.into(),
            key_column: key_column.into(),
            value_column: value_column.into(),
            key: key.into(),
            allocation_size: allocation_size.max(1),
            cursor: Cursor::default(),
            row_value: 0,
        }
    }

    fn row_expression(&self) -> String {
        format!(
            "(SELECT {} FROM {} WHERE {} = {})",
            self.value_column,
            self.table,
            self.key_column,
            self.dialect.quote_string(&self.key)
        )
    }

    /// Moves the counter row by `delta`.
    fn update_row(&mut self, writer: &mut dyn StatementsWriter, delta: i64) -> Result<(), GeneratorError> {
        let formula = if delta >= 0 {
            format!("{} + {}", self.value_column, delta)
        } else {
            format!("{} - {}", self.value_column, -delta)
        };
        let mut stmt = TableStatement::update(self.table.as_str());
        stmt.set_column_value(self.value_column.as_str(), ColumnExpression::formula(formula));
        stmt.add_condition(self.key_column.as_str(), ColumnExpression::text(self.key.as_str()));
        writer.write_statement(&stmt.into())?;
        self.row_value += delta;
        Ok(())
    }
}

impl IdGenerator for TableGenerator {
    fn describe(&self) -> String {
        format!("counter {}[{}]", self.table, self.key)
    }

    fn create_next_value(&mut self, id_type: IdType) -> Result<i64, GeneratorError> {
        self.cursor.advance(1, id_type)
    }

    fn is_post_increment(&self) -> bool {
        false
    }

    fn add_next_value(&self, statement: &mut TableStatement, column: &str, value: i64) {
        statement.set_column_value(
            column,
            ColumnExpression::formula(self.get_expression(None, None, value, false)),
        );
    }

    fn get_expression(
        &self,
        _table: Option<&str>,
        _column: Option<&str>,
        value: i64,
        _in_where: bool,
    ) -> String {
        relative_expression(self.row_expression(), self.row_value, value)
    }

    fn create_pre_insert_statements(
        &mut self,
        writer: &mut dyn StatementsWriter,
    ) -> Result<(), GeneratorError> {
        if self.cursor.current() < self.row_value {
            return Ok(());
        }
        self.update_row(writer, self.allocation_size)
    }

    fn current_value(&self) -> i64 {
        self.cursor.current()
    }

    fn set_current_value(&mut self, value: i64) -> Result<(), GeneratorError> {
        let name = self.describe();
        self.cursor.synchronize(value, &name)?;
        self.row_value = value;
        Ok(())
    }

    fn align_next_value(&mut self, writer: &mut dyn StatementsWriter) -> Result<(), GeneratorError> {
        let delta = self.cursor.current() - self.row_value;
        if delta != 0 {
            self.update_row(writer, delta)?;
        }
        self.cursor.mark_aligned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::PostgresDialect;
    use crate::writer::testing::RecordingWriter;

    const ROW: &str = "(SELECT last_value FROM id_counters WHERE counter_name = 'book')";

    fn generator(allocation_size: i64) -> TableGenerator {
        TableGenerator::new(
            Rc::new(PostgresDialect),
            "id_counters",
            "counter_name",
            "last_value",
            "book",
            allocation_size,
        )
    }

    fn allocate(generator: &mut TableGenerator, writer: &mut RecordingWriter) -> i64 {
        generator.create_pre_insert_statements(writer).unwrap();
        generator.create_next_value(IdType::BigInt).unwrap()
    }

    #[test]
    fn test_block_is_reserved_once() {
        let mut generator = generator(50);
        let mut writer = RecordingWriter::default();

        assert_eq!(allocate(&mut generator, &mut writer), 1);
        assert_eq!(allocate(&mut generator, &mut writer), 2);
        assert_eq!(allocate(&mut generator, &mut writer), 3);

        assert_eq!(
            writer.sql(),
            vec!["UPDATE id_counters SET last_value = last_value + 50 WHERE counter_name = 'book'"]
        );
        assert_eq!(
            generator.get_expression(None, None, 1, false),
            format!("({} - 49)", ROW)
        );
    }

    #[test]
    fn test_next_block_when_exhausted() {
        let mut generator = generator(2);
        let mut writer = RecordingWriter::default();

        for _ in 0..3 {
            allocate(&mut generator, &mut writer);
        }
        assert_eq!(writer.sql().len(), 2);
        assert_eq!(
            generator.get_expression(None, None, 3, false),
            format!("({} - 1)", ROW)
        );
    }

    #[test]
    fn test_insert_embeds_row_expression() {
        let mut generator = generator(1);
        let mut writer = RecordingWriter::default();
        let id = allocate(&mut generator, &mut writer);

        let mut stmt = TableStatement::insert("book");
        generator.add_next_value(&mut stmt, "id", id);
        assert_eq!(stmt.column_value("id"), Some(&ColumnExpression::formula(ROW)));
    }

    #[test]
    fn test_alignment_releases_unused_values() {
        let mut generator = generator(50);
        let mut writer = RecordingWriter::default();
        allocate(&mut generator, &mut writer);
        allocate(&mut generator, &mut writer);

        generator.align_next_value(&mut writer).unwrap();
        assert_eq!(
            writer.sql()[1],
            "UPDATE id_counters SET last_value = last_value - 48 WHERE counter_name = 'book'"
        );
    }

    #[test]
    fn test_absolute_values_continue_after_row() {
        let mut generator = generator(50);
        generator.set_current_value(40).unwrap();
        assert_eq!(generator.get_expression(None, None, 40, false), ROW);
        assert_eq!(generator.create_next_value(IdType::BigInt).unwrap(), 41);

        let mut writer = RecordingWriter::default();
        generator.align_next_value(&mut writer).unwrap();
        assert_eq!(
            writer.sql(),
            vec!["UPDATE id_counters SET last_value = last_value + 1 WHERE counter_name = 'book'"]
        );
    }
}
