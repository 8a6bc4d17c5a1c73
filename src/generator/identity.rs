//! Generator for identity and auto-increment columns.

use std::rc::Rc;

use super::{relative_expression, Cursor, IdGenerator};
use crate::dialect::Dialect;
use crate::entity::IdType;
use crate::error::GeneratorError;
use crate::statements::{EntityStatement, TableStatement};
use crate::writer::StatementsWriter;

/// Follows an identity column: the database assigns the value during the
/// insert, the cursor is advanced after the insert was written.
#[derive(Debug)]
pub struct IdentityGenerator {
    dialect: Rc<dyn Dialect>,
    table: String,
    column: String,
    relative_ids: bool,
    cursor: Cursor,
}

impl IdentityGenerator {
    pub fn new(
        dialect: Rc<dyn Dialect>,
        table: impl Into<String>,
        column: impl Into<String>,
        relative_ids: bool,
    ) -> Self {
        Self {
            dialect,
            table: table.into(),
            column: column.into(),
            relative_ids,
            cursor: Cursor::default(),
        }
    }
}

impl IdGenerator for IdentityGenerator {
    fn describe(&self) -> String {
        format!("identity {}.{}", self.table, self.column)
    }

    fn create_next_value(&mut self, id_type: IdType) -> Result<i64, GeneratorError> {
        self.cursor.advance(1, id_type)
    }

    fn is_post_increment(&self) -> bool {
        true
    }

    fn add_next_value(&self, _statement: &mut TableStatement, _column: &str, _value: i64) {
        // The column is left out, the database assigns the value.
    }

    fn get_expression(
        &self,
        _table: Option<&str>,
        _column: Option<&str>,
        value: i64,
        in_where: bool,
    ) -> String {
        let current = self
            .dialect
            .current_identity_value(&self.table, &self.column, in_where);
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
        if self.relative_ids || !self.cursor.is_dirty() {
            return Ok(());
        }
        let next = self.cursor.current() + 1;
        if let Some(sql) = self.dialect.restart_identity(&self.table, &self.column, next) {
            writer.write_statement(&EntityStatement::Plain(sql))?;
        }
        self.cursor.mark_aligned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, PostgresDialect};
    use crate::writer::testing::RecordingWriter;

    #[test]
    fn test_values_follow_inserts() {
        let mut generator = IdentityGenerator::new(Rc::new(PostgresDialect), "tag", "id", true);
        assert!(generator.is_post_increment());

        let mut stmt = TableStatement::insert("tag");
        generator.add_next_value(&mut stmt, "id", 0);
        assert!(stmt.is_empty());

        assert_eq!(generator.create_next_value(IdType::Int).unwrap(), 1);
        assert_eq!(generator.create_next_value(IdType::Int).unwrap(), 2);
        assert_eq!(
            generator.get_expression(None, None, 1, false),
            "((SELECT MAX(id) FROM tag) - 1)"
        );
        assert_eq!(
            generator.get_expression(None, None, 2, false),
            "(SELECT MAX(id) FROM tag)"
        );
    }

    #[test]
    fn test_where_expression_differs_on_mysql() {
        let mut generator = IdentityGenerator::new(Rc::new(MySqlDialect), "tag", "id", true);
        generator.create_next_value(IdType::Int).unwrap();
        assert_eq!(
            generator.get_expression(None, None, 1, true),
            "(SELECT MAX(id) FROM (SELECT id FROM tag) AS current_ids)"
        );
    }

    #[test]
    fn test_absolute_run_restarts_identity() {
        let mut generator = IdentityGenerator::new(Rc::new(MySqlDialect), "tag", "id", false);
        generator.set_current_value(9).unwrap();
        generator.create_next_value(IdType::Int).unwrap();

        let mut writer = RecordingWriter::default();
        generator.align_next_value(&mut writer).unwrap();
        assert_eq!(writer.sql(), vec!["ALTER TABLE tag AUTO_INCREMENT = 11"]);
    }
}
