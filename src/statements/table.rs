//! Insert and update statements against a single table.

use indexmap::IndexMap;

use super::expression::ColumnExpression;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Insert,
    Update,
}

/// An insert or update under construction
#[derive(Debug, Clone, PartialEq)]
pub struct TableStatement {
    kind: StatementKind,
    table: String,
    values: IndexMap<String, ColumnExpression>,
    conditions: IndexMap<String, ColumnExpression>,
}

impl TableStatement {
    pub fn insert(table: impl Into<String>) -> Self {
        Self::new(StatementKind::Insert, table.into())
    }

    pub fn update(table: impl Into<String>) -> Self {
        Self::new(StatementKind::Update, table.into())
    }

    fn new(kind: StatementKind, table: String) -> Self {
        Self {
            kind,
            table,
            values: IndexMap::new(),
            conditions: IndexMap::new(),
        }
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Sets (or replaces) the value of a column.
    pub fn set_column_value(&mut self, column: impl Into<String>, value: ColumnExpression) {
        self.values.insert(column.into(), value);
    }

    pub fn column_value(&self, column: &str) -> Option<&ColumnExpression> {
        self.values.get(column)
    }

    /// Columns and values in the order they were set.
    pub fn values(&self) -> impl Iterator<Item = (&String, &ColumnExpression)> {
        self.values.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Adds an equality condition to the `WHERE` clause of an update.
    pub fn add_condition(&mut self, column: impl Into<String>, value: ColumnExpression) {
        self.conditions.insert(column.into(), value);
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&String, &ColumnExpression)> {
        self.conditions.iter()
    }
}

/// Any statement that can be handed to a statements writer
#[derive(Debug, Clone, PartialEq)]
pub enum EntityStatement {
    Table(TableStatement),
    /// Statement text that needs no further rendering.
    Plain(String),
}

impl EntityStatement {
    pub fn plain(sql: impl Into<String>) -> Self {
        EntityStatement::Plain(sql.into())
    }
}

impl From<TableStatement> for EntityStatement {
    fn from(stmt: TableStatement) -> Self {
        EntityStatement::Table(stmt)
    }
}
