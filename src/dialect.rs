//! SQL dialects.
//!
//! A dialect knows how to format literals and how to talk about sequences and
//! identity columns of one database. Everything database specific that the
//! generators need goes through this trait.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

use crate::statements::{EntityStatement, StatementKind, TableStatement};

/// Database specific SQL rendering
pub trait Dialect: fmt::Debug {
    fn name(&self) -> &'static str;

    /// Quotes a string literal.
    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn format_bool(&self, value: bool) -> &'static str {
        if value {
            "TRUE"
        } else {
            "FALSE"
        }
    }

    /// Clause appended to a `SELECT` that has no source table.
    fn optional_table(&self) -> &'static str {
        ""
    }

    /// Indicates that explicit values may be written into identity columns.
    fn is_setting_identity_allowed(&self) -> bool {
        true
    }

    fn is_sequence_supported(&self) -> bool {
        true
    }

    /// Expression that fetches the next value of a sequence.
    fn next_sequence_value(&self, sequence: &str, increment: i64) -> String;

    /// Expression that returns the last value handed out by a sequence.
    fn current_sequence_value(&self, sequence: &str, increment: i64) -> String;

    /// Expression that returns the last value of an identity column.
    ///
    /// `in_where` indicates that the expression is used in the `WHERE` clause
    /// of a statement that modifies `table`.
    fn current_identity_value(&self, table: &str, column: &str, in_where: bool) -> String {
        let _ = in_where;
        format!("(SELECT MAX({}) FROM {})", column, table)
    }

    /// Statement that makes the sequence continue with `next_value`.
    fn restart_sequence(&self, sequence: &str, next_value: i64) -> Option<String>;

    /// Statement that makes an identity column continue with `next_value`.
    fn restart_identity(&self, table: &str, column: &str, next_value: i64) -> Option<String>;

    /// Insert statement for a row without any explicit column.
    fn empty_insert(&self, table: &str) -> String {
        format!("INSERT INTO {} DEFAULT VALUES", table)
    }
}

/// Renders a statement, without terminator, with the literal rules of `dialect`.
pub fn render_statement(dialect: &dyn Dialect, stmt: &EntityStatement) -> String {
    match stmt {
        EntityStatement::Plain(sql) => sql.clone(),
        EntityStatement::Table(table) => render_table_statement(dialect, table),
    }
}

fn render_table_statement(dialect: &dyn Dialect, stmt: &TableStatement) -> String {
    match stmt.kind() {
        StatementKind::Insert => {
            if stmt.is_empty() {
                return dialect.empty_insert(stmt.table());
            }
            let (columns, values): (Vec<&str>, Vec<String>) = stmt
                .values()
                .map(|(column, value)| (column.as_str(), value.to_sql(dialect)))
                .unzip();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                stmt.table(),
                columns.join(", "),
                values.join(", ")
            )
        }
        StatementKind::Update => {
            let assignments: Vec<String> = stmt
                .values()
                .map(|(column, value)| format!("{} = {}", column, value.to_sql(dialect)))
                .collect();
            let mut sql = format!("UPDATE {} SET {}", stmt.table(), assignments.join(", "));
            let conditions: Vec<String> = stmt
                .conditions()
                .map(|(column, value)| format!("{} = {}", column, value.to_sql(dialect)))
                .collect();
            if !conditions.is_empty() {
                sql.push_str(" WHERE ");
                sql.push_str(&conditions.join(" AND "));
            }
            sql
        }
    }
}

/// PostgreSQL
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn next_sequence_value(&self, sequence: &str, _increment: i64) -> String {
        format!("nextval('{}')", sequence)
    }

    // currval() is bound to the session, so read the sequence relation instead.
    fn current_sequence_value(&self, sequence: &str, increment: i64) -> String {
        format!(
            "(SELECT CASE WHEN is_called THEN last_value ELSE last_value - {} END FROM {})",
            increment, sequence
        )
    }

    fn restart_sequence(&self, sequence: &str, next_value: i64) -> Option<String> {
        Some(format!("ALTER SEQUENCE {} RESTART WITH {}", sequence, next_value))
    }

    fn restart_identity(&self, table: &str, column: &str, next_value: i64) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} ALTER COLUMN {} RESTART WITH {}",
            table, column, next_value
        ))
    }
}

/// MySQL and MariaDB
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl Dialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn quote_string(&self, value: &str) -> String {
        format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
    }

    fn is_sequence_supported(&self) -> bool {
        false
    }

    // MariaDB sequence syntax. Never used while `is_sequence_supported` is
    // false, since sequence strategies are rejected for this dialect.
    fn next_sequence_value(&self, sequence: &str, _increment: i64) -> String {
        format!("NEXTVAL({})", sequence)
    }

    fn current_sequence_value(&self, sequence: &str, _increment: i64) -> String {
        format!("LASTVAL({})", sequence)
    }

    // MySQL can't select from the table that is modified in the same statement.
    fn current_identity_value(&self, table: &str, column: &str, in_where: bool) -> String {
        if in_where {
            format!(
                "(SELECT MAX({0}) FROM (SELECT {0} FROM {1}) AS current_ids)",
                column, table
            )
        } else {
            format!("(SELECT MAX({}) FROM {})", column, table)
        }
    }

    fn restart_sequence(&self, _sequence: &str, _next_value: i64) -> Option<String> {
        None
    }

    fn restart_identity(&self, table: &str, _column: &str, next_value: i64) -> Option<String> {
        Some(format!("ALTER TABLE {} AUTO_INCREMENT = {}", table, next_value))
    }

    fn empty_insert(&self, table: &str) -> String {
        format!("INSERT INTO {} () VALUES ()", table)
    }
}

/// Oracle
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn format_bool(&self, value: bool) -> &'static str {
        if value {
            "1"
        } else {
            "0"
        }
    }

    fn optional_table(&self) -> &'static str {
        "FROM DUAL"
    }

    fn next_sequence_value(&self, sequence: &str, _increment: i64) -> String {
        format!("{}.nextval", sequence)
    }

    fn current_sequence_value(&self, sequence: &str, _increment: i64) -> String {
        format!(
            "(SELECT last_number - increment_by FROM user_sequences WHERE sequence_name = '{}')",
            sequence.to_uppercase()
        )
    }

    fn restart_sequence(&self, sequence: &str, next_value: i64) -> Option<String> {
        Some(format!("ALTER SEQUENCE {} RESTART START WITH {}", sequence, next_value))
    }

    fn restart_identity(&self, table: &str, column: &str, next_value: i64) -> Option<String> {
        Some(format!(
            "ALTER TABLE {} MODIFY {} GENERATED BY DEFAULT AS IDENTITY (START WITH {})",
            table, column, next_value
        ))
    }
}

/// Selects one of the built-in dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DialectKind {
    #[default]
    Postgres,
    Mysql,
    Oracle,
}

impl DialectKind {
    pub fn create(self) -> Rc<dyn Dialect> {
        match self {
            DialectKind::Postgres => Rc::new(PostgresDialect),
            DialectKind::Mysql => Rc::new(MySqlDialect),
            DialectKind::Oracle => Rc::new(OracleDialect),
        }
    }

    /// Parses a dialect name, accepting the usual aliases.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(DialectKind::Postgres),
            "mysql" | "mariadb" => Some(DialectKind::Mysql),
            "oracle" => Some(DialectKind::Oracle),
            _ => None,
        }
    }
}

impl fmt::Display for DialectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DialectKind::Postgres => write!(f, "postgres"),
            DialectKind::Mysql => write!(f, "mysql"),
            DialectKind::Oracle => write!(f, "oracle"),
        }
    }
}
