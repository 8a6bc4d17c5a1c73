//! Identifier generators.
//!
//! A generator owns the cursor of one physical counter in the database (a
//! sequence, a row in a counter table or an identity column). All properties
//! that reference the same physical counter share one generator instance, see
//! [`GenerationContext::get_generator`](crate::context::GenerationContext::get_generator).
//!
//! # Relative and absolute values
//!
//! In script mode the starting value of a counter is unknown, so the cursor
//! starts at zero and every value is an offset. [`IdGenerator::get_expression`]
//! turns such an offset into SQL arithmetic on the counter's current value,
//! which resolves to the real id when the script runs. In connected mode the
//! cursor is synchronized with the database first and values are real ids.

pub mod identity;
pub mod sequence;
pub mod table;

pub use identity::IdentityGenerator;
pub use sequence::SequenceGenerator;
pub use table::TableGenerator;

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::entity::IdType;
use crate::error::GeneratorError;
use crate::statements::TableStatement;
use crate::writer::StatementsWriter;

/// A generator shared by all properties of the same physical counter.
pub type SharedGenerator = Rc<RefCell<dyn IdGenerator>>;

/// Strategy for generating the values of an identifier column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum GenerationStrategy {
    Sequence {
        name: String,
        #[serde(default = "default_increment")]
        increment: i64,
    },
    Table {
        #[serde(default = "default_counter_table")]
        table: String,
        #[serde(default = "default_key_column")]
        key_column: String,
        #[serde(default = "default_value_column")]
        value_column: String,
        /// Name of the counter row, defaults to the entity table.
        #[serde(default)]
        key: Option<String>,
        #[serde(default = "default_allocation_size")]
        allocation_size: i64,
    },
    Identity,
}

fn default_increment() -> i64 {
    1
}

fn default_counter_table() -> String {
    "id_counters".to_string()
}

fn default_key_column() -> String {
    "counter_name".to_string()
}

fn default_value_column() -> String {
    "last_value".to_string()
}

fn default_allocation_size() -> i64 {
    50
}

impl GenerationStrategy {
    pub fn sequence(name: impl Into<String>) -> Self {
        GenerationStrategy::Sequence {
            name: name.into(),
            increment: default_increment(),
        }
    }

    /// Table counter with the default counter table and block size.
    pub fn table_counter() -> Self {
        GenerationStrategy::Table {
            table: default_counter_table(),
            key_column: default_key_column(),
            value_column: default_value_column(),
            key: None,
            allocation_size: default_allocation_size(),
        }
    }

    /// Identifies the physical counter used for `table`.`column`.
    pub fn key(&self, table: &str, column: &str) -> GeneratorKey {
        match self {
            GenerationStrategy::Sequence { name, .. } => GeneratorKey::Sequence(name.clone()),
            GenerationStrategy::Table {
                table: counter_table,
                key,
                ..
            } => GeneratorKey::Table {
                table: counter_table.clone(),
                key: key.clone().unwrap_or_else(|| table.to_string()),
            },
            GenerationStrategy::Identity => GeneratorKey::Identity {
                table: table.to_string(),
                column: column.to_string(),
            },
        }
    }
}

/// Identifies one physical counter in the database
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GeneratorKey {
    Sequence(String),
    Table { table: String, key: String },
    Identity { table: String, column: String },
}

impl fmt::Display for GeneratorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeneratorKey::Sequence(name) => write!(f, "sequence {}", name),
            GeneratorKey::Table { table, key } => write!(f, "counter {}[{}]", table, key),
            GeneratorKey::Identity { table, column } => write!(f, "identity {}.{}", table, column),
        }
    }
}

/// Generates the values of identifier columns.
pub trait IdGenerator: fmt::Debug {
    /// Short description for log messages.
    fn describe(&self) -> String;

    /// Moves the cursor to the next value and returns it.
    fn create_next_value(&mut self, id_type: IdType) -> Result<i64, GeneratorError>;

    /// Indicates that the value is assigned by the database during the insert.
    fn is_post_increment(&self) -> bool;

    /// Writes the expression for a freshly created `value` into the insert.
    fn add_next_value(&self, statement: &mut TableStatement, column: &str, value: i64);

    /// Renders a reference to `value`.
    ///
    /// The expression is relative to the counter's current value in the
    /// database, so it stays valid whatever that value is when the statement
    /// runs. For the cursor's current value this is the bare current-value
    /// expression of the counter.
    fn get_expression(
        &self,
        table: Option<&str>,
        column: Option<&str>,
        value: i64,
        in_where: bool,
    ) -> String;

    /// Writes statements that are needed before the next insert.
    fn create_pre_insert_statements(
        &mut self,
        writer: &mut dyn StatementsWriter,
    ) -> Result<(), GeneratorError> {
        let _ = writer;
        Ok(())
    }

    fn current_value(&self) -> i64;

    /// Synchronizes the cursor with the database. Allowed once, before any value
    /// was created.
    fn set_current_value(&mut self, value: i64) -> Result<(), GeneratorError>;

    /// Writes statements at the end of a run that make the database counter
    /// continue after the last created value.
    fn align_next_value(&mut self, writer: &mut dyn StatementsWriter) -> Result<(), GeneratorError> {
        let _ = writer;
        Ok(())
    }
}

/// Cursor of a generator
#[derive(Debug, Clone, Default)]
pub(crate) struct Cursor {
    current: i64,
    /// Value at start of the run (or after the last alignment).
    initial: i64,
    synchronized: bool,
}

impl Cursor {
    pub(crate) fn current(&self) -> i64 {
        self.current
    }

    /// Indicates that values were created since the start or the last alignment.
    pub(crate) fn is_dirty(&self) -> bool {
        self.current != self.initial
    }

    pub(crate) fn advance(&mut self, step: i64, id_type: IdType) -> Result<i64, GeneratorError> {
        let next = self
            .current
            .checked_add(step)
            .ok_or(GeneratorError::Overflow {
                value: self.current,
                id_type,
            })?;
        self.current = id_type.check(next)?;
        Ok(next)
    }

    pub(crate) fn synchronize(&mut self, value: i64, name: &str) -> Result<(), GeneratorError> {
        if self.synchronized {
            return Err(GeneratorError::precondition(format!(
                "{} was already synchronized",
                name
            )));
        }
        if self.is_dirty() {
            return Err(GeneratorError::precondition(format!(
                "{} already created values and can't be synchronized",
                name
            )));
        }
        if value < 0 {
            return Err(GeneratorError::precondition(format!(
                "{} can't start at negative value {}",
                name, value
            )));
        }
        self.current = value;
        self.initial = value;
        self.synchronized = true;
        Ok(())
    }

    pub(crate) fn mark_aligned(&mut self) {
        self.initial = self.current;
    }
}

/// Renders `current` minus the distance between `position` and `value`.
pub(crate) fn relative_expression(current: String, position: i64, value: i64) -> String {
    let diff = position - value;
    match diff {
        0 => current,
        d if d > 0 => format!("({} - {})", current, d),
        d => format!("({} + {})", current, -d),
    }
}
