//! Entity type descriptors.
//!
//! This module provides the metadata the identifier subsystem needs about an
//! entity type: its table, the column of its identifier and the numeric type
//! of that identifier. How these descriptors are discovered (annotations,
//! YAML, hand-written code) is up to the caller.

use convert_case::{Case, Casing};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::GeneratorError;

/// Numeric type of an identifier column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum IdType {
    SmallInt,
    Int,
    #[default]
    BigInt,
}

impl IdType {
    /// Largest id representable by this type.
    pub fn max_value(self) -> i64 {
        match self {
            IdType::SmallInt => i64::from(i16::MAX),
            IdType::Int => i64::from(i32::MAX),
            IdType::BigInt => i64::MAX,
        }
    }

    /// Ensures that `value` fits into this type.
    pub fn check(self, value: i64) -> Result<i64, GeneratorError> {
        let min = match self {
            IdType::SmallInt => i64::from(i16::MIN),
            IdType::Int => i64::from(i32::MIN),
            IdType::BigInt => i64::MIN,
        };
        if value < min || value > self.max_value() {
            return Err(GeneratorError::Overflow { value, id_type: self });
        }
        Ok(value)
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdType::SmallInt => write!(f, "smallint"),
            IdType::Int => write!(f, "int"),
            IdType::BigInt => write!(f, "bigint"),
        }
    }
}

/// Describes a column of an entity table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    /// The value of this column is supplied by the database (sequence default,
    /// identity, ...) instead of being written explicitly.
    pub auto_generated: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, auto_generated: bool) -> Self {
        Self {
            name: name.into(),
            auto_generated,
        }
    }
}

/// Describes one entity type and the table it is stored in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityClass {
    name: String,
    table: String,
}

impl EntityClass {
    /// Creates a descriptor whose table name is the snake_case entity name.
    ///
    /// # Example
    /// ```
    /// use entity_sql::EntityClass;
    ///
    /// let class = EntityClass::new("BookReview");
    /// assert_eq!(class.table(), "book_review");
    /// ```
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let table = name.to_case(Case::Snake);
        Self { name, table }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}
