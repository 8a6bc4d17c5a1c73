//! SQL statement builders.
//!
//! Statements are built as plain data and rendered to text by a
//! [`Dialect`](crate::dialect::Dialect), so the same statement can be written
//! to a script or executed against a live connection.

pub mod expression;
pub mod table;

pub use expression::ColumnExpression;
pub use table::{EntityStatement, StatementKind, TableStatement};
