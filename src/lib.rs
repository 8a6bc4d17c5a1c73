//! # entity-sql: SQL generation for entity graphs
//!
//! entity-sql turns entities into `INSERT` statements and takes care of their
//! identifiers. Every id is generated by a database counter (sequence, counter
//! table or identity column) and is written in one of two modes:
//!
//! - **Relative ids** (scripts): ids are expressions relative to the current
//!   value of the counter, e.g. `nextval('book_seq')` for the insert and
//!   `((SELECT ... FROM book_seq) - 2)` for a later reference. The script can be
//!   run against any database state.
//! - **Absolute ids** (connected): generators are synchronized with the live
//!   database first, ids are literals and the counters are moved past the
//!   written ids at the end of the run.
//!
//! Entities that exist in the database already are marked as references, with
//! or without their id.
//!
//! ## Example: Script
//!
//! ```ignore
//! use entity_sql::context::{GenerationConfig, GenerationContext};
//! use entity_sql::dataset::{Dataset, DatasetPlan};
//! use entity_sql::writer::ScriptWriter;
//!
//! let dataset = Dataset::load_from_file("library.yaml")?;
//! let mut context = GenerationContext::new(GenerationConfig::default());
//! let mut plan = DatasetPlan::prepare(&dataset, &mut context)?;
//!
//! let mut writer = ScriptWriter::new(std::io::stdout(), &context);
//! plan.write_rows(&mut writer)?;
//! writer.close(&context)?;
//! ```

// Core modules
pub mod entity;
pub mod error;
pub mod property;
pub mod statements;

// Id generation
pub mod context;
pub mod dialect;
pub mod generator;

// Output
pub mod writer;

// Dataset files
pub mod dataset;

// Diesel ORM runtime infrastructure
#[cfg(any(feature = "postgres", feature = "mysql"))]
pub mod diesel_runtime;

// Re-export key types
pub use context::{ContextModelListener, GenerationConfig, GenerationContext};
pub use dialect::{Dialect, DialectKind};
pub use entity::{ColumnDescriptor, EntityClass, IdType};
pub use error::GeneratorError;
pub use generator::{GenerationStrategy, GeneratorKey, IdGenerator, SharedGenerator};
pub use property::{IdState, IdentifierProperty};
pub use statements::{ColumnExpression, EntityStatement, TableStatement};
pub use writer::{ConnectedWriter, ScriptWriter, SqlConnection, StatementHandle, StatementsWriter};

#[cfg(any(feature = "postgres", feature = "mysql"))]
pub use diesel_runtime::{Database, DatabaseConfig};
