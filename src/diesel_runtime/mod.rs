//! Diesel database runtime
//!
//! Connection pooling and the [`SqlConnection`](crate::writer::SqlConnection)
//! implementation used by the connected writer.
//!
//! # Features
//!
//! - `postgres`: PostgreSQL backend (default)
//! - `mysql`: MySQL / MariaDB backend

pub mod database;

pub use database::{Database, DatabaseConfig, Pool, PooledConnection, PooledStatement};
