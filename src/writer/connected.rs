//! Executes statements directly against a database connection.

use regex::Regex;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::{finish, StatementsWriter};
use crate::context::GenerationContext;
use crate::dialect::{render_statement, Dialect};
use crate::error::{DbError, GeneratorError};
use crate::generator::{GeneratorKey, SharedGenerator};
use crate::statements::EntityStatement;

/// A database connection that hands out statement handles
pub trait SqlConnection {
    type Statement: StatementHandle;

    fn create_statement(&mut self) -> Result<Self::Statement, DbError>;
}

/// Executes SQL on a connection
pub trait StatementHandle {
    /// Executes a statement that returns no rows.
    fn execute_update(&mut self, sql: &str) -> Result<usize, DbError>;

    /// Reads a single numeric value.
    ///
    /// Returns `Ok(None)` if the query returned no row and `Ok(Some(None))` if
    /// the value was NULL.
    fn query_current_value(&mut self, sql: &str) -> Result<Option<Option<i64>>, DbError>;

    fn close(self) -> Result<(), DbError>
    where
        Self: Sized;
}

/// Removes surrounding whitespace and `;`, except for the `;` of an `END;`
/// that closes a block.
pub fn trim_statement(sql: &str) -> &str {
    let sql = sql.trim_start_matches(|c: char| c == ';' || c.is_whitespace());
    let mut end = sql.len();
    while let Some(c) = sql[..end].chars().next_back() {
        if c == ';' {
            if ends_with_end_keyword(&sql[..end]) {
                break;
            }
        } else if !c.is_whitespace() {
            break;
        }
        end -= c.len_utf8();
    }
    &sql[..end]
}

fn ends_with_end_keyword(sql: &str) -> bool {
    const END_KEYWORD: &str = "end;";
    let start = sql.len().saturating_sub(END_KEYWORD.len());
    sql.len() >= END_KEYWORD.len()
        && sql.is_char_boundary(start)
        && sql[start..].eq_ignore_ascii_case(END_KEYWORD)
}

fn full_query() -> &'static Regex {
    static FULL_QUERY: OnceLock<Regex> = OnceLock::new();
    FULL_QUERY.get_or_init(|| Regex::new(r"(?is)^\(SELECT\W.*\)$").expect("valid pattern"))
}

/// Builds the query that reads the current value of a counter from the
/// expression a generator renders for it.
pub fn probe_query(expression: &str, dialect: &dyn Dialect) -> String {
    if full_query().is_match(expression) {
        return expression[1..expression.len() - 1].to_string();
    }
    format!(
        "SELECT ({}) AS current_value {}",
        expression,
        dialect.optional_table()
    )
    .trim_end()
    .to_string()
}

/// Writes all statements to a database connection.
///
/// Before any statement is written, the generators of the context are
/// synchronized with the counters in the database, so the generated ids
/// continue after the ids that exist already.
pub struct ConnectedWriter<S: StatementHandle> {
    /// Used to execute all SQL statements.
    statement: S,
    dialect: Rc<dyn Dialect>,
    strict_generator_sync: bool,
    log_interval: Duration,
    last_log_time: Option<Instant>,
    statements_count: u64,
    synchronized: HashSet<GeneratorKey>,
}

impl<S: StatementHandle> ConnectedWriter<S> {
    /// Opens the statement handle of the run and synchronizes all generators
    /// that were discovered in `context` up to now.
    pub fn new<C>(connection: &mut C, context: &GenerationContext) -> Result<Self, GeneratorError>
    where
        C: SqlConnection<Statement = S>,
    {
        let statement = connection
            .create_statement()
            .map_err(GeneratorError::Connection)?;
        let config = context.config();
        let mut writer = Self {
            statement,
            dialect: context.dialect(),
            strict_generator_sync: config.strict_generator_sync,
            log_interval: config.progress_interval(),
            last_log_time: None,
            statements_count: 0,
            synchronized: HashSet::new(),
        };
        if let Err(e) = writer.synchronize_generators(context) {
            writer.release();
            return Err(e);
        }
        Ok(writer)
    }

    /// The count of statements that were executed up to now.
    pub fn statements_count(&self) -> u64 {
        self.statements_count
    }

    /// Synchronizes every generator of `context` that was not synchronized
    /// by this writer before.
    ///
    /// Needs to be called again if generators are discovered after the writer
    /// was created, before they create their first value.
    pub fn synchronize_generators(&mut self, context: &GenerationContext) -> Result<(), GeneratorError> {
        if context.write_relative_ids() {
            return Ok(());
        }
        for (key, generator) in context.generators() {
            if self.synchronized.contains(key) {
                continue;
            }
            self.synchronize_generator(key, generator)?;
            self.synchronized.insert(key.clone());
        }
        Ok(())
    }

    fn synchronize_generator(
        &mut self,
        key: &GeneratorKey,
        generator: &SharedGenerator,
    ) -> Result<(), GeneratorError> {
        let (sql, current_value) = {
            let generator = generator.borrow();
            let current_value = generator.current_value();
            let expression = generator.get_expression(None, None, current_value, false);
            (probe_query(&expression, self.dialect.as_ref()), current_value)
        };

        let value = self
            .statement
            .query_current_value(&sql)
            .map_err(|e| GeneratorError::GeneratorSync {
                sql: sql.clone(),
                reason: e.to_string(),
            })?;

        match value {
            Some(Some(value)) => {
                generator.borrow_mut().set_current_value(value)?;
                debug!(generator = %key, current_value = value, "synchronized generator");
            }
            _ if self.strict_generator_sync => {
                return Err(GeneratorError::GeneratorSync {
                    sql,
                    reason: "query returned no value".to_string(),
                });
            }
            _ => {
                warn!(
                    generator = %key,
                    %sql,
                    "generator query returned no value, keeping {}",
                    current_value
                );
            }
        }
        Ok(())
    }

    /// Writes the alignment statements and releases the statement handle.
    ///
    /// Returns the count of executed statements.
    pub fn close(mut self, context: &GenerationContext) -> Result<u64, GeneratorError> {
        info!("{} SQL statements successfully executed", self.statements_count);
        let result = finish(context, &mut self);
        let count = self.statements_count;
        self.release();
        result.map(|()| count)
    }

    fn release(self) {
        if let Err(e) = self.statement.close() {
            // Only happens if an earlier statement failed already
            debug!(error = %e, "ignoring failure while closing statement");
        }
    }
}

impl<S: StatementHandle> StatementsWriter for ConnectedWriter<S> {
    fn write_statement(&mut self, stmt: &EntityStatement) -> Result<(), GeneratorError> {
        let rendered = render_statement(self.dialect.as_ref(), stmt);
        let sql = trim_statement(&rendered);
        self.statement
            .execute_update(sql)
            .map_err(|source| GeneratorError::Execution {
                sql: sql.to_string(),
                source,
            })?;
        self.statements_count += 1;

        let now = Instant::now();
        let due = self
            .last_log_time
            .map_or(true, |last| now.duration_since(last) >= self.log_interval);
        if due {
            self.last_log_time = Some(now);
            if self.statements_count > 1 {
                info!("{} SQL statements executed", self.statements_count);
            }
        }
        Ok(())
    }

    fn write_comment(&mut self, _comment: &str) -> Result<(), GeneratorError> {
        // The database is not interested in comments
        Ok(())
    }

    fn write_section_separator(&mut self) -> Result<(), GeneratorError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{OracleDialect, PostgresDialect};

    #[test]
    fn test_trim_statement() {
        assert_eq!(
            trim_statement("INSERT INTO t VALUES (1);"),
            "INSERT INTO t VALUES (1)"
        );
        assert_eq!(trim_statement("  ;UPDATE t SET a = 1 ;\n ; "), "UPDATE t SET a = 1");
        assert_eq!(trim_statement("BEGIN ... END;"), "BEGIN ... END;");
        assert_eq!(trim_statement("begin null; end;\n"), "begin null; end;");
        assert_eq!(trim_statement(" ; "), "");
        assert_eq!(trim_statement("SELECT 'é';"), "SELECT 'é'");
    }

    #[test]
    fn test_probe_for_full_query() {
        assert_eq!(
            probe_query("(SELECT MAX(id) FROM book)", &PostgresDialect),
            "SELECT MAX(id) FROM book"
        );
    }

    #[test]
    fn test_probe_wraps_formula() {
        assert_eq!(
            probe_query("nextval('s') - 1", &PostgresDialect),
            "SELECT (nextval('s') - 1) AS current_value"
        );
        assert_eq!(
            probe_query("s.currval", &OracleDialect),
            "SELECT (s.currval) AS current_value FROM DUAL"
        );
    }
}
