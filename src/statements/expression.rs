//! Column values inside a statement.

use crate::dialect::Dialect;

/// A renderable SQL value
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnExpression {
    Number(i64),
    Decimal(f64),
    Text(String),
    Bool(bool),
    Null,
    /// SQL text that is written as is (function calls, sub selects, arithmetic).
    Formula(String),
}

impl ColumnExpression {
    pub fn literal(value: i64) -> Self {
        ColumnExpression::Number(value)
    }

    pub fn text(value: impl Into<String>) -> Self {
        ColumnExpression::Text(value.into())
    }

    pub fn formula(sql: impl Into<String>) -> Self {
        ColumnExpression::Formula(sql.into())
    }

    /// Renders this expression with the literal rules of the dialect.
    pub fn to_sql(&self, dialect: &dyn Dialect) -> String {
        match self {
            ColumnExpression::Number(n) => n.to_string(),
            ColumnExpression::Decimal(d) => d.to_string(),
            ColumnExpression::Text(s) => dialect.quote_string(s),
            ColumnExpression::Bool(b) => dialect.format_bool(*b).to_string(),
            ColumnExpression::Null => "NULL".to_string(),
            ColumnExpression::Formula(sql) => sql.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySqlDialect, OracleDialect, PostgresDialect};

    #[test]
    fn test_render_literals() {
        let pg = PostgresDialect;
        assert_eq!(ColumnExpression::literal(41).to_sql(&pg), "41");
        assert_eq!(ColumnExpression::text("O'Brien").to_sql(&pg), "'O''Brien'");
        assert_eq!(ColumnExpression::Bool(true).to_sql(&pg), "TRUE");
        assert_eq!(ColumnExpression::Null.to_sql(&pg), "NULL");
        assert_eq!(
            ColumnExpression::formula("nextval('seq')").to_sql(&pg),
            "nextval('seq')"
        );
    }

    #[test]
    fn test_render_dialect_specific_literals() {
        assert_eq!(ColumnExpression::Bool(false).to_sql(&OracleDialect), "0");
        assert_eq!(
            ColumnExpression::text("C:\\tmp").to_sql(&MySqlDialect),
            "'C:\\\\tmp'"
        );
    }
}
