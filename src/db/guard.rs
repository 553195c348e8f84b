//! Statement-level inspection of SQL text.
//!
//! - `is_read_only` guards the `ask --execute` path; evaluation itself runs
//!   whatever it is given
//! - `split_statements` breaks a multi-statement batch apart for the runner

use crate::types::{EvalError, Result};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;
use sqlparser::tokenizer::{Token, Tokenizer};

/// Check whether SQL consists only of plain queries.
///
/// `SELECT ... INTO`, locking clauses (`FOR UPDATE`) and every non-query
/// statement are rejected.
///
/// # Errors
///
/// Returns `EvalError::ParseError` if the SQL does not parse
pub fn is_read_only(sql: &str) -> Result<bool> {
    let statements = Parser::parse_sql(&PostgreSqlDialect {}, sql)
        .map_err(|e| EvalError::ParseError(e.to_string()))?;

    Ok(!statements.is_empty()
        && statements.iter().all(|statement| match statement {
            Statement::Query(query) => query_is_read_only(query),
            _ => false,
        }))
}

fn query_is_read_only(query: &Query) -> bool {
    if !query.locks.is_empty() {
        return false;
    }
    if let Some(with) = &query.with {
        if !with.cte_tables.iter().all(|cte| query_is_read_only(&cte.query)) {
            return false;
        }
    }
    set_expr_is_read_only(&query.body)
}

fn set_expr_is_read_only(body: &SetExpr) -> bool {
    match body {
        SetExpr::Select(select) => select.into.is_none(),
        SetExpr::Query(query) => query_is_read_only(query),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_is_read_only(left) && set_expr_is_read_only(right)
        }
        SetExpr::Values(_) | SetExpr::Table(_) => true,
        _ => false,
    }
}

/// Split SQL text into statements at top-level semicolons.
///
/// Semicolons inside string literals, quoted identifiers and comments do not
/// split. Comment-only fragments are dropped. Text that does not tokenize is
/// returned whole so the database reports the error.
///
/// # Returns
///
/// Trimmed statements without their terminating semicolons
pub fn split_statements(sql: &str) -> Vec<String> {
    let tokens = match Tokenizer::new(&PostgreSqlDialect {}, sql)
        .with_unescape(false)
        .tokenize()
    {
        Ok(tokens) => tokens,
        Err(_) => return vec![sql.trim().to_string()],
    };

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_content = false;

    for token in tokens {
        match token {
            Token::SemiColon => {
                if has_content {
                    statements.push(current.trim().to_string());
                }
                current.clear();
                has_content = false;
            }
            Token::Whitespace(_) => current.push_str(&token.to_string()),
            Token::EOF => {}
            other => {
                current.push_str(&other.to_string());
                has_content = true;
            }
        }
    }
    if has_content {
        statements.push(current.trim().to_string());
    }

    statements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_queries_are_read_only() {
        assert!(is_read_only("SELECT name FROM customers WHERE city = 'New York';").unwrap());
        assert!(is_read_only(
            "WITH ny AS (SELECT * FROM customers WHERE city = 'New York') SELECT COUNT(*) FROM ny"
        )
        .unwrap());
        assert!(is_read_only("SELECT 1 UNION ALL SELECT 2").unwrap());
    }

    #[test]
    fn test_writes_are_rejected() {
        assert!(!is_read_only("DELETE FROM customers").unwrap());
        assert!(!is_read_only("INSERT INTO customers (name) VALUES ('x')").unwrap());
        assert!(!is_read_only("DROP TABLE customers").unwrap());
        assert!(!is_read_only("SELECT * INTO backup FROM customers").unwrap());
        assert!(!is_read_only("SELECT * FROM customers FOR UPDATE").unwrap());
    }

    #[test]
    fn test_mixed_batch_rejected() {
        assert!(!is_read_only("SELECT 1; DELETE FROM customers").unwrap());
    }

    #[test]
    fn test_unparseable_sql_errors() {
        assert!(matches!(
            is_read_only("SELEC name FORM customers"),
            Err(EvalError::ParseError(_))
        ));
    }

    #[test]
    fn test_split_batch() {
        assert_eq!(
            split_statements("SELECT 1 AS n;\nSELECT COUNT(*) FROM customers;"),
            vec!["SELECT 1 AS n", "SELECT COUNT(*) FROM customers"]
        );
        assert_eq!(split_statements("SELECT 1;  \n"), vec!["SELECT 1"]);
        assert!(split_statements("  ;; ").is_empty());
    }

    #[test]
    fn test_split_ignores_quoted_semicolons() {
        assert_eq!(
            split_statements("SELECT ';' AS s, 'it''s' AS t; SELECT 2"),
            vec!["SELECT ';' AS s, 'it''s' AS t", "SELECT 2"]
        );
        assert_eq!(split_statements("SELECT \"a;b\" FROM t"), vec!["SELECT \"a;b\" FROM t"]);
    }

    #[test]
    fn test_split_drops_comment_only_fragments() {
        assert_eq!(
            split_statements("SELECT 1; -- trailing note\n"),
            vec!["SELECT 1"]
        );
    }

    #[test]
    fn test_split_untokenizable_returned_whole() {
        assert_eq!(split_statements(" SELECT 'open "), vec!["SELECT 'open"]);
    }
}
