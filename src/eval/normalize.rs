//! SQL text normalization for exact-match scoring.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

/// Spaces around `, ; = < > ! + - . / ( ) \ [ ]` carry no meaning.
static PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*([,;=<>!+\-./()\\\[\]])\s*").expect("valid punctuation regex")
});

/// Canonicalize a SQL string for textual comparison.
///
/// # Steps
///
/// 1. Collapse whitespace runs to a single space
/// 2. Trim leading/trailing whitespace
/// 3. Drop spaces adjacent to trivial punctuation
/// 4. Lower-case everything, string literals included
///
/// Lower-casing literals means `WHERE name = 'Bob'` and `WHERE name = 'bob'`
/// normalize identically. That inflates exact match slightly; execution
/// accuracy catches the difference.
///
/// # Examples
///
/// ```
/// use nl2sql_eval::eval::normalize_sql;
///
/// assert_eq!(normalize_sql("SELECT  *\n FROM t "), "select * from t");
/// assert_eq!(normalize_sql("count( * ) , a"), "count(*),a");
/// ```
pub fn normalize_sql(sql: &str) -> String {
    let collapsed = WHITESPACE.replace_all(sql, " ");
    let tightened = PUNCTUATION.replace_all(collapsed.trim(), "$1");
    tightened.to_lowercase()
}

/// Binary exact-match score.
///
/// # Returns
///
/// `1.0` if both queries normalize to the same text, else `0.0`
pub fn exact_match_score(generated_sql: &str, expected_sql: &str) -> f64 {
    if normalize_sql(generated_sql) == normalize_sql(expected_sql) {
        1.0
    } else {
        0.0
    }
}
