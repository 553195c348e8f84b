//! Pull SQL statements out of free-form model output.

use regex::Regex;
use std::sync::LazyLock;

/// Keywords a statement must start with (plain text) or contain (any source).
const SQL_KEYWORDS: [&str; 6] = ["SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "WITH"];

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?i:sql)?\s*(.*?)\s*```").expect("valid fence regex"));

static STATEMENT_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(SELECT|INSERT|UPDATE|DELETE|CREATE|WITH)\b").expect("valid keyword regex")
});

/// Extract SQL candidates from a model response.
///
/// Fenced code blocks (```` ```sql ```` or bare ```` ``` ````) win; the rest
/// of the text is only scanned when there are none. Plain text is split on
/// `;` and statements starting with a SQL keyword are kept, in order and
/// without duplicates.
///
/// # Returns
///
/// Candidates in response order; empty if nothing looks like SQL
///
/// # Examples
///
/// ```
/// use nl2sql_eval::llm::extract_sql;
///
/// let text = "Here you go:\n```sql\nSELECT COUNT(*) FROM customers;\n```";
/// assert_eq!(extract_sql(text), vec!["SELECT COUNT(*) FROM customers;"]);
/// ```
pub fn extract_sql(response: &str) -> Vec<String> {
    let response = response.trim();

    let mut candidates: Vec<String> = FENCED_BLOCK
        .captures_iter(response)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|block| !block.is_empty())
        .collect();

    if candidates.is_empty() {
        for statement in response.split(';').map(str::trim) {
            if STATEMENT_START.is_match(statement) && !candidates.iter().any(|c| c == statement) {
                candidates.push(statement.to_string());
            }
        }
    }

    candidates.retain(|candidate| {
        let upper = candidate.to_uppercase();
        SQL_KEYWORDS.iter().any(|keyword| upper.contains(keyword))
    });
    candidates
}
