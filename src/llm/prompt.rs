//! Prompt construction and schema-confirmation parsing.

use crate::db::DatabaseSchema;
use crate::llm::client::ChatMessage;
use std::fmt::Write as _;

const SYSTEM_PROMPT: &str = "You are an expert SQL developer specialized in writing complex PostgreSQL queries from natural language input.

IMPORTANT PostgreSQL Syntax Rules:
1. Use || for string concatenation, NOT CONCAT()
    - Correct: first_name || ' ' || last_name
    - Incorrect: CONCAT(first_name, ' ', last_name)

2. Use PostgreSQL date arithmetic:
    - CURRENT_DATE - INTERVAL '30 days'
    - '2022-05-20'::date - INTERVAL '30 days'

3. Use PostgreSQL-specific functions when appropriate:
    - DATE_TRUNC() for date truncation
    - EXTRACT() for date parts
    - ROW_NUMBER() OVER() for ranking

4. Only use tables and columns that exist in the provided schema.
5. Return only the SQL query without additional explanation unless requested.";

/// Few-shot (question, answer) pairs shown before the real question.
const FEW_SHOTS: [(&str, &str); 2] = [
    (
        "For each month in the last year, list the top 2 salespeople by total revenue generated.",
        "WITH monthly_revenue AS (
    SELECT
        salesperson_id,
        DATE_TRUNC('month', sale_date) AS sale_month,
        SUM(amount) AS total_revenue
    FROM sales
    WHERE sale_date >= CURRENT_DATE - INTERVAL '1 year'
    GROUP BY salesperson_id, DATE_TRUNC('month', sale_date)
),
ranked_sales AS (
    SELECT *,
            RANK() OVER (PARTITION BY sale_month ORDER BY total_revenue DESC) AS rank
    FROM monthly_revenue
)
SELECT sale_month, salesperson_id, total_revenue
FROM ranked_sales
WHERE rank <= 2
ORDER BY sale_month, rank;",
    ),
    (
        "Show me the full name of customers from the customers table.",
        "SELECT first_name || ' ' || last_name AS full_name
FROM customers;",
    ),
];

/// Follow-up sent when a response contained no SQL.
pub const RETRY_PROMPT: &str =
    "Your previous answer did not contain a SQL query. Reply with only the PostgreSQL query.";

/// Render the schema as prompt context.
///
/// Tables without columns are skipped.
pub fn schema_context(schema: &DatabaseSchema) -> String {
    if schema.is_empty() {
        return "No schema information available.".to_string();
    }

    let mut context = String::new();
    for table in schema.tables.iter().filter(|t| !t.columns.is_empty()) {
        let columns = table.column_names().collect::<Vec<_>>().join(", ");
        let _ = write!(context, "Table: {}\nColumns: {}\n\n", table.name, columns);
    }
    context
}

/// Render the schema for a human, with column types.
pub fn format_schema_for_display(schema: &DatabaseSchema) -> String {
    if schema.is_empty() {
        return "No tables found in the database.".to_string();
    }

    let mut display = String::from("Database Schema Detected:\n\n");
    for table in &schema.tables {
        let _ = writeln!(display, "Table: {}", table.name);
        for column in &table.columns {
            let _ = writeln!(display, "  - {} ({})", column.name, column.data_type);
        }
        display.push('\n');
    }
    display
}

/// Ask the user to confirm or correct the detected schema.
pub fn schema_confirmation_prompt(schema: &DatabaseSchema, question: &str) -> String {
    format!(
        "I need to generate a SQL query for your request: \"{question}\"

First, let me show you the database schema I detected:

{schema}
Please confirm:
1. Are all the tables and columns listed above correct?
2. Are there any missing tables or columns I should know about?
3. Are there any columns listed that don't actually exist?

If everything looks correct, respond with \"CONFIRMED\".

If there are any issues, tell me specifically:
- \"Table X doesn't exist, use Y\"
- \"Column A in Table B doesn't exist, use C\"

Your response:",
        question = question.trim(),
        schema = format_schema_for_display(schema),
    )
}

/// Outcome of a schema-confirmation reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaReview {
    /// Schema after applying corrections (unchanged when confirmed)
    pub schema: DatabaseSchema,
    /// User answered `CONFIRMED`
    pub confirmed: bool,
    /// Human-readable list of applied corrections
    pub applied: Vec<String>,
}

/// Apply a user's schema-confirmation reply.
///
/// `CONFIRMED` (any case) confirms. Otherwise each line is read as one
/// correction:
///
/// - `table X doesn't exist, use Y` renames table X to Y
/// - `column A [in table B] doesn't exist, use C` renames column A to C in
///   every table that has it
///
/// The line kind is decided by whichever of `table` / `column` appears first.
/// Names are lower-cased; lines that do not parse are ignored.
pub fn parse_schema_corrections(response: &str, schema: &DatabaseSchema) -> SchemaReview {
    if response.trim().eq_ignore_ascii_case("CONFIRMED") {
        return SchemaReview {
            schema: schema.clone(),
            confirmed: true,
            applied: Vec::new(),
        };
    }

    let mut updated = schema.clone();
    let mut applied = Vec::new();

    for line in response.lines() {
        let line = line.trim().to_lowercase();
        if !(line.contains("doesn't exist") || line.contains("does not exist")) {
            continue;
        }

        let words: Vec<&str> = line
            .split_whitespace()
            .map(|w| {
                w.trim_matches(|c: char| matches!(c, ',' | '.' | ';' | ':' | '"' | '\'' | '`'))
            })
            .filter(|w| !w.is_empty())
            .collect();

        let Some(kind_at) = words.iter().position(|w| *w == "table" || *w == "column") else {
            continue;
        };
        let Some(old) = words.get(kind_at + 1) else {
            continue;
        };
        let Some(new) = words
            .iter()
            .skip_while(|w| **w != "use")
            .skip(1)
            .find(|w| !matches!(**w, "table" | "column"))
        else {
            continue;
        };

        if words[kind_at] == "table" {
            if updated.rename_table(old, new) {
                applied.push(format!("Renamed table '{}' to '{}'", old, new));
            }
        } else {
            let changed = updated.rename_column(old, new);
            if changed > 0 {
                applied.push(format!(
                    "Renamed column '{}' to '{}' in {} table(s)",
                    old, new, changed
                ));
            }
        }
    }

    SchemaReview {
        schema: updated,
        confirmed: false,
        applied,
    }
}

/// Build the chat prompt for SQL generation.
///
/// # Returns
///
/// System message, two few-shot user/assistant pairs, then the question with
/// the schema context
pub fn sql_generation_prompt(question: &str, schema: &DatabaseSchema) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2 + 2 * FEW_SHOTS.len());
    messages.push(ChatMessage::system(SYSTEM_PROMPT));

    for (user, assistant) in FEW_SHOTS {
        messages.push(ChatMessage::user(user));
        messages.push(ChatMessage::assistant(assistant));
    }

    messages.push(ChatMessage::user(format!(
        "Given the following confirmed schema:

{}

Translate this natural language query into a PostgreSQL SQL statement:
{}

Remember to use PostgreSQL syntax (|| for concatenation, INTERVAL for dates, etc.).",
        schema_context(schema),
        question.trim()
    )));

    messages
}
