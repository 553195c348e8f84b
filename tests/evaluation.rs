//! End-to-end evaluation against in-memory database and generator fakes.

use async_trait::async_trait;
use nl2sql_eval::db::QueryExecutor;
use nl2sql_eval::eval::{normalize_sql, Evaluator, Execution, Mismatch, ResultComparator};
use nl2sql_eval::llm::SqlGenerator;
use nl2sql_eval::types::{CellValue, EvalError, ExecutionFailure, Result, TabularResult, TestCase};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers queries from a table keyed by normalized SQL.
///
/// Unknown SQL fails as a missing relation, like a query against a table
/// that does not exist.
#[derive(Default)]
struct FakeDatabase {
    results: HashMap<String, Execution>,
    reachable: bool,
    executed: AtomicUsize,
}

impl FakeDatabase {
    fn new() -> Self {
        Self {
            reachable: true,
            ..Default::default()
        }
    }

    fn unreachable() -> Self {
        Self::default()
    }

    fn with(mut self, sql: &str, result: Execution) -> Self {
        self.results.insert(normalize_sql(sql), result);
        self
    }

    fn executed(&self) -> usize {
        self.executed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryExecutor for FakeDatabase {
    async fn execute(&self, sql: &str) -> Execution {
        self.executed.fetch_add(1, Ordering::SeqCst);
        self.results
            .get(&normalize_sql(sql))
            .cloned()
            .unwrap_or_else(|| {
                Err(ExecutionFailure::MissingRelation(format!(
                    "no fixture for: {}",
                    sql
                )))
            })
    }

    async fn ping(&self) -> Result<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(EvalError::Connection("connection refused".to_string()))
        }
    }
}

/// Returns a fixed answer per question.
struct FakeGenerator {
    answers: HashMap<String, std::result::Result<String, String>>,
}

impl FakeGenerator {
    fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    fn answer(mut self, question: &str, sql: &str) -> Self {
        self.answers.insert(question.to_string(), Ok(sql.to_string()));
        self
    }

    fn fail(mut self, question: &str, error: &str) -> Self {
        self.answers.insert(question.to_string(), Err(error.to_string()));
        self
    }
}

#[async_trait]
impl SqlGenerator for FakeGenerator {
    async fn generate(&self, question: &str) -> Result<Vec<String>> {
        match self.answers.get(question) {
            Some(Ok(sql)) => Ok(vec![sql.clone()]),
            Some(Err(error)) => Err(EvalError::llm(error.clone())),
            None => Ok(Vec::new()),
        }
    }
}

fn table(columns: &[&str], rows: Vec<Vec<CellValue>>) -> TabularResult {
    TabularResult::new(columns.iter().map(|c| c.to_string()).collect(), rows)
}

fn names(rows: &[(&str, &str)]) -> Vec<Vec<CellValue>> {
    rows.iter()
        .map(|(a, b)| vec![CellValue::from(*a), CellValue::from(*b)])
        .collect()
}

const GENERATED: &str = "SELECT first_name, last_name FROM customers ORDER BY id LIMIT 2";
const EXPECTED: &str = "select last_name, first_name from customers order by id limit 2";

#[tokio::test]
async fn test_customers_column_realignment() {
    let db = FakeDatabase::new()
        .with(
            GENERATED,
            Ok(table(
                &["first_name", "last_name"],
                names(&[("Jane", "Doe"), ("John", "Smith")]),
            )),
        )
        .with(
            EXPECTED,
            Ok(table(
                &["last_name", "first_name"],
                names(&[("Doe", "Jane"), ("Smith", "John")]),
            )),
        );

    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let evaluation = evaluator.compare_sql(GENERATED, EXPECTED).await;

    assert_eq!(evaluation.outcome.exact_match_score, 0.0);
    assert_eq!(evaluation.outcome.execution_match_score, 1.0);
    assert!(evaluation.outcome.mismatch.is_none());
}

#[tokio::test]
async fn test_generated_failure_takes_precedence() {
    let generated = "select count(*) from nonexistent_table";
    let expected = "SELECT COUNT(*) FROM nonexistent_table";
    let db = FakeDatabase::new().with(
        generated,
        Err(ExecutionFailure::MissingRelation(
            "relation \"nonexistent_table\" does not exist".to_string(),
        )),
    );

    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let evaluation = evaluator.compare_sql(generated, expected).await;

    // Same text, so exact match counts even though execution failed
    assert_eq!(evaluation.outcome.exact_match_score, 1.0);
    assert_eq!(evaluation.outcome.execution_match_score, 0.0);
    assert_eq!(evaluation.outcome.mismatch, Some(Mismatch::GeneratedFailed));
    assert!(evaluation
        .outcome
        .error
        .as_deref()
        .unwrap()
        .starts_with("generated query failed"));
}

#[tokio::test]
async fn test_empty_generation_scores_zero_without_executing() {
    let db = FakeDatabase::new().with(
        EXPECTED,
        Ok(table(&["last_name", "first_name"], names(&[("Doe", "Jane")]))),
    );
    let evaluator = Evaluator::new(&db, ResultComparator::default());

    let evaluation = evaluator.compare_sql("   ", EXPECTED).await;

    assert_eq!(evaluation.generated, Err(ExecutionFailure::EmptyQuery));
    assert_eq!(evaluation.outcome.execution_match_score, 0.0);
    assert_eq!(db.executed(), 1);
}

#[tokio::test]
async fn test_batch_accuracy_and_errors() {
    let cases: Vec<TestCase> = (1..=5)
        .map(|i| TestCase::new(format!("question {}", i), format!("SELECT {} AS n", i)))
        .collect();

    let mut db = FakeDatabase::new();
    for i in 1..=5 {
        db = db.with(
            &format!("SELECT {} AS n", i),
            Ok(table(&["n"], vec![vec![CellValue::Integer(i)]])),
        );
    }
    // Different text, same result
    db = db.with(
        "SELECT 1 + 1 AS n",
        Ok(table(&["n"], vec![vec![CellValue::Integer(2)]])),
    );

    let generator = FakeGenerator::new()
        .answer("question 1", "select 1 as n")
        .answer("question 2", "SELECT 1 + 1 AS n")
        .answer("question 3", "SELECT 3 AS n")
        .answer("question 4", "SELECT 4 AS n")
        .fail("question 5", "rate limited");

    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let report = evaluator.run(&cases, &generator).await.unwrap();

    assert_eq!(report.count, 5);
    assert!((report.execution_accuracy - 80.0).abs() < 1e-9);
    assert!((report.exact_match_accuracy - 60.0).abs() < 1e-9);
    assert!(report.to_string().contains("Average Execution Accuracy: 80.00%"));

    let failed = &report.cases[4];
    assert_eq!(failed.generated_sql, "");
    assert_eq!(failed.execution_match_score, 0.0);
    assert!(failed.error.as_deref().unwrap().contains("rate limited"));
    assert_eq!(report.error_count(), 1);
}

#[tokio::test]
async fn test_unreachable_database_aborts_run() {
    let db = FakeDatabase::unreachable();
    let evaluator = Evaluator::new(&db, ResultComparator::default());

    let err = evaluator
        .run(&[TestCase::new("q", "SELECT 1")], &FakeGenerator::new())
        .await
        .unwrap_err();

    assert!(matches!(err, EvalError::Connection(_)));
    assert_eq!(db.executed(), 0);
}

#[tokio::test]
async fn test_empty_batch_reports_zero() {
    let db = FakeDatabase::new();
    let evaluator = Evaluator::new(&db, ResultComparator::default());

    let report = evaluator.run(&[], &FakeGenerator::new()).await.unwrap();

    assert!(report.is_empty());
    assert_eq!(report.execution_accuracy, 0.0);
    assert!(report.to_string().contains("No test cases evaluated"));
}

#[tokio::test]
async fn test_fixture_drift_detected() {
    let case = TestCase::builtin().unwrap().remove(1);
    let generator = FakeGenerator::new().answer(&case.question, &case.expected_sql);

    // AVG returns numeric; the recorded fixture says 37.0
    let live = table(
        &["company", "avg_email_length"],
        vec![vec![CellValue::from("Hart Group"), CellValue::Float(37.0)]],
    );
    let drifted = table(
        &["company", "avg_email_length"],
        vec![vec![CellValue::from("Hart Group"), CellValue::Float(36.5)]],
    );

    let db = FakeDatabase::new().with(&case.expected_sql, Ok(live));
    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let evaluation = evaluator.evaluate_case(&case, &generator).await;
    assert_eq!(evaluation.fixture_matches, Some(true));
    assert_eq!(evaluation.outcome.exact_match_score, 1.0);
    assert_eq!(evaluation.outcome.execution_match_score, 1.0);

    let db = FakeDatabase::new().with(&case.expected_sql, Ok(drifted));
    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let evaluation = evaluator.evaluate_case(&case, &generator).await;
    assert_eq!(evaluation.fixture_matches, Some(false));
    // Scoring uses the live result, so the case still passes
    assert_eq!(evaluation.outcome.execution_match_score, 1.0);
}

#[tokio::test]
async fn test_row_count_mismatch_with_overlap() {
    let rows = |n: usize| -> Vec<Vec<CellValue>> {
        (0..n).map(|i| vec![CellValue::Integer(i as i64)]).collect()
    };
    let db = FakeDatabase::new()
        .with("SELECT id FROM customers LIMIT 4", Ok(table(&["id"], rows(4))))
        .with("SELECT id FROM customers LIMIT 5", Ok(table(&["id"], rows(5))));

    let evaluator = Evaluator::new(&db, ResultComparator::default());
    let evaluation = evaluator
        .compare_sql("SELECT id FROM customers LIMIT 4", "SELECT id FROM customers LIMIT 5")
        .await;

    assert_eq!(evaluation.outcome.execution_match_score, 0.0);
    assert_eq!(
        evaluation.outcome.mismatch,
        Some(Mismatch::RowCount {
            generated: 4,
            expected: 5
        })
    );
}
