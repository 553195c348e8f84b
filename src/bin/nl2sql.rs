//! nl2sql CLI
//!
//! Natural language to PostgreSQL, with dual-metric accuracy evaluation.

use clap::{Parser, Subcommand};
use nl2sql_eval::config::DatabaseConfig;
use nl2sql_eval::db::{is_read_only, DatabaseSchema, PgExecutor, QueryExecutor};
use nl2sql_eval::eval::{Evaluator, Execution, ResultComparator};
use nl2sql_eval::llm::{
    format_schema_for_display, parse_schema_corrections, schema_confirmation_prompt, LlmClient,
    LlmSqlGenerator, SqlGenerator,
};
use nl2sql_eval::otel::init_tracing;
use nl2sql_eval::types::TestCase;
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;

/// Rounds of schema confirmation before falling back to the current schema.
const MAX_CONFIRMATION_ROUNDS: usize = 3;

/// nl2sql - natural language to PostgreSQL with accuracy evaluation
#[derive(Parser)]
#[command(name = "nl2sql")]
#[command(about = "Generate PostgreSQL from natural language and score it by exact match and execution accuracy", long_about = None)]
#[command(version)]
///
/// Database settings come from `DB_*` environment variables unless host,
/// name and user are all given as flags; any flag overrides its variable.
struct Cli {
    /// Database host [env: DB_HOST]
    #[arg(long)]
    db_host: Option<String>,

    /// Database port [env: DB_PORT, default: 5432]
    #[arg(long)]
    db_port: Option<u16>,

    /// Database name [env: DB_NAME]
    #[arg(long)]
    db_name: Option<String>,

    /// Database user [env: DB_USER]
    #[arg(long)]
    db_user: Option<String>,

    /// Database password [env: DB_PASSWORD]
    #[arg(long)]
    db_password: Option<String>,

    /// Connection timeout in seconds [env: DB_CONNECT_TIMEOUT_SECS, default: 10]
    #[arg(long)]
    connect_timeout: Option<u64>,

    /// Per-query timeout in seconds [env: DB_QUERY_TIMEOUT_SECS, default: 30]
    #[arg(long)]
    query_timeout: Option<u64>,

    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected database schema
    Schema {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate SQL for a question
    Ask {
        /// Question in natural language
        question: String,

        /// Run the first generated query (read-only queries only)
        #[arg(long)]
        execute: bool,

        /// Review and correct the detected schema before generating
        #[arg(long)]
        confirm_schema: bool,
    },

    /// Score a generated query against an expected query
    Compare {
        /// Generated SQL
        generated: String,

        /// Expected (gold) SQL
        expected: String,

        /// Decimal places for numeric comparison
        #[arg(long, default_value = "6")]
        precision: u32,
    },

    /// Evaluate a batch of test cases
    Eval {
        /// Test case file (YAML); defaults to the built-in customers suite
        #[arg(long)]
        cases: Option<PathBuf>,

        /// Write the full report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write per-case details as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Decimal places for numeric comparison
        #[arg(long, default_value = "6")]
        precision: u32,

        /// Print every case, not just the summary
        #[arg(long)]
        details: bool,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let executor = PgExecutor::new(database_config(&cli)?);

    match cli.command {
        Commands::Schema { json } => {
            cmd_schema(&executor, json).await?;
        }
        Commands::Ask {
            question,
            execute,
            confirm_schema,
        } => {
            cmd_ask(&executor, &question, execute, confirm_schema).await?;
        }
        Commands::Compare {
            generated,
            expected,
            precision,
        } => {
            cmd_compare(&executor, &generated, &expected, precision).await?;
        }
        Commands::Eval {
            cases,
            json,
            csv,
            precision,
            details,
        } => {
            cmd_eval(&executor, cases, json, csv, precision, details).await?;
        }
    }

    Ok(())
}

/// Resolve connection settings from flags and `DB_*` variables.
fn database_config(cli: &Cli) -> anyhow::Result<DatabaseConfig> {
    let mut config = match (&cli.db_host, &cli.db_name, &cli.db_user) {
        (Some(host), Some(dbname), Some(user)) => DatabaseConfig::new(host, dbname, user),
        _ => DatabaseConfig::from_env()?,
    };

    if let Some(host) = &cli.db_host {
        config.host = host.clone();
    }
    if let Some(dbname) = &cli.db_name {
        config.dbname = dbname.clone();
    }
    if let Some(user) = &cli.db_user {
        config.user = user.clone();
    }
    if let Some(port) = cli.db_port {
        config.port = port;
    }
    if let Some(password) = &cli.db_password {
        config.password = Some(password.clone());
    }
    if let Some(secs) = cli.connect_timeout {
        config.connect_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = cli.query_timeout {
        config.query_timeout = Duration::from_secs(secs);
    }

    Ok(config)
}

/// Build the LLM-backed generator over a schema.
fn llm_generator(schema: DatabaseSchema) -> anyhow::Result<LlmSqlGenerator<LlmClient>> {
    let client = LlmClient::from_env()?;
    let max_retries = client.config().max_retries;
    Ok(LlmSqlGenerator::new(client, schema, max_retries))
}

async fn cmd_schema(executor: &PgExecutor, json: bool) -> anyhow::Result<()> {
    let schema = executor.fetch_schema().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&schema)?);
    } else {
        print!("{}", format_schema_for_display(&schema));
    }

    Ok(())
}

async fn cmd_ask(
    executor: &PgExecutor,
    question: &str,
    execute: bool,
    confirm_schema: bool,
) -> anyhow::Result<()> {
    let mut generator = llm_generator(executor.fetch_schema().await?)?;
    if confirm_schema {
        let schema = confirm_schema_interactively(generator.schema().clone(), question)?;
        generator.set_schema(schema);
    }

    let candidates = generator.generate(question).await?;
    for (i, sql) in candidates.iter().enumerate() {
        println!("-- Candidate {}", i + 1);
        println!("{}", sql);
    }

    if execute {
        let Some(sql) = candidates.first() else {
            anyhow::bail!("No SQL generated");
        };
        if !is_read_only(sql)? {
            anyhow::bail!("Refusing to execute a statement that is not a read-only query");
        }

        println!();
        print_execution(&executor.execute(sql).await);
    }

    Ok(())
}

/// Show the schema and apply corrections typed on stdin until confirmed.
fn confirm_schema_interactively(
    mut schema: DatabaseSchema,
    question: &str,
) -> anyhow::Result<DatabaseSchema> {
    let stdin = std::io::stdin();

    for _ in 0..MAX_CONFIRMATION_ROUNDS {
        println!("{}", schema_confirmation_prompt(&schema, question));

        let mut response = String::new();
        if stdin.lock().read_line(&mut response)? == 0 {
            break;
        }
        if response.trim().is_empty() {
            println!("Please provide a response.");
            continue;
        }

        let review = parse_schema_corrections(&response, &schema);
        if review.confirmed {
            return Ok(review.schema);
        }
        for correction in &review.applied {
            println!("✓ {}", correction);
        }
        schema = review.schema;
    }

    println!(
        "Maximum confirmation rounds ({}) reached, using current schema",
        MAX_CONFIRMATION_ROUNDS
    );
    Ok(schema)
}

async fn cmd_compare(
    executor: &PgExecutor,
    generated: &str,
    expected: &str,
    precision: u32,
) -> anyhow::Result<()> {
    executor.ping().await?;

    let evaluator = Evaluator::new(executor, ResultComparator::new(precision));
    let evaluation = evaluator.compare_sql(generated, expected).await;

    println!("Generated:");
    print_execution(&evaluation.generated);
    println!();
    println!("Expected:");
    print_execution(&evaluation.expected);
    println!();

    let outcome = &evaluation.outcome;
    println!("Exact Match: {:.1}", outcome.exact_match_score);
    println!("Execution Match: {:.1}", outcome.execution_match_score);
    if let Some(mismatch) = &outcome.mismatch {
        println!("  Reason: {}", mismatch);
    }
    if let Some(error) = &outcome.error {
        println!("  Error: {}", error);
    }

    Ok(())
}

async fn cmd_eval(
    executor: &PgExecutor,
    cases: Option<PathBuf>,
    json: Option<PathBuf>,
    csv: Option<PathBuf>,
    precision: u32,
    details: bool,
) -> anyhow::Result<()> {
    let cases = match cases {
        Some(path) => TestCase::load_file(&expand_path(&path))?,
        None => TestCase::builtin()?,
    };

    let generator = llm_generator(executor.fetch_schema().await?)?;

    let evaluator = Evaluator::new(executor, ResultComparator::new(precision));
    let report = evaluator.run(&cases, &generator).await?;

    if details {
        for case in &report.cases {
            println!("Test Case {}: {}", case.index, case.question);
            println!("  Generated: {}", case.generated_sql);
            println!("  Expected:  {}", case.expected_sql);
            println!(
                "  Exact Match: {:.1}  Execution Match: {:.1}",
                case.exact_match_score, case.execution_match_score
            );
            if let Some(mismatch) = &case.mismatch {
                println!("  Reason: {}", mismatch);
            }
            if let Some(error) = &case.error {
                println!("  Error: {}", error);
            }
            if case.fixture_matches == Some(false) {
                println!("  Warning: expected query no longer returns the recorded result");
            }
            println!();
        }
    }

    println!("{}", report);

    if let Some(path) = json {
        let path = expand_path(&path);
        report.write_json(&path)?;
        println!("✓ Report written to {}", path.display());
    }
    if let Some(path) = csv {
        let path = expand_path(&path);
        report.write_csv_file(&path)?;
        println!("✓ Case details written to {}", path.display());
    }

    Ok(())
}

/// Expand `~` in a user-supplied path.
fn expand_path(path: &PathBuf) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

fn print_execution(execution: &Execution) {
    match execution {
        Ok(table) => {
            println!("{}", table.columns.join(" | "));
            for row in &table.rows {
                let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
                println!("{}", cells.join(" | "));
            }
            println!("({} rows)", table.row_count());
        }
        Err(failure) => println!("✗ {}", failure),
    }
}
