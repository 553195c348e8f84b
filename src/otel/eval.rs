//! Evaluation and LLM call instrumentation.
//!
//! Uses INTERNAL span kind for per-case evaluation and CLIENT kind for
//! outbound LLM requests.

use tracing::{field, span, Level, Span};

/// Longest question prefix attached to a span.
const QUESTION_PREVIEW_CHARS: usize = 80;

/// Create span for evaluating one test case.
///
/// # Arguments
///
/// * `case_index` - 1-based position in the batch
/// * `question` - Natural language question (truncated in the span)
///
/// # Example
///
/// ```rust,ignore
/// let span = eval_span(1, &case.question);
/// let evaluation = evaluator.evaluate_case(case, generator).instrument(span).await;
/// ```
pub fn eval_span(case_index: usize, question: &str) -> Span {
    let preview: String = question.chars().take(QUESTION_PREVIEW_CHARS).collect();

    span!(
        Level::INFO,
        "eval.case",
        otel.name = %format!("eval case {}", case_index),
        otel.kind = "internal",
        eval.case.index = case_index,
        eval.case.question = %preview,
        eval.exact_match = field::Empty,
        eval.execution_match = field::Empty,
    )
}

/// Record both scores on the current span.
pub fn record_eval_scores(exact_match: f64, execution_match: f64) {
    let span = Span::current();
    span.record("eval.exact_match", exact_match);
    span.record("eval.execution_match", execution_match);
}

/// Create span for one LLM request.
///
/// # Arguments
///
/// * `provider` - Provider name (`openrouter`, `openai`, `anthropic`)
/// * `model` - Model identifier
/// * `attempt` - 1-based attempt number
pub fn llm_span(provider: &str, model: &str, attempt: usize) -> Span {
    span!(
        Level::INFO,
        "llm.request",
        otel.name = %format!("chat {}", model),
        otel.kind = "client",
        gen_ai.system = provider,
        gen_ai.request.model = model,
        llm.attempt = attempt,
    )
}
