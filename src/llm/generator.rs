//! SQL generation boundary and its LLM-backed implementation.

use crate::db::DatabaseSchema;
use crate::llm::client::{ChatMessage, ChatModel};
use crate::llm::extract::extract_sql;
use crate::llm::prompt::{sql_generation_prompt, RETRY_PROMPT};
use crate::types::{EvalError, Result};
use async_trait::async_trait;

/// Produces candidate SQL for a natural language question.
#[async_trait]
pub trait SqlGenerator: Send + Sync {
    /// Generate SQL candidates.
    ///
    /// # Returns
    ///
    /// Candidates in preference order; callers use the first
    ///
    /// # Errors
    ///
    /// Returns `EvalError::LlmError` if no SQL could be produced
    async fn generate(&self, question: &str) -> Result<Vec<String>>;
}

/// Generator that prompts a chat model with the database schema.
pub struct LlmSqlGenerator<M> {
    model: M,
    schema: DatabaseSchema,
    max_retries: usize,
}

impl<M: ChatModel> LlmSqlGenerator<M> {
    /// Create generator.
    ///
    /// # Arguments
    ///
    /// * `model` - Chat model to prompt
    /// * `schema` - Schema rendered into every prompt
    /// * `max_retries` - Extra attempts when a response holds no SQL
    pub fn new(model: M, schema: DatabaseSchema, max_retries: usize) -> Self {
        Self {
            model,
            schema,
            max_retries,
        }
    }

    pub fn schema(&self) -> &DatabaseSchema {
        &self.schema
    }

    /// Replace the schema (after user corrections).
    pub fn set_schema(&mut self, schema: DatabaseSchema) {
        self.schema = schema;
    }
}

#[async_trait]
impl<M: ChatModel> SqlGenerator for LlmSqlGenerator<M> {
    async fn generate(&self, question: &str) -> Result<Vec<String>> {
        let question = question.trim();
        if question.is_empty() {
            return Err(EvalError::llm("question is empty"));
        }

        let mut messages = sql_generation_prompt(question, &self.schema);
        let attempts = self.max_retries + 1;

        for attempt in 1..=attempts {
            let response = self.model.chat(&messages, attempt).await?;
            let candidates = extract_sql(&response);

            if !candidates.is_empty() {
                tracing::debug!(attempt, candidates = candidates.len(), "SQL extracted");
                return Ok(candidates);
            }

            tracing::warn!(
                model = self.model.model(),
                attempt,
                "model response contained no SQL"
            );
            messages.push(ChatMessage::assistant(response));
            messages.push(ChatMessage::user(RETRY_PROMPT));
        }

        Err(EvalError::llm(format!(
            "no SQL in model output after {} attempt(s)",
            attempts
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Replays canned responses and records every prompt it sees.
    struct ScriptedModel {
        responses: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedModel {
        fn new(responses: Vec<&'static str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedModel {
        fn model(&self) -> &str {
            "scripted"
        }

        async fn chat(&self, messages: &[ChatMessage], _attempt: usize) -> Result<String> {
            self.prompts.lock().unwrap().push(messages.to_vec());
            self.responses
                .lock()
                .unwrap()
                .pop()
                .map(str::to_string)
                .ok_or_else(|| EvalError::llm("script exhausted"))
        }
    }

    #[tokio::test]
    async fn test_first_response_used() {
        let model = ScriptedModel::new(vec!["```sql\nSELECT COUNT(*) FROM customers;\n```"]);
        let generator = LlmSqlGenerator::new(model, DatabaseSchema::default(), 2);

        let sql = generator.generate("How many customers?").await.unwrap();
        assert_eq!(sql, vec!["SELECT COUNT(*) FROM customers;"]);
        assert_eq!(generator.model.calls(), 1);
    }

    #[tokio::test]
    async fn test_retry_on_malformed_output() {
        let model = ScriptedModel::new(vec![
            "I am not sure what you mean.",
            "SELECT COUNT(*) FROM customers",
        ]);
        let generator = LlmSqlGenerator::new(model, DatabaseSchema::default(), 2);

        let sql = generator.generate("How many customers?").await.unwrap();
        assert_eq!(sql, vec!["SELECT COUNT(*) FROM customers"]);

        let prompts = generator.model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 2);
        let retry = prompts[1].last().unwrap();
        assert_eq!(retry.content, RETRY_PROMPT);
        assert_eq!(prompts[1].len(), prompts[0].len() + 2);
    }

    #[tokio::test]
    async fn test_retries_bounded() {
        let model = ScriptedModel::new(vec!["no", "still no", "nope", "SELECT 1"]);
        let generator = LlmSqlGenerator::new(model, DatabaseSchema::default(), 2);

        let err = generator.generate("How many customers?").await.unwrap_err();
        assert!(matches!(err, EvalError::LlmError(_)));
        assert_eq!(generator.model.calls(), 3);
    }

    #[tokio::test]
    async fn test_empty_question_skips_model() {
        let model = ScriptedModel::new(vec!["SELECT 1"]);
        let generator = LlmSqlGenerator::new(model, DatabaseSchema::default(), 2);

        assert!(generator.generate("   \n").await.is_err());
        assert_eq!(generator.model.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_error_propagates() {
        let model = ScriptedModel::new(vec![]);
        let generator = LlmSqlGenerator::new(model, DatabaseSchema::default(), 2);

        let err = generator.generate("How many customers?").await.unwrap_err();
        assert_eq!(err.to_string(), "LLM SQL generation failed: script exhausted");
    }
}
