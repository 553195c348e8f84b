//! LLM-backed SQL generation.
//!
//! Provides:
//! - Chat client for OpenRouter, OpenAI and Anthropic
//! - Prompt construction and schema-confirmation parsing
//! - SQL extraction from free-form model output
//! - The `SqlGenerator` boundary used by the evaluator

pub mod client;
pub mod extract;
pub mod generator;
pub mod prompt;

pub use client::{ChatMessage, ChatModel, ChatRole, LlmClient};
pub use extract::extract_sql;
pub use generator::{LlmSqlGenerator, SqlGenerator};
pub use prompt::{
    format_schema_for_display, parse_schema_corrections, schema_confirmation_prompt,
    schema_context, sql_generation_prompt, SchemaReview,
};
