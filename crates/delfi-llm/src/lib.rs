// OpenAI-backed implementations of the gateway's LLM seams: SQL
// generation, database selection, and result validation, all sharing
// one chat-completions client.

pub mod client;
pub mod generator;
mod prompts;
pub mod result_validator;
pub mod selector;

pub use client::{ChatClient, ChatMessage, Completion, CompletionOptions};
pub use generator::OpenAiSqlGenerator;
pub use result_validator::LlmResultValidator;
pub use selector::LlmDatabaseSelector;
