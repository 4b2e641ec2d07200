// src/llm/mod.rs
pub mod client;
pub mod models;

pub use client::{CompletionService, OpenAiClient};
pub use models::{ChatMessage, CompletionRequest};
