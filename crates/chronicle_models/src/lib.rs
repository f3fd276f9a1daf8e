//! Generation backends for Chronicle.
//!
//! Provides [`OpenAiChapterGenerator`], a [`ChapterGenerator`](chronicle_interface::ChapterGenerator)
//! for any server exposing the OpenAI-compatible `/v1/chat/completions` endpoint
//! (OpenAI, vLLM, mistral.rs, llama.cpp server, ...).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod prompt;
mod request;
mod response;

pub use client::OpenAiChapterGenerator;
pub use config::BackendConfig;
pub use prompt::{SYSTEM_PROMPT, build_user_prompt};
pub use request::{ChatCompletionRequest, JsonSchemaFormat, Message, ResponseFormat};
pub use response::{ChatCompletionResponse, Choice, ChoiceMessage};
