//! Request and response types for chapter generation.

use crate::ModelConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Everything the backend needs to turn one chunk into a chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterRequest {
    /// Chapter number the result will carry
    pub chapter_number: u32,
    /// Flattened transcript of the chunk
    pub transcript: String,
    /// Distinct message authors, in order of first appearance
    pub participants: Vec<String>,
    /// Model to use
    pub model: ModelConfig,
    /// JSON schema of the expected output
    pub schema: JsonValue,
}

/// Raw backend output, before normalization and parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ChapterResponse {
    /// Free text that should contain a JSON object
    Text(String),
    /// Already-structured JSON
    Json(JsonValue),
}
