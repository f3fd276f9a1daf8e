//! Backend model selection.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

/// Which model the generation backend should use, and how.
///
/// May be swapped while a run is paused; the next unit picks it up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), build_fn(error = "chronicle_error::BuilderError"))]
pub struct ModelConfig {
    /// Model identifier
    pub name: String,
    /// Sampling temperature
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[builder(default, setter(strip_option))]
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ModelConfig {
    /// Model config with backend defaults for sampling.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            temperature: None,
            max_tokens: None,
        }
    }
}
