//! Connection settings for OpenAI-compatible backends.

use chronicle_error::{ModelsError, ModelsErrorKind};

/// Connection settings for an OpenAI-compatible server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackendConfig {
    /// Base URL of the server (e.g., "https://api.openai.com")
    pub base_url: String,
    /// Optional bearer token
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Create a new backend configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads:
    /// - `CHRONICLE_API_BASE_URL` (default: "https://api.openai.com")
    /// - `CHRONICLE_API_KEY` (optional; local servers usually need none)
    pub fn from_env() -> Result<Self, ModelsError> {
        let base_url = std::env::var("CHRONICLE_API_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com".to_string());
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ModelsError::new(ModelsErrorKind::Configuration(format!(
                "CHRONICLE_API_BASE_URL must be an http(s) URL, got '{}'",
                base_url
            ))));
        }
        let api_key = std::env::var("CHRONICLE_API_KEY").ok();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Set the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Chat completions endpoint
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
