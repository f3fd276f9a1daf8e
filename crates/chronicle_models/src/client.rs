use crate::{
    BackendConfig, ChatCompletionRequest, ChatCompletionResponse, Message, ResponseFormat,
    SYSTEM_PROMPT, build_user_prompt,
};
use async_trait::async_trait;
use chronicle_core::{ChapterRequest, ChapterResponse};
use chronicle_error::{ChronicleResult, ModelsError, ModelsErrorKind};
use chronicle_interface::ChapterGenerator;
use tracing::instrument;

/// Chapter generator backed by an OpenAI-compatible chat completions server.
#[derive(Debug, Clone)]
pub struct OpenAiChapterGenerator {
    config: BackendConfig,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiChapterGenerator {
    /// Create a generator for the given server.
    #[instrument(skip(config, default_model), fields(base_url = %config.base_url))]
    pub fn new(config: BackendConfig, default_model: impl Into<String>) -> Self {
        tracing::debug!("Creating chapter generator client");
        Self {
            config,
            default_model: default_model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Get the backend configuration
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Build the wire request for a chapter.
    pub fn build_request(&self, request: &ChapterRequest) -> ChatCompletionRequest {
        let model = if request.model.name.is_empty() {
            self.default_model.clone()
        } else {
            request.model.name.clone()
        };

        ChatCompletionRequest {
            model,
            messages: vec![
                Message::system(SYSTEM_PROMPT),
                Message::user(build_user_prompt(request)),
            ],
            max_tokens: request.model.max_tokens,
            temperature: request.model.temperature,
            response_format: Some(ResponseFormat::json_schema(
                "chapter",
                request.schema.clone(),
            )),
        }
    }

    /// Send a chat completion request
    #[instrument(skip(self, request), fields(model = %request.model))]
    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletionResponse, ModelsError> {
        let url = self.config.completions_url();
        tracing::debug!("Sending chat completion request to {}", url);

        let mut req = self.client.post(&url).json(request);
        if let Some(api_key) = &self.config.api_key {
            req = req.bearer_auth(api_key);
        }

        let response = req.send().await.map_err(|e| {
            tracing::warn!("Request failed: {}", e);
            ModelsError::new(ModelsErrorKind::Http(format!("Request failed: {}", e)))
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!(status = status.as_u16(), "Server returned error");
            return Err(ModelsError::new(ModelsErrorKind::Api {
                status: status.as_u16(),
                message,
            }));
        }

        response.json().await.map_err(|e| {
            tracing::warn!("Failed to parse response: {}", e);
            ModelsError::new(ModelsErrorKind::Deserialization(format!(
                "Failed to parse response: {}",
                e
            )))
        })
    }
}

/// Pull the chapter text out of a completion.
pub(crate) fn extract_content(
    response: &ChatCompletionResponse,
) -> Result<ChapterResponse, ModelsError> {
    if let Some(content) = response.first_content() {
        return Ok(ChapterResponse::Text(content.to_string()));
    }
    if let Some(refusal) = response.first_refusal() {
        return Err(ModelsError::new(ModelsErrorKind::Api {
            status: 200,
            message: format!("Model refused: {}", refusal),
        }));
    }
    Err(ModelsError::new(ModelsErrorKind::EmptyResponse))
}

#[async_trait]
impl ChapterGenerator for OpenAiChapterGenerator {
    #[instrument(skip(self, req), fields(chapter = req.chapter_number, model = %req.model.name))]
    async fn generate(&self, req: &ChapterRequest) -> ChronicleResult<ChapterResponse> {
        let request = self.build_request(req);
        let response = self.chat_completion(&request).await?;
        let content = extract_content(&response)?;
        tracing::debug!("Chapter generation successful");
        Ok(content)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }

    fn model_name(&self) -> &str {
        &self.default_model
    }
}
