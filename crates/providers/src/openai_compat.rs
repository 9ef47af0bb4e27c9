//! OpenAI-compatible local inference server client.
//!
//! Works with llama.cpp's `llama-server`, Ollama, LM Studio, vLLM and any
//! server exposing the OpenAI `/v1` surface:
//! - `POST {base}/completions` for text generation
//! - `POST {base}/embeddings` for embeddings
//! - `GET {base}/models` as the load / warm-up probe

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sidekick_config::ModelConfig;
use sidekick_core::{GenerateRequest, GenerateResponse, ModelError, ModelService};
use std::time::Duration;
use tracing::{debug, warn};

pub struct OpenAiCompatModel {
    base_url: String,
    model: String,
    embedding_model: Option<String>,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatModel {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            embedding_model: None,
            api_key: None,
            client,
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, ModelError> {
        Ok(Self::new(
            &config.base_url,
            &config.model,
            Duration::from_secs(config.request_timeout_secs),
        )?
        .with_embedding_model(config.embedding_model.clone())
        .with_api_key(config.api_key.clone()))
    }

    /// Model used for `/embeddings`. Defaults to the generation model.
    pub fn with_embedding_model(mut self, model: Option<String>) -> Self {
        self.embedding_model = model;
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key.filter(|k| !k.is_empty());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or(&self.model)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn completion_body<'a>(&'a self, request: &'a GenerateRequest) -> CompletionRequest<'a> {
        CompletionRequest {
            model: &self.model,
            prompt: &request.prompt,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stop: (!request.stop.is_empty()).then_some(request.stop.as_slice()),
            stream: false,
        }
    }

    async fn post_json<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ModelError> {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .authorize(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %url, body = %message, "Model server returned error");
            return Err(ModelError::Api {
                status_code: status.as_u16(),
                message,
            });
        }

        response.json::<R>().await.map_err(|e| ModelError::Api {
            status_code: status.as_u16(),
            message: format!("Failed to parse response: {e}"),
        })
    }
}

#[async_trait]
impl ModelService for OpenAiCompatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn load(&self) -> Result<(), ModelError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ModelError::LoadFailed(format!("{url}: {e}")))?;

        if !response.status().is_success() {
            return Err(ModelError::LoadFailed(format!(
                "{url} returned status {}",
                response.status().as_u16()
            )));
        }
        debug!(model = %self.model, %url, "Model server is ready");
        Ok(())
    }

    async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ModelError> {
        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            max_tokens = request.max_tokens,
            "Sending completion request"
        );
        let response: CompletionResponse = self
            .post_json("completions", &self.completion_body(&request))
            .await?;
        response.into_generate_response()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, ModelError> {
        let body = EmbeddingRequest {
            model: self.embedding_model(),
            input: text,
        };
        let response: EmbeddingResponse = self.post_json("embeddings", &body).await?;
        response.into_embedding()
    }
}

// ── Wire types ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    completion_tokens: Option<u32>,
}

impl CompletionResponse {
    fn into_generate_response(self) -> Result<GenerateResponse, ModelError> {
        let choice = self
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::Generation("no choices in response".into()))?;
        Ok(GenerateResponse {
            text: choice.text,
            tokens_generated: self.usage.and_then(|u| u.completion_tokens),
        })
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_embedding(self) -> Result<Vec<f32>, ModelError> {
        self.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ModelError::Embedding("no embedding in response".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> OpenAiCompatModel {
        OpenAiCompatModel::new("http://127.0.0.1:8080/v1/", "phi-3-mini", Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn trims_trailing_slash() {
        assert_eq!(model().base_url(), "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn completion_body_shape() {
        let m = model();
        let mut request = GenerateRequest::new("Hello");
        request.max_tokens = 64;
        let body = serde_json::to_value(m.completion_body(&request)).unwrap();
        assert_eq!(body["model"], "phi-3-mini");
        assert_eq!(body["prompt"], "Hello");
        assert_eq!(body["max_tokens"], 64);
        assert_eq!(body["stream"], false);
        assert!(body.get("stop").is_none());

        request.stop = vec!["\nUser:".into()];
        let body = serde_json::to_value(m.completion_body(&request)).unwrap();
        assert_eq!(body["stop"], json!(["\nUser:"]));
    }

    #[test]
    fn parses_completion_response() {
        let raw = json!({
            "choices": [{"text": "Paris.", "index": 0, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
        });
        let parsed: CompletionResponse = serde_json::from_value(raw).unwrap();
        let response = parsed.into_generate_response().unwrap();
        assert_eq!(response.text, "Paris.");
        assert_eq!(response.tokens_generated, Some(2));
    }

    #[test]
    fn empty_choices_is_a_generation_error() {
        let parsed: CompletionResponse = serde_json::from_value(json!({"choices": []})).unwrap();
        assert!(matches!(
            parsed.into_generate_response(),
            Err(ModelError::Generation(_))
        ));
    }

    #[test]
    fn parses_embedding_response() {
        let raw = json!({"data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}], "model": "nomic"});
        let parsed: EmbeddingResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.into_embedding().unwrap(), vec![0.1, 0.2, 0.3]);

        let empty: EmbeddingResponse = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(matches!(empty.into_embedding(), Err(ModelError::Embedding(_))));
    }

    #[test]
    fn embedding_model_defaults_to_generation_model() {
        let m = model();
        assert_eq!(m.embedding_model(), "phi-3-mini");
        let m = m.with_embedding_model(Some("nomic-embed".into()));
        assert_eq!(m.embedding_model(), "nomic-embed");
    }

    #[test]
    fn from_config_copies_settings() {
        let config = ModelConfig {
            api_key: Some(String::new()),
            ..ModelConfig::default()
        };
        let m = OpenAiCompatModel::from_config(&config).unwrap();
        assert_eq!(m.base_url(), config.base_url.trim_end_matches('/'));
        assert!(m.api_key.is_none());
    }
}
