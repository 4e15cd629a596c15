// ABOUTME: HTTP transport for the Gemini GenerateContent endpoints. The model
// ABOUTME: travels in the URL; streaming uses streamGenerateContent with SSE.

use async_trait::async_trait;
use tracing::debug;

use super::{ChunkStream, Transport, check_status, env_key, http_client, sse_stream};
use crate::error::TransportError;
use crate::provider::{GeminiError, GeminiRequest, GeminiResponse};

const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Transport for the Google Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiTransport {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiTransport {
    /// Create a transport with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
            http: http_client()?,
        })
    }

    /// Create a transport from the environment.
    /// Checks GEMINI_API_KEY first, then falls back to GOOGLE_API_KEY.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(env_key(&["GEMINI_API_KEY", "GOOGLE_API_KEY"])?)
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str, stream: bool) -> String {
        let model = model.strip_prefix("models/").unwrap_or(model);
        let method = if stream {
            "streamGenerateContent?alt=sse"
        } else {
            "generateContent"
        };
        format!(
            "{}/models/{}:{}",
            self.base_url,
            urlencoding::encode(model),
            method
        )
    }

    async fn post(
        &self,
        request: &GeminiRequest,
        stream: bool,
    ) -> Result<reqwest::Response, TransportError> {
        if request.model.is_empty() {
            return Err(TransportError::Configuration(
                "Gemini request has no model".to_string(),
            ));
        }
        debug!(model = %request.model, stream, "POST generateContent");
        let response = self
            .http
            .post(self.endpoint(&request.model, stream))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;
        check_status(response, |body| {
            serde_json::from_str::<GeminiError>(body)
                .ok()
                .map(|e| e.error.message)
        })
        .await
    }
}

#[async_trait]
impl Transport for GeminiTransport {
    type Request = GeminiRequest;
    type Response = GeminiResponse;
    type Chunk = GeminiResponse;

    async fn send(&self, request: &GeminiRequest) -> Result<GeminiResponse, TransportError> {
        Ok(self.post(request, false).await?.json().await?)
    }

    async fn send_stream(
        &self,
        request: &GeminiRequest,
    ) -> Result<ChunkStream<GeminiResponse>, TransportError> {
        let response = self.post(request, true).await?;
        Ok(sse_stream("gemini", response))
    }
}
