// ABOUTME: HTTP transport for the OpenAI Chat Completions endpoint, including
// ABOUTME: compatible servers reached through a custom base URL.

use async_trait::async_trait;
use tracing::debug;

use super::{ChunkStream, Transport, check_status, env_key, http_client, sse_stream};
use crate::error::TransportError;
use crate::provider::{OpenAIError, OpenAIRequest, OpenAIResponse, OpenAIStreamChunk};

const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Transport for the OpenAI API.
#[derive(Debug, Clone)]
pub struct OpenAITransport {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAITransport {
    /// Create a transport with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: OPENAI_DEFAULT_BASE_URL.to_string(),
            http: http_client()?,
        })
    }

    /// Create a transport from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(env_key(&["OPENAI_API_KEY"])?)
    }

    /// Override the base URL, e.g. for a compatible server.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn post(&self, request: &OpenAIRequest) -> Result<reqwest::Response, TransportError> {
        debug!(model = %request.model, stream = request.stream, "POST chat/completions");
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        check_status(response, |body| {
            serde_json::from_str::<OpenAIError>(body)
                .ok()
                .map(|e| e.error.message)
        })
        .await
    }
}

#[async_trait]
impl Transport for OpenAITransport {
    type Request = OpenAIRequest;
    type Response = OpenAIResponse;
    type Chunk = OpenAIStreamChunk;

    async fn send(&self, request: &OpenAIRequest) -> Result<OpenAIResponse, TransportError> {
        Ok(self.post(request).await?.json().await?)
    }

    async fn send_stream(
        &self,
        request: &OpenAIRequest,
    ) -> Result<ChunkStream<OpenAIStreamChunk>, TransportError> {
        let response = self.post(request).await?;
        Ok(sse_stream("openai", response))
    }
}
