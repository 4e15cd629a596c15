// ABOUTME: HTTP transport for the Anthropic Messages endpoint.
// ABOUTME: Streams raw Claude events over SSE.

use async_trait::async_trait;
use tracing::debug;

use super::{ChunkStream, Transport, check_status, env_key, http_client, sse_stream};
use crate::error::TransportError;
use crate::provider::{ClaudeError, ClaudeRequest, ClaudeResponse, ClaudeStreamEvent};

const CLAUDE_DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Transport for the Anthropic API.
#[derive(Debug, Clone)]
pub struct ClaudeTransport {
    api_key: String,
    base_url: String,
    http: reqwest::Client,
}

impl ClaudeTransport {
    /// Create a transport with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TransportError> {
        Ok(Self {
            api_key: api_key.into(),
            base_url: CLAUDE_DEFAULT_BASE_URL.to_string(),
            http: http_client()?,
        })
    }

    /// Create a transport from `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self, TransportError> {
        Self::new(env_key(&["ANTHROPIC_API_KEY"])?)
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    async fn post(&self, request: &ClaudeRequest) -> Result<reqwest::Response, TransportError> {
        debug!(model = %request.model, stream = request.stream, "POST messages");
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(request)
            .send()
            .await?;
        check_status(response, |body| {
            serde_json::from_str::<ClaudeError>(body)
                .ok()
                .map(|e| format!("{}: {}", e.error.error_type, e.error.message))
        })
        .await
    }
}

#[async_trait]
impl Transport for ClaudeTransport {
    type Request = ClaudeRequest;
    type Response = ClaudeResponse;
    type Chunk = ClaudeStreamEvent;

    async fn send(&self, request: &ClaudeRequest) -> Result<ClaudeResponse, TransportError> {
        Ok(self.post(request).await?.json().await?)
    }

    async fn send_stream(
        &self,
        request: &ClaudeRequest,
    ) -> Result<ChunkStream<ClaudeStreamEvent>, TransportError> {
        let response = self.post(request).await?;
        Ok(sse_stream("claude", response))
    }
}
