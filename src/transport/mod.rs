// ABOUTME: Transport layer - the Transport trait that carries encoded requests
// ABOUTME: to a provider, plus reqwest-based HTTP transports for each provider.

mod claude;
mod gemini;
mod openai;
mod sse;

pub use claude::*;
pub use gemini::*;
pub use openai::*;
pub use sse::*;

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;

use crate::error::TransportError;

/// Stream of decoded provider chunks.
pub type ChunkStream<C> = Pin<Box<dyn Stream<Item = Result<C, TransportError>> + Send>>;

/// Carries one encoded request to a provider.
///
/// Implementations own retries, timeouts and authentication; a step only
/// sees the decoded wire values.
#[async_trait]
pub trait Transport: Send + Sync {
    type Request: Send + Sync;
    type Response: Send;
    type Chunk: Send + 'static;

    /// Send a request and wait for the full response.
    async fn send(&self, request: &Self::Request) -> Result<Self::Response, TransportError>;

    /// Send a streaming request and return its chunks.
    async fn send_stream(
        &self,
        request: &Self::Request,
    ) -> Result<ChunkStream<Self::Chunk>, TransportError>;
}

const USER_AGENT: &str = concat!("stepcodec/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Build the HTTP client shared by every request of one transport.
fn http_client() -> Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()?)
}

/// Read an API key from the first set variable in `names`.
fn env_key(names: &[&str]) -> Result<String, TransportError> {
    names
        .iter()
        .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))
        .ok_or_else(|| {
            TransportError::Configuration(format!(
                "{} environment variable not set",
                names.join(" or ")
            ))
        })
}

/// Turn a non-success response into an API error.
///
/// `message` extracts the provider's error message from the body; the raw
/// body is used when it does not parse.
async fn check_status(
    response: reqwest::Response,
    message: fn(&str) -> Option<String>,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await?;
    Err(TransportError::Api {
        status: status.as_u16(),
        message: message(&body).unwrap_or(body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_key_missing() {
        let err = env_key(&["STEPCODEC_TEST_UNSET_A", "STEPCODEC_TEST_UNSET_B"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: STEPCODEC_TEST_UNSET_A or STEPCODEC_TEST_UNSET_B environment variable not set"
        );
    }

    #[test]
    fn test_user_agent_names_crate() {
        assert!(USER_AGENT.starts_with("stepcodec/"));
    }
}
