//! HTTP client for the council backend.
//!
//! Opens the streaming message endpoint and fetches the council defaults.
//! Everything else the backend offers (conversation CRUD, model and log
//! listings) is left to other collaborators.
mod config;

pub use config::{ClientConfig, DEFAULT_BASE_URL};

use futures::StreamExt as _;
use tracing::debug;

use crate::errors::{ClientError, TransportError};
use crate::reader::ChunkStream;
use crate::transport::{MessageTransport, SendMessageRequest};

/// Council composition the backend uses when a request does not override it.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CouncilDefaults {
    pub council_models: Vec<String>,
    pub chairman_model: String,
}

/// reqwest-backed [`MessageTransport`].
#[derive(Clone)]
pub struct CouncilClient {
    client: reqwest::Client,
    config: ClientConfig,
}

impl CouncilClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Creates a client from `COUNCIL_*` environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetches the default council and chairman.
    pub async fn fetch_defaults(&self) -> Result<CouncilDefaults, ClientError> {
        let url = self.config.defaults_url();
        debug!(url = %url, "fetching council defaults");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::open(format!("GET {url} failed: {e}")))?;
        let response = ensure_success(response).await?;
        response
            .json::<CouncilDefaults>()
            .await
            .map_err(|e| ClientError::Decode(format!("invalid council defaults: {e}")))
    }
}

#[async_trait::async_trait]
impl MessageTransport for CouncilClient {
    async fn open_message_stream(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<ChunkStream, TransportError> {
        let url = self.config.stream_url(conversation_id);
        debug!(url = %url, "opening message stream");
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::open(format!("POST {url} failed: {e}")))?;
        let response = ensure_success(response).await?;

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| TransportError::read(e.to_string())));
        Ok(Box::pin(chunks))
    }
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<unreadable body>".to_string());
    Err(TransportError::Status {
        status: status.as_u16(),
        body,
    })
}
