use crate::errors::{SessionError, TransportError};
use crate::reader::ChunkStream;
use crate::session::{SessionReport, SessionStream, StageObserver, StreamSession};

/// Body of the "send message (streaming)" request.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    /// Council override; `None` uses the server defaults.
    pub council_models: Option<Vec<String>>,
    /// Chairman override; `None` uses the server default.
    pub chairman_model: Option<String>,
}

impl SendMessageRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            council_models: None,
            chairman_model: None,
        }
    }

    /// Overrides the council. An empty list keeps the server defaults.
    pub fn council_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<String> = models.into_iter().map(Into::into).collect();
        self.council_models = (!models.is_empty()).then_some(models);
        self
    }

    pub fn chairman_model(mut self, model: impl Into<String>) -> Self {
        self.chairman_model = Some(model.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), SessionError> {
        if self.content.trim().is_empty() {
            return Err(SessionError::Validation(
                "message content must not be empty".into(),
            ));
        }
        if let Some(models) = &self.council_models
            && models.iter().any(|m| m.trim().is_empty())
        {
            return Err(SessionError::Validation(
                "council model ids must not be empty".into(),
            ));
        }
        if let Some(chairman) = &self.chairman_model
            && chairman.trim().is_empty()
        {
            return Err(SessionError::Validation(
                "chairman model id must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// Opens the message stream for a conversation.
///
/// Implementations must report a non-success response as an error here,
/// before any chunk is handed out.
#[async_trait::async_trait]
pub trait MessageTransport: Send + Sync {
    async fn open_message_stream(
        &self,
        conversation_id: &str,
        request: &SendMessageRequest,
    ) -> Result<ChunkStream, TransportError>;
}

/// Sends a message and ingests the reply in the caller's task.
pub async fn send_message<T, O>(
    transport: &T,
    session: &StreamSession,
    conversation_id: &str,
    request: &SendMessageRequest,
    observer: &mut O,
) -> Result<SessionReport, SessionError>
where
    T: MessageTransport + ?Sized,
    O: StageObserver + ?Sized,
{
    request.validate()?;
    let opened = transport.open_message_stream(conversation_id, request).await;
    session.drive_opened(opened, observer).await
}

/// Sends a message and spawns ingestion, returning the update stream.
pub async fn start_message<T>(
    transport: &T,
    session: &StreamSession,
    conversation_id: &str,
    request: &SendMessageRequest,
) -> Result<SessionStream, SessionError>
where
    T: MessageTransport + ?Sized,
{
    request.validate()?;
    let opened = transport.open_message_stream(conversation_id, request).await;
    session.start_opened(opened)
}
