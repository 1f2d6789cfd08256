/// Errors raised while opening or reading the message stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The request could not be sent or the connection was refused.
    #[error("failed to open stream: {message}")]
    Open { message: String },
    /// The server answered with a non-success status before any chunk was read.
    #[error("stream request failed with status {status}: {body}")]
    Status { status: u16, body: String },
    /// The connection dropped while a chunk was being read.
    #[error("stream read failed: {message}")]
    Read { message: String },
}

impl TransportError {
    /// Creates an open-time error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /// Creates a mid-stream read error.
    pub fn read(message: impl Into<String>) -> Self {
        Self::Read {
            message: message.into(),
        }
    }

    /// Returns the HTTP status for `Status` errors.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Open { .. } | Self::Read { .. } => None,
        }
    }
}

/// A trailing fragment that never received its terminating newline.
///
/// Absorbed by the session and only counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("discarded {bytes} bytes of unterminated trailing line")]
pub struct FramingLoss {
    pub bytes: usize,
}

/// A `data:` line whose payload could not be decoded into an event.
///
/// Absorbed by the session and only counted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("undecodable event line ({reason}): {line}")]
pub struct DecodeFailure {
    pub reason: String,
    /// Leading part of the offending line, for logs.
    pub line: String,
}

/// Failure that ends a session before the pipeline reported `done`.
///
/// Its `Display` output becomes `StageState::error_detail`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TerminalFailure {
    /// Network open/read failure.
    #[error(transparent)]
    Transport(TransportError),
    /// The caller aborted the session.
    #[error("cancelled")]
    Cancelled,
    /// The stream closed cleanly without a terminal event.
    #[error("stream closed before completion")]
    Incomplete,
}

impl From<TransportError> for TerminalFailure {
    fn from(value: TransportError) -> Self {
        TerminalFailure::Transport(value)
    }
}

/// Errors returned by the session API itself.
///
/// Stream outcomes are never reported here: they are folded into the
/// `SessionReport` state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The session already ran (or is running) its one stream.
    #[error("session {session_id} already started a stream")]
    AlreadyStarted { session_id: uuid::Uuid },
    /// Invalid session configuration or request.
    #[error("validation error: {0}")]
    Validation(String),
    /// Internal protocol misuse, e.g. the controller task vanished.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl SessionError {
    pub(crate) fn protocol_msg(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }
}

/// Errors raised by the HTTP client outside of a session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error("config error: {0}")]
    Config(String),
    /// Request failed at the transport level.
    #[error(transparent)]
    Transport(TransportError),
    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<TransportError> for ClientError {
    fn from(value: TransportError) -> Self {
        ClientError::Transport(value)
    }
}
