//! Common imports for sending a message and following its progress.
pub use crate::{
    AbortHandle, ClientConfig, CouncilClient, MessageTransport, SendMessageRequest, SessionConfig,
    SessionError, SessionReport, SessionStream, SessionUpdate, Stage, StageObserver, StageState,
    StageStatus, StreamEvent, StreamSession, Termination, send_message, start_message,
};
