//! Streaming event ingestion and stage-state reduction for LLM council
//! conversations.
//!
//! A council answers a message in three stages: every member model answers,
//! the members review each other, and a chairman writes the final answer. The
//! backend reports progress as a `data: <json>` line stream. This crate turns
//! those raw bytes into an ordered [`StageState`]:
//!
//! chunk reader → line framer → event decoder → stage reducer,
//! driven by a [`StreamSession`].
//!
//! # Sending a message
//!
//! ```no_run
//! use council_stream::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CouncilClient::from_env()?;
//! let session = StreamSession::new(SessionConfig::named("demo"));
//! let request = SendMessageRequest::new("Why is the sky blue?");
//!
//! let mut stream = start_message(&client, &session, "conversation-id", &request).await?;
//! while let Some(update) = stream.next_update().await {
//!     println!("{} -> {:?}", update.event.kind(), update.state.status());
//! }
//! let report = stream.finish().await?;
//! if let Some(answer) = report.state.stage3() {
//!     println!("{}", answer.response);
//! }
//! # Ok(())
//! # }
//! ```

/// HTTP collaborator: opens the message stream and fetches council defaults.
pub mod client;
/// `data:` line decoding.
pub mod decoder;
/// Public error types.
pub mod errors;
/// Typed stream events.
pub mod event;
/// Newline framing over arbitrary chunk boundaries.
pub mod framer;
/// Logging initialization.
pub mod observability;
/// Common imports for typical usage.
pub mod prelude;
/// Cancellable chunk reading.
pub mod reader;
/// Pure state transitions.
pub mod reducer;
/// Stream controller, cancellation and session reports.
pub mod session;
/// Three-stage progress state.
pub mod state;
/// Message transport seam and send helpers.
pub mod transport;

pub use client::{ClientConfig, CouncilClient, CouncilDefaults};
pub use decoder::{EventDecoder, decode_line};
pub use errors::{
    ClientError, DecodeFailure, FramingLoss, SessionError, TerminalFailure, TransportError,
};
pub use event::{Stage, StreamEvent};
pub use framer::LineFramer;
pub use observability::init_observability;
pub use reader::{ChunkReader, ChunkStream, ReadOutcome, chunks_from};
pub use session::{
    AbortHandle, SessionConfig, SessionReport, SessionStream, SessionUpdate, StageObserver,
    StreamSession, StreamStats, Termination,
};
pub use state::{FinalAnswer, ReviewKey, StageState, StageStatus};
pub use transport::{MessageTransport, SendMessageRequest, send_message, start_message};
