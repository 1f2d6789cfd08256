use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::decoder::EventDecoder;
use crate::errors::{SessionError, TerminalFailure, TransportError};
use crate::event::StreamEvent;
use crate::framer::LineFramer;
use crate::reader::{ChunkReader, ChunkStream, ReadOutcome};
use crate::reducer;
use crate::state::{StageState, StageStatus};

/// Configuration used to create a `StreamSession`.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Human-readable session name, used in logs.
    pub name: String,
    /// Bounded buffer between the spawned controller and the consumer of
    /// `SessionStream::next_update`.
    pub update_buffer_capacity: usize,
}

impl SessionConfig {
    /// Creates a named session config.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Overrides the update buffer capacity.
    pub fn update_buffer_capacity(mut self, capacity: usize) -> Self {
        self.update_buffer_capacity = capacity;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: "council".into(),
            update_buffer_capacity: 128,
        }
    }
}

/// Handle used to cancel a session's stream.
#[derive(Clone)]
pub struct AbortHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortHandle {
    /// Requests cancellation.
    ///
    /// The session resolves at its next suspension point with
    /// `status = failed` and `error_detail = "cancelled"`. Calling this after
    /// the session resolved has no effect.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Receives the live state after every applied event.
///
/// Called synchronously from the controller, in decode order.
pub trait StageObserver {
    fn on_event(&mut self, event: &StreamEvent, state: &StageState);
}

impl<F> StageObserver for F
where
    F: FnMut(&StreamEvent, &StageState),
{
    fn on_event(&mut self, event: &StreamEvent, state: &StageState) {
        self(event, state)
    }
}

/// How a session ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Termination {
    /// The pipeline sent `done`.
    Done,
    /// The stream closed after the pipeline already reported an error.
    Closed,
    /// Transport failure, cancellation, or a close without a terminal event.
    Failed(TerminalFailure),
}

/// Counters gathered while ingesting one stream.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub chunks: u64,
    pub bytes: u64,
    pub lines: u64,
    pub events_applied: u64,
    pub decode_failures: u64,
    pub framing_losses: u64,
    pub discarded_bytes: u64,
}

/// Final result of a session. Always carries the state reached so far.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionReport {
    pub session_id: uuid::Uuid,
    pub state: StageState,
    pub stats: StreamStats,
    pub termination: Termination,
}

/// One applied event and the state right after it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionUpdate {
    /// Zero-based position in decode order.
    pub seq: u64,
    pub event: StreamEvent,
    pub state: StageState,
}

/// Tracks a single streamed message exchange.
///
/// A session runs exactly one stream. Any further start attempt, while the
/// first is running or after it resolved, is rejected; create a new session
/// to retry.
pub struct StreamSession {
    session_id: uuid::Uuid,
    config: SessionConfig,
    started: AtomicBool,
    abort: AbortHandle,
}

impl StreamSession {
    pub fn new(config: SessionConfig) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            session_id: uuid::Uuid::new_v4(),
            config,
            started: AtomicBool::new(false),
            abort: AbortHandle { tx: Arc::new(tx) },
        }
    }

    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns a handle that can cancel the stream. May be taken before the
    /// stream starts.
    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Ingests `chunks` in the caller's task, calling `observer` after every
    /// applied event, and returns once the stream terminates.
    pub async fn drive<O>(&self, chunks: ChunkStream, observer: &mut O) -> Result<SessionReport, SessionError>
    where
        O: StageObserver + ?Sized,
    {
        self.claim()?;
        let mut ingest = self.ingest(chunks);
        while let Some(event) = ingest.advance().await {
            observer.on_event(&event, &ingest.state);
        }
        Ok(ingest.into_report())
    }

    /// Like [`drive`](Self::drive) for a stream whose opening may have
    /// failed. An open failure (including a non-success status) resolves
    /// immediately without reading anything.
    pub async fn drive_opened<O>(
        &self,
        opened: Result<ChunkStream, TransportError>,
        observer: &mut O,
    ) -> Result<SessionReport, SessionError>
    where
        O: StageObserver + ?Sized,
    {
        match opened {
            Ok(chunks) => self.drive(chunks, observer).await,
            Err(err) => {
                self.claim()?;
                Ok(self.failed_before_start(err))
            }
        }
    }

    /// Spawns the controller on the tokio runtime and returns a handle that
    /// yields per-event updates.
    pub fn start(&self, chunks: ChunkStream) -> Result<SessionStream, SessionError> {
        self.start_opened(Ok(chunks))
    }

    /// Spawning counterpart of [`drive_opened`](Self::drive_opened).
    pub fn start_opened(
        &self,
        opened: Result<ChunkStream, TransportError>,
    ) -> Result<SessionStream, SessionError> {
        if self.config.update_buffer_capacity == 0 {
            return Err(SessionError::Validation(
                "update_buffer_capacity must be greater than 0".into(),
            ));
        }
        self.claim()?;

        let (tx, rx) = mpsc::channel(self.config.update_buffer_capacity);
        let (final_tx, final_rx) = oneshot::channel();
        match opened {
            Ok(chunks) => {
                tokio::spawn(session_task(self.ingest(chunks), tx, final_tx));
            }
            Err(err) => {
                let _ = final_tx.send(self.failed_before_start(err));
            }
        }

        Ok(SessionStream {
            session_id: self.session_id,
            rx,
            final_rx,
            abort_handle: self.abort.clone(),
        })
    }

    fn claim(&self) -> Result<(), SessionError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyStarted {
                session_id: self.session_id,
            });
        }
        debug!(session_id = %self.session_id, name = %self.config.name, "session started");
        Ok(())
    }

    fn ingest(&self, chunks: ChunkStream) -> Ingest {
        Ingest {
            session_id: self.session_id,
            reader: ChunkReader::new(chunks, self.abort.tx.subscribe()),
            framer: LineFramer::default(),
            decoder: EventDecoder::default(),
            pending: VecDeque::new(),
            state: StageState::default(),
            stats: StreamStats::default(),
            termination: None,
        }
    }

    fn failed_before_start(&self, err: TransportError) -> SessionReport {
        warn!(session_id = %self.session_id, error = %err, "stream failed to open");
        let failure = TerminalFailure::Transport(err);
        SessionReport {
            session_id: self.session_id,
            state: reducer::fail(StageState::default(), &failure),
            stats: StreamStats::default(),
            termination: Termination::Failed(failure),
        }
    }
}

/// Streaming handle returned by `StreamSession::start`.
///
/// Use `next_update()` to follow progress and `finish()` to obtain the
/// report after the stream terminated.
pub struct SessionStream {
    session_id: uuid::Uuid,
    rx: mpsc::Receiver<SessionUpdate>,
    final_rx: oneshot::Receiver<SessionReport>,
    abort_handle: AbortHandle,
}

impl SessionStream {
    pub fn session_id(&self) -> uuid::Uuid {
        self.session_id
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort_handle.clone()
    }

    /// Waits for the next applied event.
    ///
    /// Returns `None` once the controller has terminated.
    pub async fn next_update(&mut self) -> Option<SessionUpdate> {
        self.rx.recv().await
    }

    /// Drains any remaining updates and returns the final report.
    pub async fn finish(mut self) -> Result<SessionReport, SessionError> {
        while self.rx.recv().await.is_some() {}
        self.final_rx.await.map_err(|_| {
            SessionError::protocol_msg(format!(
                "session {} ended without a final report",
                self.session_id
            ))
        })
    }
}

async fn session_task(
    mut ingest: Ingest,
    tx: mpsc::Sender<SessionUpdate>,
    final_tx: oneshot::Sender<SessionReport>,
) {
    let mut seq = 0_u64;
    while let Some(event) = ingest.advance().await {
        let update = SessionUpdate {
            seq,
            event,
            state: ingest.state.clone(),
        };
        seq = seq.saturating_add(1);
        if tx.send(update).await.is_err() {
            debug!(session_id = %ingest.session_id, "update receiver dropped");
            ingest.terminate(Termination::Failed(TerminalFailure::Cancelled));
            break;
        }
    }
    let _ = final_tx.send(ingest.into_report());
}

/// Reader -> framer -> decoder -> reducer for one stream.
struct Ingest {
    session_id: uuid::Uuid,
    reader: ChunkReader,
    framer: LineFramer,
    decoder: EventDecoder,
    pending: VecDeque<StreamEvent>,
    state: StageState,
    stats: StreamStats,
    termination: Option<Termination>,
}

impl Ingest {
    /// Applies the next decoded event and returns it, reading more chunks as
    /// needed. Returns `None` once the session has terminated.
    async fn advance(&mut self) -> Option<StreamEvent> {
        loop {
            if self.termination.is_some() {
                return None;
            }
            if self.reader.is_cancelled() {
                self.framer.reset();
                self.terminate(Termination::Failed(TerminalFailure::Cancelled));
                return None;
            }
            if let Some(event) = self.pending.pop_front() {
                self.apply(&event);
                return Some(event);
            }

            match self.reader.next_chunk().await {
                ReadOutcome::Chunk(chunk) => self.ingest_chunk(&chunk),
                ReadOutcome::End => self.end_of_stream(),
                ReadOutcome::Cancelled => {
                    self.framer.reset();
                    self.terminate(Termination::Failed(TerminalFailure::Cancelled));
                }
                ReadOutcome::Failed(err) => {
                    self.framer.reset();
                    self.terminate(Termination::Failed(TerminalFailure::Transport(err)));
                }
            }
        }
    }

    fn ingest_chunk(&mut self, chunk: &[u8]) {
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len() as u64;
        for line in self.framer.push_chunk(chunk) {
            self.stats.lines += 1;
            match self.decoder.decode(&line) {
                Ok(Some(event)) => self.pending.push_back(event),
                Ok(None) => {}
                Err(failure) => {
                    warn!(session_id = %self.session_id, error = %failure, "skipping undecodable event");
                }
            }
        }
        self.stats.decode_failures = self.decoder.failures();
    }

    fn apply(&mut self, event: &StreamEvent) {
        debug!(session_id = %self.session_id, kind = event.kind(), "applying event");
        self.state = reducer::apply(std::mem::take(&mut self.state), event);
        self.stats.events_applied += 1;
        if matches!(event, StreamEvent::Done) {
            self.pending.clear();
            self.framer.reset();
            self.terminate(Termination::Done);
        }
    }

    fn end_of_stream(&mut self) {
        if let Some(loss) = self.framer.finish() {
            self.stats.framing_losses += 1;
            self.stats.discarded_bytes += loss.bytes as u64;
            warn!(session_id = %self.session_id, error = %loss, "stream ended mid-line");
        }
        let termination = match self.state.status() {
            StageStatus::InProgress => Termination::Failed(TerminalFailure::Incomplete),
            StageStatus::Completed | StageStatus::Failed => Termination::Closed,
        };
        self.terminate(termination);
    }

    fn terminate(&mut self, termination: Termination) {
        if self.termination.is_some() {
            return;
        }
        if let Termination::Failed(failure) = &termination {
            self.state = reducer::fail(std::mem::take(&mut self.state), failure);
        }
        info!(
            session_id = %self.session_id,
            termination = ?termination,
            events = self.stats.events_applied,
            decode_failures = self.stats.decode_failures,
            "session finished"
        );
        self.termination = Some(termination);
    }

    fn into_report(self) -> SessionReport {
        SessionReport {
            session_id: self.session_id,
            state: self.state,
            stats: self.stats,
            termination: self
                .termination
                .unwrap_or(Termination::Failed(TerminalFailure::Incomplete)),
        }
    }
}
