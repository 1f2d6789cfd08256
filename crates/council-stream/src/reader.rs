use std::pin::Pin;

use bytes::Bytes;
use futures::StreamExt as _;
use futures::stream;
use tokio::sync::watch;

use crate::errors::TransportError;

/// Raw body chunks of an already-open message stream.
pub type ChunkStream =
    Pin<Box<dyn futures::Stream<Item = Result<Bytes, TransportError>> + Send + 'static>>;

/// Builds a [`ChunkStream`] from chunks already in memory (replays, tests).
pub fn chunks_from<I, B>(chunks: I) -> ChunkStream
where
    I: IntoIterator<Item = B>,
    B: Into<Bytes>,
{
    let chunks: Vec<Result<Bytes, TransportError>> =
        chunks.into_iter().map(|chunk| Ok(chunk.into())).collect();
    Box::pin(stream::iter(chunks))
}

/// Result of a single read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Chunk(Bytes),
    /// The stream closed.
    End,
    /// The session was aborted; the in-flight read was abandoned.
    Cancelled,
    /// The connection failed mid-read.
    Failed(TransportError),
}

/// Pulls chunks one at a time, racing every read against cancellation.
///
/// Once a terminal outcome has been returned every later read yields `End`.
pub struct ChunkReader {
    stream: ChunkStream,
    cancel: watch::Receiver<bool>,
    cancel_open: bool,
    finished: bool,
}

impl ChunkReader {
    pub fn new(stream: ChunkStream, cancel: watch::Receiver<bool>) -> Self {
        Self {
            stream,
            cancel,
            cancel_open: true,
            finished: false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }

    /// Waits for the next chunk, the end of the stream, or cancellation.
    /// Cancellation wins over a chunk that is ready at the same time.
    pub async fn next_chunk(&mut self) -> ReadOutcome {
        if self.finished {
            return ReadOutcome::End;
        }
        loop {
            if self.is_cancelled() {
                self.finished = true;
                return ReadOutcome::Cancelled;
            }
            let next = if self.cancel_open {
                tokio::select! {
                    biased;
                    changed = self.cancel.changed() => {
                        // Sender gone: nobody can cancel any more.
                        if changed.is_err() {
                            self.cancel_open = false;
                        }
                        continue;
                    }
                    next = self.stream.next() => next,
                }
            } else {
                self.stream.next().await
            };
            return match next {
                Some(Ok(chunk)) => ReadOutcome::Chunk(chunk),
                Some(Err(err)) => {
                    self.finished = true;
                    ReadOutcome::Failed(err)
                }
                None => {
                    self.finished = true;
                    ReadOutcome::End
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn yields_chunks_then_end_once() {
        let (_tx, rx) = watch::channel(false);
        let mut reader = ChunkReader::new(chunks_from(["a", "b"]), rx);
        assert_eq!(reader.next_chunk().await, ReadOutcome::Chunk(Bytes::from("a")));
        assert_eq!(reader.next_chunk().await, ReadOutcome::Chunk(Bytes::from("b")));
        assert_eq!(reader.next_chunk().await, ReadOutcome::End);
        assert_eq!(reader.next_chunk().await, ReadOutcome::End);
    }

    #[tokio::test]
    async fn read_error_is_terminal() {
        let (_tx, rx) = watch::channel(false);
        let stream: ChunkStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from("a")),
            Err(TransportError::read("reset")),
            Ok(Bytes::from("never")),
        ]));
        let mut reader = ChunkReader::new(stream, rx);
        assert_eq!(reader.next_chunk().await, ReadOutcome::Chunk(Bytes::from("a")));
        assert_eq!(
            reader.next_chunk().await,
            ReadOutcome::Failed(TransportError::read("reset"))
        );
        assert_eq!(reader.next_chunk().await, ReadOutcome::End);
    }

    #[tokio::test]
    async fn cancellation_wins_over_ready_chunk() {
        let (tx, rx) = watch::channel(false);
        let mut reader = ChunkReader::new(chunks_from(["a"]), rx);
        tx.send(true).expect("send");
        assert_eq!(reader.next_chunk().await, ReadOutcome::Cancelled);
        assert_eq!(reader.next_chunk().await, ReadOutcome::End);
    }

    #[tokio::test]
    async fn cancellation_interrupts_pending_read() {
        let (tx, rx) = watch::channel(false);
        let pending: ChunkStream = Box::pin(stream::pending());
        let mut reader = ChunkReader::new(pending, rx);
        let abort = tokio::spawn(async move {
            tokio::task::yield_now().await;
            let _ = tx.send(true);
            tx
        });
        assert_eq!(reader.next_chunk().await, ReadOutcome::Cancelled);
        let _tx = abort.await.expect("join");
    }

    #[tokio::test]
    async fn dropped_cancel_sender_keeps_reading() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let mut reader = ChunkReader::new(chunks_from(["a"]), rx);
        assert_eq!(reader.next_chunk().await, ReadOutcome::Chunk(Bytes::from("a")));
        assert_eq!(reader.next_chunk().await, ReadOutcome::End);
    }
}
