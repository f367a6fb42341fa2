use crate::error::SttError;
use tokio::sync::mpsc;

/// What a connection's consumer hears from the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SttEvent {
    StartSpeaking,
    StopSpeaking,
    Text(String),
}

/// Events buffered per connection before the transport drains them. Small:
/// one utterance produces three events and the consumer is a socket writer.
const EVENT_QUEUE_CAPACITY: usize = 64;

/// Create the per-connection event channel.
///
/// The sink side lives in the connection registry; the stream side goes to
/// the transport. Dropping the sink ends the stream: pending events are
/// still delivered, then `next` yields `None`.
pub fn event_queue() -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(EVENT_QUEUE_CAPACITY);
    (EventSink { tx }, EventStream { rx })
}

#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<SttEvent>,
}

impl EventSink {
    /// Enqueue an event, waiting if the consumer is behind.
    ///
    /// Fails once the stream side is gone.
    pub async fn put(&self, event: SttEvent) -> Result<(), SttError> {
        self.tx.send(event).await.map_err(|_| SttError::Closed)
    }
}

pub struct EventStream {
    rx: mpsc::Receiver<SttEvent>,
}

impl EventStream {
    /// The next event, or `None` once the connection is closed and drained.
    pub async fn next(&mut self) -> Option<SttEvent> {
        self.rx.recv().await
    }
}
