//! The multi-tenant speech-to-text service.

use crate::config::SttConfig;
use crate::error::SttError;
use crate::event::{event_queue, EventSink, EventStream, SttEvent};
use crate::segment::{AudioStreamStateMachine, StreamState};
use crate::transcribe::Transcriber;
use crate::vad::{ChunkVad, WindowVad};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

struct Connection {
    machine: Arc<tokio::sync::Mutex<AudioStreamStateMachine>>,
    events: EventSink,
}

/// Owns the three inference stages and the registry of open connections.
///
/// `feed` drives a connection's state machine and emits its events. The
/// transport's read loop serializes `feed` per connection; each machine
/// additionally sits behind its own async mutex, so concurrent embedders
/// get serialization rather than corruption.
pub struct SttService {
    config: SttConfig,
    chunk_bytes: usize,
    fast_vad: Arc<dyn ChunkVad>,
    window_vad: Arc<dyn WindowVad>,
    transcriber: Arc<dyn Transcriber>,
    connections: Mutex<HashMap<u64, Connection>>,
    next_id: AtomicU64,
    started: AtomicBool,
    closed: AtomicBool,
}

impl SttService {
    pub fn new(
        config: SttConfig,
        fast_vad: Arc<dyn ChunkVad>,
        window_vad: Arc<dyn WindowVad>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Result<Self, SttError> {
        config.validate()?;
        let chunk_bytes = config.chunk_bytes();
        Ok(SttService {
            config,
            chunk_bytes,
            fast_vad,
            window_vad,
            transcriber,
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            started: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Start every stage; blocks until all workers report ready. Idempotent.
    pub fn start(&self) -> Result<(), SttError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SttError::Closed);
        }
        // Each stage's start is itself idempotent, so a racing second call
        // just waits on the same readiness.
        self.fast_vad.start()?;
        self.window_vad.start()?;
        self.transcriber.start()?;
        self.started.store(true, Ordering::SeqCst);
        log::info!("speech-to-text service started");
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SttError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SttError::Closed);
        }
        if !self.started.load(Ordering::SeqCst) {
            return Err(SttError::NotStarted);
        }
        Ok(())
    }

    /// Register a new connection; ids are fresh for the process lifetime.
    pub fn connect(&self) -> Result<(EventStream, u64), SttError> {
        self.ensure_open()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let machine = AudioStreamStateMachine::new(
            &self.config,
            Arc::clone(&self.fast_vad),
            Arc::clone(&self.window_vad),
            Arc::clone(&self.transcriber),
        );
        let (sink, stream) = event_queue();
        self.connections.lock().unwrap_or_else(|e| e.into_inner()).insert(
            id,
            Connection {
                machine: Arc::new(tokio::sync::Mutex::new(machine)),
                events: sink,
            },
        );
        log::debug!("connection {id} registered");
        Ok((stream, id))
    }

    /// Drop a connection. Its event stream drains and ends; a transcription
    /// still in flight resolves into a discarded sink.
    pub fn disconnect(&self, connection_id: u64) -> Result<(), SttError> {
        self.ensure_open()?;
        match self
            .connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&connection_id)
        {
            Some(_) => {
                log::debug!("connection {connection_id} removed");
                Ok(())
            }
            None => Err(SttError::UnknownConnection(connection_id)),
        }
    }

    /// Feed one PCM chunk to a connection, emitting any events the
    /// transition produces.
    pub async fn feed(&self, connection_id: u64, chunk: &[u8]) -> Result<(), SttError> {
        self.ensure_open()?;
        if chunk.len() != self.chunk_bytes {
            return Err(SttError::BadChunk {
                expected: self.chunk_bytes,
                got: chunk.len(),
            });
        }

        let (machine, events) = {
            let connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
            let connection = connections
                .get(&connection_id)
                .ok_or(SttError::UnknownConnection(connection_id))?;
            (Arc::clone(&connection.machine), connection.events.clone())
        };

        let mut machine = machine.lock().await;
        let (old_state, new_state, task) = machine.feed(chunk).await?;

        match (old_state, new_state) {
            (StreamState::Active, StreamState::Speaking) => {
                events.put(SttEvent::StartSpeaking).await?;
            }
            (StreamState::Speaking, StreamState::Silence) => {
                events.put(SttEvent::StopSpeaking).await?;
                let text = match task {
                    Some(outcome) => match outcome.await {
                        Ok(Ok(text)) => text,
                        Ok(Err(e)) => {
                            log::error!("transcription failed on connection {connection_id}: {e}");
                            String::new()
                        }
                        Err(_) => {
                            log::error!(
                                "transcription dropped before completion on connection {connection_id}"
                            );
                            String::new()
                        }
                    },
                    None => String::new(),
                };
                events.put(SttEvent::Text(text)).await?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Close every stage; queued inference drains, then workers exit.
    /// Open connections see end-of-stream. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.fast_vad.close();
        self.window_vad.close();
        self.transcriber.close();
        self.connections
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        log::info!("speech-to-text service closed");
    }
}
