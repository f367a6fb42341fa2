//! Real-time speech-to-text pipeline.
//!
//! Chunks of PCM flow through three stages per connection: a cheap per-chunk
//! voice gate, a neural voice-activity classifier over the accumulated
//! window, and a speech-to-text pool over whole utterances. The
//! [`SttService`] façade registers connections, drives their state machines,
//! and emits `StartSpeaking` / `StopSpeaking` / `Text` events.

pub mod config;
pub mod error;
pub mod event;
pub mod mock;
mod pool;
pub mod segment;
pub mod service;
pub mod transcribe;
pub mod vad;

pub use config::SttConfig;
pub use error::SttError;
pub use event::{event_queue, EventSink, EventStream, SttEvent};
pub use segment::{AudioStreamStateMachine, StreamState};
pub use service::SttService;
pub use transcribe::{Transcriber, TranscriptionOutcome, WhisperPool};
pub use vad::{ChunkVad, SileroVadPool, VadOutcome, WebrtcChunkVad, WindowVad};
