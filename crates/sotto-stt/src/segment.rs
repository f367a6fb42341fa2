//! Per-connection segmentation of the chunk stream into utterances.

use crate::config::SttConfig;
use crate::error::SttError;
use crate::transcribe::{Transcriber, TranscriptionOutcome};
use crate::vad::{ChunkVad, WindowVad};
use sotto_audio::AudioBuffer;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Nothing heard; the fast gate watches each chunk.
    Silence,
    /// The fast gate fired; accumulating a probe window for the classifier.
    Active,
    /// The classifier confirmed voice; accumulating the utterance.
    Speaking,
}

/// The transition a fed chunk produced: old state, new state, and (on the
/// edge that ends an utterance) the pending transcription.
pub type Transition = (StreamState, StreamState, Option<TranscriptionOutcome>);

/// Drives one connection's chunk stream through SILENCE → ACTIVE → SPEAKING.
///
/// The caller feeds chunks serially; every chunk is appended to the internal
/// buffer before the transition rule runs. A buffer handed to the
/// transcriber is gone from the machine: the next utterance starts empty.
pub struct AudioStreamStateMachine {
    state: StreamState,
    buffer: AudioBuffer,
    silence_chunks: usize,
    chunks_since_check: usize,
    min_active_chunks: usize,
    max_silence_chunks: usize,
    max_buffered_chunks: usize,
    check_every: usize,
    fast_vad: Arc<dyn ChunkVad>,
    window_vad: Arc<dyn WindowVad>,
    transcriber: Arc<dyn Transcriber>,
}

impl AudioStreamStateMachine {
    pub fn new(
        config: &SttConfig,
        fast_vad: Arc<dyn ChunkVad>,
        window_vad: Arc<dyn WindowVad>,
        transcriber: Arc<dyn Transcriber>,
    ) -> Self {
        AudioStreamStateMachine {
            state: StreamState::Silence,
            buffer: AudioBuffer::new(),
            silence_chunks: 0,
            chunks_since_check: 0,
            min_active_chunks: config.min_active_chunks(),
            max_silence_chunks: config.max_silence_chunks(),
            max_buffered_chunks: config.max_buffered_chunks,
            check_every: config.neural_vad_every_chunks,
            fast_vad,
            window_vad,
            transcriber,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn buffered_chunks(&self) -> usize {
        self.buffer.chunk_count()
    }

    /// Advance the machine by one chunk.
    ///
    /// Returns `(old_state, new_state, transcription)`; the transcription is
    /// present exactly on SPEAKING → SILENCE.
    pub async fn feed(&mut self, chunk: &[u8]) -> Result<Transition, SttError> {
        let old_state = self.state;
        self.buffer.append(chunk.to_vec());

        let task = match old_state {
            StreamState::Silence => {
                self.feed_from_silence(chunk)?;
                None
            }
            StreamState::Active => {
                self.feed_from_active().await?;
                None
            }
            StreamState::Speaking => self.feed_from_speaking().await?,
        };

        Ok((old_state, self.state, task))
    }

    fn feed_from_silence(&mut self, chunk: &[u8]) -> Result<(), SttError> {
        if self.fast_vad.is_active(chunk)? {
            self.state = StreamState::Active;
        } else {
            // Full discard: entering ACTIVE later starts from exactly the
            // chunk that triggered the gate.
            self.buffer = AudioBuffer::new();
        }
        Ok(())
    }

    async fn feed_from_active(&mut self) -> Result<(), SttError> {
        if self.buffer.chunk_count() < self.min_active_chunks {
            return Ok(());
        }
        if self.classify_window().await? {
            self.state = StreamState::Speaking;
            self.silence_chunks = 0;
            self.chunks_since_check = 0;
        } else {
            // False alarm from the fast gate; drop the probe window without
            // emitting anything.
            self.state = StreamState::Silence;
            self.buffer = AudioBuffer::new();
            self.silence_chunks = 0;
        }
        Ok(())
    }

    async fn feed_from_speaking(&mut self) -> Result<Option<TranscriptionOutcome>, SttError> {
        // The cap is checked before the (possibly strided) classification so
        // the buffer bound holds on every chunk.
        if self.buffer.chunk_count() >= self.max_buffered_chunks {
            return Ok(Some(self.finish_utterance()));
        }

        self.chunks_since_check += 1;
        if self.chunks_since_check < self.check_every {
            return Ok(None);
        }
        self.chunks_since_check = 0;

        if self.classify_window().await? {
            self.silence_chunks = 0;
            return Ok(None);
        }

        self.silence_chunks += 1;
        if self.silence_chunks >= self.max_silence_chunks {
            return Ok(Some(self.finish_utterance()));
        }
        Ok(None)
    }

    async fn classify_window(&mut self) -> Result<bool, SttError> {
        let samples = self.buffer.to_f32();
        match self.window_vad.is_active(samples).await {
            Ok(verdict) => verdict,
            Err(_) => Err(SttError::Canceled),
        }
    }

    /// Hand the buffer to the transcriber and fall back to SILENCE.
    fn finish_utterance(&mut self) -> TranscriptionOutcome {
        let buffer = std::mem::take(&mut self.buffer);
        self.state = StreamState::Silence;
        self.silence_chunks = 0;
        self.chunks_since_check = 0;
        self.transcriber.transcribe(buffer.to_f32())
    }
}
