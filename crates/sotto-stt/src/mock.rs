//! Scripted stages for exercising the pipeline without models.

use crate::error::SttError;
use crate::transcribe::{Transcriber, TranscriptionOutcome};
use crate::vad::{ChunkVad, VadOutcome, WindowVad};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::sync::oneshot;

fn resolved<R>(result: Result<R, SttError>) -> oneshot::Receiver<Result<R, SttError>> {
    let (tx, rx) = oneshot::channel();
    let _ = tx.send(result);
    rx
}

/// A chunk gate answering from a script, then a fixed default.
pub struct MockChunkVad {
    script: Mutex<VecDeque<bool>>,
    default: bool,
    calls: AtomicUsize,
}

impl MockChunkVad {
    pub fn always(default: bool) -> Self {
        MockChunkVad {
            script: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, verdict: bool) {
        self.script.lock().unwrap().push_back(verdict);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChunkVad for MockChunkVad {
    fn is_active(&self, _chunk: &[u8]) -> Result<bool, SttError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default))
    }
}

/// A window classifier answering from a script, then a fixed default.
pub struct MockWindowVad {
    script: Mutex<VecDeque<Result<bool, SttError>>>,
    default: bool,
    calls: AtomicUsize,
}

impl MockWindowVad {
    pub fn always(default: bool) -> Self {
        MockWindowVad {
            script: Mutex::new(VecDeque::new()),
            default,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, verdict: bool) {
        self.script.lock().unwrap().push_back(Ok(verdict));
    }

    pub fn push_err(&self, err: SttError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl WindowVad for MockWindowVad {
    fn start(&self) -> Result<(), SttError> {
        Ok(())
    }

    fn close(&self) {}

    fn is_active(&self, _samples: Vec<f32>) -> VadOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.default));
        resolved(next)
    }
}

/// A transcriber answering from a script, then a fixed default transcript.
pub struct MockTranscriber {
    script: Mutex<VecDeque<Result<String, SttError>>>,
    default: String,
    calls: AtomicUsize,
}

impl MockTranscriber {
    pub fn always(transcript: &str) -> Self {
        MockTranscriber {
            script: Mutex::new(VecDeque::new()),
            default: transcript.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, transcript: &str) {
        self.script.lock().unwrap().push_back(Ok(transcript.to_string()));
    }

    pub fn push_err(&self, err: SttError) {
        self.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Transcriber for MockTranscriber {
    fn start(&self) -> Result<(), SttError> {
        Ok(())
    }

    fn close(&self) {}

    fn transcribe(&self, _samples: Vec<f32>) -> TranscriptionOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(self.default.clone()));
        resolved(next)
    }
}
