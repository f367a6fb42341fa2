//! The two voice-activity stages.
//!
//! Stage 1 is a per-chunk gate cheap enough for the receive path; stage 2 is
//! a neural classifier run over the accumulated window on a thread pool.

use crate::config::SttConfig;
use crate::error::SttError;
use crate::pool::{resolved, Job, JobQueue, Lifecycle};
use sotto_audio::pcm;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;
use voice_activity_detector::VoiceActivityDetector;
use webrtc_vad::{SampleRate, Vad, VadMode};

/// Pending result of a window classification.
pub type VadOutcome = oneshot::Receiver<Result<bool, SttError>>;

/// Per-chunk voice gate. Must be synchronous and microsecond-cheap.
pub trait ChunkVad: Send + Sync {
    fn start(&self) -> Result<(), SttError> {
        Ok(())
    }

    fn close(&self) {}

    /// Does this single chunk contain voice? The chunk is 16-bit
    /// little-endian mono PCM of 10, 20 or 30 ms.
    fn is_active(&self, chunk: &[u8]) -> Result<bool, SttError>;
}

/// Window-level voice classifier; resolves on the caller's task.
pub trait WindowVad: Send + Sync {
    fn start(&self) -> Result<(), SttError>;

    fn close(&self);

    /// Classify an accumulated window of normalized samples. The returned
    /// receiver always resolves: with the verdict, or with the error that
    /// kept the pool from producing one.
    fn is_active(&self, samples: Vec<f32>) -> VadOutcome;
}

/// Stage 1: the WebRTC voice-activity gate.
///
/// Pinned to 16 kHz like the rest of the pipeline (the neural VAD frames
/// and the transcriber's padding assume it).
pub struct WebrtcChunkVad {
    aggressiveness: u8,
}

impl WebrtcChunkVad {
    pub fn new(config: &SttConfig) -> Result<Self, SttError> {
        if config.aggresiveness > 3 {
            return Err(SttError::Config(format!(
                "aggresiveness must be in 0..=3, got {}",
                config.aggresiveness
            )));
        }
        if config.sample_rate != 16000 {
            return Err(SttError::Config(format!(
                "fast vad runs at 16000 Hz, got {}",
                config.sample_rate
            )));
        }
        Ok(WebrtcChunkVad {
            aggressiveness: config.aggresiveness,
        })
    }
}

impl ChunkVad for WebrtcChunkVad {
    fn is_active(&self, chunk: &[u8]) -> Result<bool, SttError> {
        let samples = pcm::bytes_to_i16(chunk);
        // The underlying handle is not Send, so build one per call; that is
        // an allocation and a mode flag, still microseconds.
        let mut vad =
            Vad::new_with_rate_and_mode(SampleRate::Rate16kHz, vad_mode(self.aggressiveness));
        vad.is_voice_segment(&samples).map_err(|_| {
            SttError::Inference(format!(
                "webrtc vad rejected a frame of {} samples",
                samples.len()
            ))
        })
    }
}

fn vad_mode(aggressiveness: u8) -> VadMode {
    match aggressiveness {
        0 => VadMode::Quality,
        1 => VadMode::LowBitrate,
        2 => VadMode::Aggressive,
        _ => VadMode::VeryAggressive,
    }
}

/// Samples per neural VAD frame at 16 kHz.
const VAD_FRAME_SAMPLES: usize = 512;
const SPEECH_THRESHOLD: f32 = 0.5;

/// Stage 2: a pool of worker threads each holding one Silero detector.
///
/// A window is "active" when any 512-sample frame in it crosses the speech
/// probability threshold. The detector is stateful, so it is reset before
/// each window; a trailing partial frame (under 32 ms) is not scanned.
pub struct SileroVadPool {
    threads: usize,
    sample_rate: u32,
    queue: Arc<JobQueue<Vec<f32>, bool>>,
    lifecycle: Mutex<Lifecycle>,
}

impl SileroVadPool {
    pub fn new(config: &SttConfig) -> Self {
        SileroVadPool {
            threads: config.vad_threads,
            sample_rate: config.sample_rate,
            queue: Arc::new(JobQueue::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }
}

fn build_detector(sample_rate: u32) -> Result<VoiceActivityDetector, SttError> {
    VoiceActivityDetector::builder()
        .sample_rate(sample_rate as i64)
        .chunk_size(VAD_FRAME_SAMPLES)
        .build()
        .map_err(|e| SttError::ModelLoad(format!("silero vad: {e}")))
}

fn classify_window(detector: &mut VoiceActivityDetector, samples: Vec<f32>) -> Result<bool, SttError> {
    detector.reset();
    for frame in samples.chunks_exact(VAD_FRAME_SAMPLES) {
        if detector.predict(frame.iter().copied()) >= SPEECH_THRESHOLD {
            return Ok(true);
        }
    }
    Ok(false)
}

impl WindowVad for SileroVadPool {
    /// Spawn the workers and block until every one has loaded its model.
    /// Idempotent while running.
    fn start(&self) -> Result<(), SttError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        match &*lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Closed => return Err(SttError::Closed),
            Lifecycle::Idle => {}
        }

        let (ready_tx, ready_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(self.threads);
        for worker in 0..self.threads {
            let queue = Arc::clone(&self.queue);
            let ready = ready_tx.clone();
            let sample_rate = self.sample_rate;
            handles.push(thread::spawn(move || {
                let mut detector = match build_detector(sample_rate) {
                    Ok(detector) => {
                        let _ = ready.send(Ok(()));
                        detector
                    }
                    Err(e) => {
                        let _ = ready.send(Err(e));
                        return;
                    }
                };
                log::debug!("silero worker {worker} ready");
                crate::pool::run_worker(&queue, &mut detector, classify_window);
                log::debug!("silero worker {worker} drained");
            }));
        }
        drop(ready_tx);

        for _ in 0..self.threads {
            let loaded = ready_rx
                .recv()
                .unwrap_or_else(|_| Err(SttError::ModelLoad("silero worker died during load".to_string())));
            if let Err(e) = loaded {
                self.queue.close();
                for handle in handles {
                    let _ = handle.join();
                }
                *lifecycle = Lifecycle::Closed;
                return Err(e);
            }
        }

        log::debug!("silero pool ready with {} workers", self.threads);
        *lifecycle = Lifecycle::Running(handles);
        Ok(())
    }

    /// Stop accepting work, finish what is queued, join the workers.
    /// Idempotent.
    fn close(&self) {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        self.queue.close();
        for handle in lifecycle.shut_down() {
            let _ = handle.join();
        }
    }

    fn is_active(&self, samples: Vec<f32>) -> VadOutcome {
        {
            let lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
            match &*lifecycle {
                Lifecycle::Idle => return resolved(Err(SttError::NotStarted)),
                Lifecycle::Closed => return resolved(Err(SttError::Closed)),
                Lifecycle::Running(_) => {}
            }
        }

        let (tx, rx) = oneshot::channel();
        if let Err(job) = self.queue.push(Job {
            payload: samples,
            done: tx,
        }) {
            let _ = job.done.send(Err(SttError::Closed));
        }
        rx
    }
}
