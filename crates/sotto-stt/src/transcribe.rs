//! Stage 3: speech-to-text over whole utterance buffers.

use crate::config::SttConfig;
use crate::error::SttError;
use crate::pool::{resolved, Job, JobQueue, Lifecycle};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::oneshot;
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

/// Pending result of a transcription.
pub type TranscriptionOutcome = oneshot::Receiver<Result<String, SttError>>;

/// Utterance-level speech-to-text; resolves on the caller's task.
pub trait Transcriber: Send + Sync {
    fn start(&self) -> Result<(), SttError>;

    fn close(&self);

    /// Transcribe a whole utterance of normalized samples. The returned
    /// receiver always resolves: with the transcript (possibly empty), or
    /// with the error that kept the pool from producing one.
    fn transcribe(&self, samples: Vec<f32>) -> TranscriptionOutcome;
}

const MODEL_BASE_URL: &str = "https://huggingface.co/ggerganov/whisper.cpp/resolve/main";

/// Warm-up asset under `<data_dir>/whisper/`: 7 s of little-endian float32
/// mono PCM at 16 kHz.
pub const WARMUP_FILE: &str = "warmup_7s_f32.pcm";

/// Silence prepended to every utterance; stabilizes the model on short
/// clips. 0.5 s at 16 kHz.
const LEAD_IN_SILENCE_SAMPLES: usize = 8000;

/// A pool of worker threads each owning one whisper.cpp context.
///
/// Weights are cached as `ggml-<model>.bin` under `<data_dir>/whisper/` and
/// fetched on first use. Every worker runs one inference over the warm-up
/// clip before the pool reports ready.
pub struct WhisperPool {
    threads: usize,
    model: String,
    model_dir: PathBuf,
    warmup: Arc<Vec<f32>>,
    queue: Arc<JobQueue<Vec<f32>, String>>,
    lifecycle: Mutex<Lifecycle>,
}

impl WhisperPool {
    /// Reads the warm-up asset eagerly; its absence is a construction error
    /// so a misconfigured install fails at startup, not mid-stream.
    pub fn new(config: &SttConfig, data_dir: impl AsRef<Path>) -> Result<Self, SttError> {
        let model_dir = data_dir.as_ref().join("whisper");
        let warmup = read_warmup(&model_dir.join(WARMUP_FILE))?;
        Ok(WhisperPool {
            threads: config.transcriber_threads,
            model: config.whisper_model.clone(),
            model_dir,
            warmup: Arc::new(warmup),
            queue: Arc::new(JobQueue::new()),
            lifecycle: Mutex::new(Lifecycle::Idle),
        })
    }
}

fn read_warmup(path: &Path) -> Result<Vec<f32>, SttError> {
    let bytes = std::fs::read(path).map_err(|e| {
        SttError::ModelLoad(format!("warm-up audio {}: {}", path.display(), e))
    })?;
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Resolve the model file under the cache directory, downloading it from the
/// whisper.cpp model repository if it is not there yet.
fn ensure_model(model: &str, dir: &Path) -> Result<PathBuf, SttError> {
    let file_name = format!("ggml-{model}.bin");
    let path = dir.join(&file_name);
    if path.exists() {
        return Ok(path);
    }

    std::fs::create_dir_all(dir)?;
    let url = format!("{MODEL_BASE_URL}/{file_name}");
    log::info!("downloading whisper model {model} from {url}");

    let response = ureq::get(&url)
        .call()
        .map_err(|e| SttError::ModelLoad(format!("download {url}: {e}")))?;

    // Download to a partial file first so an interrupted fetch never looks
    // like a cached model.
    let partial = dir.join(format!("{file_name}.part"));
    let mut reader = response.into_body().into_reader();
    let mut out = File::create(&partial)?;
    std::io::copy(&mut reader, &mut out)?;
    std::fs::rename(&partial, &path)?;

    log::info!("whisper model cached at {}", path.display());
    Ok(path)
}

fn load_model(path: &Path) -> Result<WhisperContext, SttError> {
    WhisperContext::new_with_params(
        path.to_string_lossy().as_ref(),
        WhisperContextParameters::default(),
    )
    .map_err(|e| SttError::ModelLoad(format!("{}: {}", path.display(), e)))
}

fn run_whisper(ctx: &WhisperContext, samples: &[f32]) -> Result<String, SttError> {
    let mut state = ctx
        .create_state()
        .map_err(|e| SttError::Inference(format!("whisper state: {e}")))?;

    let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
    params.set_language(Some("en"));
    params.set_print_special(false);
    params.set_print_progress(false);
    params.set_print_realtime(false);
    params.set_print_timestamps(false);

    state
        .full(params, samples)
        .map_err(|e| SttError::Inference(format!("whisper full: {e}")))?;

    let mut text = String::new();
    for i in 0..state.full_n_segments() {
        let Some(segment) = state.get_segment(i) else {
            continue;
        };
        match segment.to_str() {
            Ok(s) => text.push_str(s),
            Err(e) => log::warn!("dropping undecodable whisper segment {i}: {e}"),
        }
    }
    Ok(text.trim().to_string())
}

fn transcribe_padded(ctx: &mut WhisperContext, samples: Vec<f32>) -> Result<String, SttError> {
    let mut padded = vec![0.0f32; LEAD_IN_SILENCE_SAMPLES + samples.len()];
    padded[LEAD_IN_SILENCE_SAMPLES..].copy_from_slice(&samples);
    run_whisper(ctx, &padded)
}

impl Transcriber for WhisperPool {
    /// Fetch the model if needed, spawn the workers, and block until every
    /// worker has loaded and warmed its context. Idempotent while running.
    fn start(&self) -> Result<(), SttError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(|e| e.into_inner());
        match &*lifecycle {
            Lifecycle::Running(_) => return Ok(()),
            Lifecycle::Closed => return Err(SttError::Closed),
            Lifecycle::Idle => {}
        }

        let model_path = ensure_model(&self.model, &self.model_dir)?;

        let (ready_tx, ready_rx) = mpsc::channel();
        let mut handles = Vec::with_capacity(self.threads);
        for worker in 0..self.threads {
            let queue = Arc::clone(&self.queue);
            let ready = ready_tx.clone();
            let warmup = Arc::clone(&self.warmup);
            let model_path = model_path.clone();
            handles.push(thread::spawn(move || {
                let loaded = load_model(&model_path)
                    .and_then(|ctx| run_whisper(&ctx, &warmup).map(|_| ctx));
                let mut ctx = match loaded {
                    Ok(ctx) => {
                        let _ = ready.send(Ok(()));
                        ctx
                    }
                    Err(e) => {
                        let _ = ready.send(Err(e));
                        return;
                    }
                };
                log::debug!("whisper worker {worker} warmed up");
                crate::pool::run_worker(&queue, &mut ctx, transcribe_padded);
                log::debug!("whisper worker {worker} drained");
            }));
        }
        drop(ready_tx);

        for _ in 0..self.threads {
            let loaded = ready_rx.recv().unwrap_or_else(|_| {
                Err(SttError::ModelLoad("whisper worker died during load".to_string()))
            });
            if let Err(e) = loaded {
                self.queue.close();
                for handle in handles {
                    let _ = handle.join();
                }
                *lifecycle = Lifecycle::Closed;
                return Err(e);
            }
        }

        log::debug!("whisper pool ready with {} workers", self.threads);
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

    fn transcribe(&self, samples: Vec<f32>) -> TranscriptionOutcome {
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
