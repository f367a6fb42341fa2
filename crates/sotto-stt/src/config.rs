use crate::error::SttError;
use serde::Deserialize;
use std::path::Path;

/// File name looked up under the data directory.
pub const CONFIG_FILE: &str = "stt_config.json";

/// Service configuration.
///
/// Every field has a default, so a config file only needs the keys it wants
/// to override. Unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SttConfig {
    /// Worker threads in the neural VAD pool.
    pub vad_threads: usize,
    /// Whisper model identifier, e.g. "base" or "tiny.en".
    pub whisper_model: String,
    /// Silence tail (ms) that ends an utterance.
    pub duration_time_ms: u64,
    /// Fast VAD aggressiveness, 0..=3.
    pub aggresiveness: u8,
    /// PCM sample rate in Hz.
    pub sample_rate: u32,
    /// Chunk duration in ms; the fast VAD accepts 10, 20 or 30.
    pub chunk_size_ms: u64,
    /// Dwell (ms) in ACTIVE before the neural VAD is consulted.
    pub active_to_detection_ms: u64,
    /// Hard cap on the chunks buffered for one utterance.
    pub max_buffered_chunks: usize,
    /// Worker threads in the transcriber pool.
    pub transcriber_threads: usize,
    /// Evaluate the neural VAD every K-th chunk while speaking; 1 checks
    /// every chunk.
    pub neural_vad_every_chunks: usize,
}

impl Default for SttConfig {
    fn default() -> Self {
        SttConfig {
            vad_threads: 4,
            whisper_model: "base".to_string(),
            duration_time_ms: 1200,
            aggresiveness: 3,
            sample_rate: 16000,
            chunk_size_ms: 30,
            active_to_detection_ms: 900,
            max_buffered_chunks: 500,
            transcriber_threads: 1,
            neural_vad_every_chunks: 1,
        }
    }
}

impl SttConfig {
    /// Load `stt_config.json` from the data directory.
    ///
    /// A missing file yields the defaults; a present file overrides the keys
    /// it names and is validated.
    pub fn load(data_dir: impl AsRef<Path>) -> Result<Self, SttError> {
        let path = data_dir.as_ref().join(CONFIG_FILE);
        if !path.exists() {
            return Ok(SttConfig::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: SttConfig = serde_json::from_str(&content)
            .map_err(|e| SttError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SttError> {
        if !matches!(self.chunk_size_ms, 10 | 20 | 30) {
            return Err(SttError::Config(format!(
                "chunk_size_ms must be 10, 20 or 30, got {}",
                self.chunk_size_ms
            )));
        }
        if self.aggresiveness > 3 {
            return Err(SttError::Config(format!(
                "aggresiveness must be in 0..=3, got {}",
                self.aggresiveness
            )));
        }
        if self.sample_rate != 16000 {
            // The whole pipeline runs at 16 kHz; resampling is out of scope.
            return Err(SttError::Config(format!(
                "sample_rate must be 16000, got {}",
                self.sample_rate
            )));
        }
        if self.vad_threads == 0 || self.transcriber_threads == 0 {
            return Err(SttError::Config("pool sizes must be at least 1".to_string()));
        }
        if self.neural_vad_every_chunks == 0 {
            return Err(SttError::Config(
                "neural_vad_every_chunks must be at least 1".to_string(),
            ));
        }
        if self.max_buffered_chunks == 0 {
            return Err(SttError::Config(
                "max_buffered_chunks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Bytes in one chunk of 16-bit mono PCM.
    pub fn chunk_bytes(&self) -> usize {
        (self.sample_rate as u64 * self.chunk_size_ms / 1000) as usize * 2
    }

    /// Chunks of silence that end an utterance.
    pub fn max_silence_chunks(&self) -> usize {
        (self.duration_time_ms / self.chunk_size_ms) as usize
    }

    /// Chunks of dwell before the neural VAD is consulted.
    pub fn min_active_chunks(&self) -> usize {
        (self.active_to_detection_ms / self.chunk_size_ms) as usize
    }
}
