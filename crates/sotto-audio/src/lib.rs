//! PCM containers for the speech pipeline.
//!
//! Audio enters the system as fixed-duration chunks of 16-bit little-endian
//! mono PCM; this crate holds them and produces the sample views the
//! detection and transcription stages consume.

pub mod audio_buffer;
pub mod pcm;

pub use audio_buffer::AudioBuffer;
