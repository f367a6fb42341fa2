use crate::pcm;

/// An append-only sequence of PCM chunks making up one utterance candidate.
///
/// Chunks are 16-bit little-endian mono PCM. The buffer keeps them in
/// insertion order and produces concatenated byte / i16 / f32 views on
/// demand. There is no internal locking: a buffer has a single writer, and
/// once it is handed to an inference worker it is not touched again.
#[derive(Debug, Default, Clone)]
pub struct AudioBuffer {
    chunks: Vec<Vec<u8>>,
}

impl AudioBuffer {
    pub fn new() -> Self {
        AudioBuffer { chunks: Vec::new() }
    }

    /// Build a buffer holding a single chunk.
    pub fn from_chunk(chunk: Vec<u8>) -> Self {
        AudioBuffer { chunks: vec![chunk] }
    }

    pub fn append(&mut self, chunk: Vec<u8>) {
        self.chunks.push(chunk);
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Concatenate all chunks in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let total = self.chunks.iter().map(|c| c.len()).sum();
        let mut bytes = Vec::with_capacity(total);
        for chunk in &self.chunks {
            bytes.extend_from_slice(chunk);
        }
        bytes
    }

    /// View the buffer as signed 16-bit samples.
    pub fn to_i16(&self) -> Vec<i16> {
        pcm::bytes_to_i16(&self.to_bytes())
    }

    /// View the buffer as f32 samples normalized into [-1.0, 1.0).
    pub fn to_f32(&self) -> Vec<f32> {
        pcm::i16_to_f32(&self.to_i16())
    }
}
