//! Conversions between raw PCM bytes and sample views.

/// Reinterpret 16-bit little-endian PCM bytes as signed samples.
///
/// A trailing odd byte is ignored; chunk validation upstream keeps byte
/// lengths even.
pub fn bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Normalize signed 16-bit samples into [-1.0, 1.0).
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples.iter().map(|&s| s as f32 / 32768.0).collect()
}
