//! End-to-end run against the real models.
//!
//! The ignored test needs a populated data directory and a spoken clip:
//!
//! ```text
//! SOTTO_DATA=<dir>            with whisper/ggml-base.bin (or downloadable)
//!                             and whisper/warmup_7s_f32.pcm
//! SOTTO_TEST_CLIP=<path>      raw 16-bit LE mono 16 kHz PCM of the sentence
//! SOTTO_TEST_TRANSCRIPT=<s>   the reference transcript
//! ```
//!
//! Run with `cargo test -- --ignored`.

use sotto_stt::{
    SileroVadPool, SttConfig, SttEvent, SttService, WebrtcChunkVad, WhisperPool,
};
use std::sync::Arc;

/// Lowercase, strip punctuation, collapse whitespace.
fn normalize_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for c in text.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_space = false;
        } else if c.is_whitespace() && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    out.trim_end().to_string()
}

/// Similarity in [0, 1]: 2 * LCS / (|a| + |b|) over characters.
fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let mut row = vec![0usize; b.len() + 1];
    for &ca in &a {
        let mut prev_diag = 0;
        for (j, &cb) in b.iter().enumerate() {
            let up = row[j + 1];
            row[j + 1] = if ca == cb {
                prev_diag + 1
            } else {
                up.max(row[j])
            };
            prev_diag = up;
        }
    }
    2.0 * row[b.len()] as f64 / (a.len() + b.len()) as f64
}

#[test]
fn normalize_strips_punctuation_and_case() {
    assert_eq!(
        normalize_text("You are given an INTEGER matrix, grid!"),
        "you are given an integer matrix grid"
    );
}

#[test]
fn similarity_is_one_for_equal_and_low_for_disjoint() {
    assert!((similarity("abc", "abc") - 1.0).abs() < 1e-9);
    assert!(similarity("aaaa", "zzzz") < 0.1);
    assert!(similarity("hello world", "hello word") > 0.9);
}

#[tokio::test(flavor = "multi_thread")]
#[ignore = "needs model weights, the warm-up asset and a reference clip"]
async fn transcribes_reference_clip_end_to_end() {
    let data_dir = std::env::var("SOTTO_DATA").expect("SOTTO_DATA not set");
    let clip_path = std::env::var("SOTTO_TEST_CLIP").expect("SOTTO_TEST_CLIP not set");
    let reference = std::env::var("SOTTO_TEST_TRANSCRIPT").expect("SOTTO_TEST_TRANSCRIPT not set");

    let config = SttConfig::load(&data_dir).unwrap();
    let chunk_bytes = config.chunk_bytes();

    let fast = Arc::new(WebrtcChunkVad::new(&config).unwrap());
    let window = Arc::new(SileroVadPool::new(&config));
    let whisper = Arc::new(WhisperPool::new(&config, &data_dir).unwrap());
    let service = SttService::new(config, fast, window, whisper).unwrap();
    service.start().unwrap();

    let (mut stream, id) = service.connect().unwrap();

    // The clip followed by 1.5 s of silence to close the utterance.
    let mut audio = std::fs::read(&clip_path).unwrap();
    audio.resize(audio.len() + 16000 * 3, 0);
    for chunk in audio.chunks(chunk_bytes) {
        if chunk.len() < chunk_bytes {
            break;
        }
        service.feed(id, chunk).await.unwrap();
    }

    assert_eq!(stream.next().await, Some(SttEvent::StartSpeaking));
    assert_eq!(stream.next().await, Some(SttEvent::StopSpeaking));
    let Some(SttEvent::Text(text)) = stream.next().await else {
        panic!("expected a transcript event");
    };

    let score = similarity(&normalize_text(&reference), &normalize_text(&text));
    assert!(
        score >= 0.7,
        "similarity {score:.2} below 0.7\nexpected: {reference}\nactual: {text}"
    );

    service.disconnect(id).unwrap();
    service.close();
}
