use sotto_stt::mock::{MockChunkVad, MockTranscriber, MockWindowVad};
use sotto_stt::{AudioStreamStateMachine, SttConfig, SttError, StreamState, WindowVad};
use std::sync::Arc;

const CHUNK: [u8; 960] = [0u8; 960];

fn machine(
    fast: Arc<MockChunkVad>,
    window: Arc<MockWindowVad>,
    stt: Arc<MockTranscriber>,
    config: &SttConfig,
) -> AudioStreamStateMachine {
    AudioStreamStateMachine::new(config, fast, window, stt)
}

#[tokio::test]
async fn pure_silence_produces_no_transitions() {
    let fast = Arc::new(MockChunkVad::always(false));
    let window = Arc::new(MockWindowVad::always(false));
    let stt = Arc::new(MockTranscriber::always("never"));
    let mut sm = machine(fast, Arc::clone(&window), Arc::clone(&stt), &SttConfig::default());

    for _ in 0..100 {
        let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
        assert_eq!(old, StreamState::Silence);
        assert_eq!(new, StreamState::Silence);
        assert!(task.is_none());
    }
    assert_eq!(sm.buffered_chunks(), 0);
    assert_eq!(window.calls(), 0);
    assert_eq!(stt.calls(), 0);
}

#[tokio::test]
async fn noise_probe_is_discarded_without_events() {
    // The fast gate fires but the classifier rejects the probe window.
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(false));
    let stt = Arc::new(MockTranscriber::always("never"));
    let mut sm = machine(fast, Arc::clone(&window), Arc::clone(&stt), &SttConfig::default());

    let (old, new, _) = sm.feed(&CHUNK).await.unwrap();
    assert_eq!((old, new), (StreamState::Silence, StreamState::Active));

    for _ in 1..29 {
        let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
        assert_eq!((old, new), (StreamState::Active, StreamState::Active));
        assert!(task.is_none());
    }

    // Chunk 30 reaches the detection threshold and gets rejected.
    let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
    assert_eq!((old, new), (StreamState::Active, StreamState::Silence));
    assert!(task.is_none());
    assert_eq!(sm.buffered_chunks(), 0);
    assert_eq!(window.calls(), 1);
    assert_eq!(stt.calls(), 0);
}

#[tokio::test]
async fn clean_utterance_starts_stops_and_transcribes() {
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(false));
    window.push(true); // the probe window is confirmed
    let stt = Arc::new(MockTranscriber::always("hello world"));
    let mut sm = machine(fast, Arc::clone(&window), Arc::clone(&stt), &SttConfig::default());

    for _ in 0..29 {
        sm.feed(&CHUNK).await.unwrap();
    }
    let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
    assert_eq!((old, new), (StreamState::Active, StreamState::Speaking));
    assert!(task.is_none());

    // 40 unvoiced windows = the 1200 ms silence tail.
    for i in 0..39 {
        let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
        assert_eq!((old, new), (StreamState::Speaking, StreamState::Speaking), "chunk {i}");
        assert!(task.is_none());
    }
    let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
    assert_eq!((old, new), (StreamState::Speaking, StreamState::Silence));

    let text = task.unwrap().await.unwrap().unwrap();
    assert_eq!(text, "hello world");
    assert_eq!(sm.buffered_chunks(), 0);
    assert_eq!(stt.calls(), 1);
}

#[tokio::test]
async fn runaway_utterance_is_cut_at_the_buffer_cap() {
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(true));
    let stt = Arc::new(MockTranscriber::always("long story"));
    let config = SttConfig::default();
    let mut sm = machine(fast, window, Arc::clone(&stt), &config);

    let mut start_seen_at = None;
    let mut finished_at = None;
    for i in 1..=500 {
        let (old, new, task) = sm.feed(&CHUNK).await.unwrap();
        assert!(sm.buffered_chunks() <= config.max_buffered_chunks);
        if (old, new) == (StreamState::Active, StreamState::Speaking) {
            start_seen_at = Some(i);
        }
        if let Some(task) = task {
            assert_eq!((old, new), (StreamState::Speaking, StreamState::Silence));
            assert_eq!(task.await.unwrap().unwrap(), "long story");
            finished_at = Some(i);
        }
    }

    assert_eq!(start_seen_at, Some(30));
    assert_eq!(finished_at, Some(500));
    assert_eq!(sm.buffered_chunks(), 0);
}

#[tokio::test]
async fn voiced_window_resets_the_silence_counter() {
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(false));
    window.push(true); // enter SPEAKING
    let stt = Arc::new(MockTranscriber::always("x"));
    let config = SttConfig {
        duration_time_ms: 90, // 3 chunks of tail
        active_to_detection_ms: 30,
        ..SttConfig::default()
    };
    let mut sm = machine(fast, Arc::clone(&window), Arc::clone(&stt), &config);

    sm.feed(&CHUNK).await.unwrap(); // SILENCE -> ACTIVE
    sm.feed(&CHUNK).await.unwrap(); // ACTIVE -> SPEAKING (scripted true)

    // Two unvoiced windows, then a voiced one clears the tail count.
    window.push(false);
    window.push(false);
    window.push(true);
    for _ in 0..3 {
        let (_, new, task) = sm.feed(&CHUNK).await.unwrap();
        assert_eq!(new, StreamState::Speaking);
        assert!(task.is_none());
    }

    // It now takes the full three unvoiced windows to finish.
    for _ in 0..2 {
        let (_, new, _) = sm.feed(&CHUNK).await.unwrap();
        assert_eq!(new, StreamState::Speaking);
    }
    let (_, new, task) = sm.feed(&CHUNK).await.unwrap();
    assert_eq!(new, StreamState::Silence);
    assert!(task.is_some());
}

#[tokio::test]
async fn strided_classification_still_honors_the_cap() {
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(true));
    let stt = Arc::new(MockTranscriber::always("x"));
    let config = SttConfig {
        active_to_detection_ms: 30,
        max_buffered_chunks: 10,
        neural_vad_every_chunks: 4,
        ..SttConfig::default()
    };
    let mut sm = machine(fast, Arc::clone(&window), Arc::clone(&stt), &config);

    sm.feed(&CHUNK).await.unwrap(); // -> ACTIVE
    sm.feed(&CHUNK).await.unwrap(); // -> SPEAKING
    let calls_after_entry = window.calls();

    let mut finished = false;
    for _ in 0..8 {
        let (_, _, task) = sm.feed(&CHUNK).await.unwrap();
        assert!(sm.buffered_chunks() <= config.max_buffered_chunks);
        if task.is_some() {
            finished = true;
        }
    }
    assert!(finished, "cap must cut the utterance even between checks");
    // 8 speaking chunks at stride 4, minus the cap chunk that skips the
    // classifier: one check.
    assert_eq!(window.calls() - calls_after_entry, 1);
}

#[tokio::test]
async fn classifier_error_surfaces_from_feed() {
    let fast = Arc::new(MockChunkVad::always(true));
    let window = Arc::new(MockWindowVad::always(false));
    window.push_err(SttError::Inference("onnx exploded".to_string()));
    let stt = Arc::new(MockTranscriber::always("x"));
    let config = SttConfig {
        active_to_detection_ms: 30,
        ..SttConfig::default()
    };
    let mut sm = machine(fast, window, stt, &config);

    sm.feed(&CHUNK).await.unwrap();
    let err = sm.feed(&CHUNK).await.err().unwrap();
    assert!(matches!(err, SttError::Inference(_)));
}

#[tokio::test]
async fn dropped_classifier_result_maps_to_canceled() {
    struct DroppingWindowVad;

    impl WindowVad for DroppingWindowVad {
        fn start(&self) -> Result<(), SttError> {
            Ok(())
        }
        fn close(&self) {}
        fn is_active(&self, _samples: Vec<f32>) -> sotto_stt::VadOutcome {
            let (tx, rx) = tokio::sync::oneshot::channel();
            drop(tx);
            rx
        }
    }

    let fast = Arc::new(MockChunkVad::always(true));
    let stt = Arc::new(MockTranscriber::always("x"));
    let config = SttConfig {
        active_to_detection_ms: 30,
        ..SttConfig::default()
    };
    let mut sm = AudioStreamStateMachine::new(&config, fast, Arc::new(DroppingWindowVad), stt);

    sm.feed(&CHUNK).await.unwrap();
    let err = sm.feed(&CHUNK).await.err().unwrap();
    assert!(matches!(err, SttError::Canceled));
}
