//! Sequence-level checks of the hysteresis contract: transitions happen only
//! after the configured consecutive-frame runs, and events fire exactly on
//! the edges.

use murmur_vad::{VadConfig, VadEvent, VadStateMachine};

fn run(machine: &mut VadStateMachine, probs: &[f32]) -> Vec<VadEvent> {
    probs.iter().filter_map(|&p| machine.process(p)).collect()
}

#[test]
fn one_event_per_edge_for_a_full_utterance() {
    let mut m = VadStateMachine::new(&VadConfig::default());

    // Lead-in silence, speech burst, trailing silence past the redemption
    // window.
    let mut probs = vec![0.0; 5];
    probs.extend(vec![0.8; 20]);
    probs.extend(vec![0.0; 10]);

    let events = run(&mut m, &probs);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], VadEvent::SpeechStart { .. }));
    assert!(matches!(events[1], VadEvent::SpeechEnd { .. }));
}

#[test]
fn isolated_noise_spikes_never_trigger() {
    let mut m = VadStateMachine::new(&VadConfig::default());

    // Two-frame spikes separated by silence never reach the 3-frame onset.
    let mut probs = Vec::new();
    for _ in 0..10 {
        probs.extend([0.9, 0.9, 0.0, 0.0]);
    }
    assert!(run(&mut m, &probs).is_empty());
    assert!(!m.is_speaking());
}

#[test]
fn breath_pauses_are_absorbed_mid_utterance() {
    let mut m = VadStateMachine::new(&VadConfig::default());

    // Speech with repeated 5-frame gaps: a single utterance, no end events
    // until the long tail of silence.
    let mut probs = vec![0.8; 3];
    for _ in 0..4 {
        probs.extend(vec![0.0; 5]);
        probs.extend(vec![0.8; 3]);
    }
    probs.extend(vec![0.0; 8]);

    let events = run(&mut m, &probs);
    assert_eq!(events.len(), 2, "gaps inside the window must not split: {:?}", events);
}

#[test]
fn speech_end_duration_spans_the_utterance() {
    let mut m = VadStateMachine::new(&VadConfig::default());
    let mut probs = vec![0.8; 33]; // ~1s of speech at 32ms frames
    probs.extend(vec![0.0; 8]);

    let events = run(&mut m, &probs);
    let Some(VadEvent::SpeechEnd { duration_ms, .. }) = events.last().copied() else {
        panic!("expected SpeechEnd, got {:?}", events);
    };
    // 30 speech frames after onset plus the 8-frame tail.
    assert!(
        (900..=1500).contains(&duration_ms),
        "duration {}ms outside expected envelope",
        duration_ms
    );
}

#[test]
fn alternating_frames_at_threshold_edges() {
    // probability exactly 0.1 is silence, so alternating 0.1 / 0.11 never
    // accumulates 3 consecutive speech frames.
    let mut m = VadStateMachine::new(&VadConfig::default());
    let probs: Vec<f32> = (0..100)
        .map(|i| if i % 2 == 0 { 0.11 } else { 0.1 })
        .collect();
    assert!(run(&mut m, &probs).is_empty());
}

#[test]
fn custom_debounce_windows_are_honored() {
    let config = VadConfig {
        speech_start_frames: 1,
        redemption_frames: 2,
        ..Default::default()
    };
    let mut m = VadStateMachine::new(&config);

    assert!(matches!(m.process(0.5), Some(VadEvent::SpeechStart { .. })));
    assert_eq!(m.process(0.0), None);
    assert!(matches!(m.process(0.0), Some(VadEvent::SpeechEnd { .. })));
}
