#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Speaking,
}

/// Fired only on transition edges, never on steady-state frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VadEvent {
    SpeechStart {
        timestamp_ms: u64,
    },
    SpeechEnd {
        timestamp_ms: u64,
        duration_ms: u64,
    },
}
