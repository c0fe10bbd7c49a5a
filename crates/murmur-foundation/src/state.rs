use serde::{Deserialize, Serialize};

/// Lifecycle state of the recorder. Exactly one session may be active at a
/// time; everything outside a session is `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingState {
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl RecordingState {
    /// Validate a lifecycle transition. `Starting -> Stopping` covers a stop
    /// or error that arrives before capture is confirmed live.
    pub fn can_transition(self, to: RecordingState) -> bool {
        use RecordingState::*;
        matches!(
            (self, to),
            (Idle, Starting)
                | (Starting, Recording)
                | (Starting, Stopping)
                | (Recording, Stopping)
                | (Stopping, Idle)
        )
    }
}

/// How the current session was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RecordingMode {
    /// No session active.
    #[default]
    Idle,
    /// Active while the bound key combination is held down.
    PushToTalk,
    /// One press starts, a second press stops.
    Toggle,
}
