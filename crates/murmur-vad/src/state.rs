use crate::config::VadConfig;
use crate::types::{VadEvent, VadState};

/// Hysteresis state machine over per-frame speech probabilities.
///
/// At most one of the two counters is actively incrementing at a time: a
/// frame that does not match the current regime resets the counter of the
/// other regime, not both.
pub struct VadStateMachine {
    state: VadState,
    speech_frames: u32,
    silence_frames: u32,
    threshold: f32,
    speech_start_frames: u32,
    redemption_frames: u32,
    speech_start_ms: u64,
    frames_processed: u64,
    frame_duration_ms: f32,
}

impl VadStateMachine {
    pub fn new(config: &VadConfig) -> Self {
        Self {
            state: VadState::Silence,
            speech_frames: 0,
            silence_frames: 0,
            threshold: config.threshold,
            speech_start_frames: config.speech_start_frames,
            redemption_frames: config.redemption_frames,
            speech_start_ms: 0,
            frames_processed: 0,
            frame_duration_ms: config.frame_duration_ms(),
        }
    }

    /// Feed one frame's speech probability. Returns an event only on a
    /// transition edge.
    pub fn process(&mut self, probability: f32) -> Option<VadEvent> {
        self.frames_processed += 1;
        // Strictly greater: exactly the threshold classifies as silence.
        let is_speech = probability > self.threshold;

        match self.state {
            VadState::Silence => {
                if is_speech {
                    self.speech_frames += 1;
                    self.silence_frames = 0;

                    if self.speech_frames >= self.speech_start_frames {
                        self.state = VadState::Speaking;
                        self.speech_frames = 0;
                        self.speech_start_ms = self.current_timestamp_ms();
                        return Some(VadEvent::SpeechStart {
                            timestamp_ms: self.speech_start_ms,
                        });
                    }
                } else {
                    self.speech_frames = 0;
                }
            }

            VadState::Speaking => {
                if !is_speech {
                    self.silence_frames += 1;
                    self.speech_frames = 0;

                    if self.silence_frames >= self.redemption_frames {
                        self.state = VadState::Silence;
                        self.silence_frames = 0;
                        let timestamp_ms = self.current_timestamp_ms();
                        return Some(VadEvent::SpeechEnd {
                            timestamp_ms,
                            duration_ms: timestamp_ms.saturating_sub(self.speech_start_ms).max(1),
                        });
                    }
                } else {
                    self.silence_frames = 0;
                }
            }
        }

        None
    }

    pub fn current_state(&self) -> VadState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.state == VadState::Speaking
    }

    /// Zero both counters and force not-speaking. Fires no event.
    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.speech_frames = 0;
        self.silence_frames = 0;
        self.speech_start_ms = 0;
        self.frames_processed = 0;
    }

    fn current_timestamp_ms(&self) -> u64 {
        (self.frames_processed as f32 * self.frame_duration_ms) as u64
    }
}
