use serde::{Deserialize, Serialize};

use murmur_audio::{FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VadConfig {
    /// A frame is speech iff its probability is strictly greater than this.
    /// A probability exactly equal to the threshold counts as silence.
    pub threshold: f32,
    /// Consecutive speech frames required to enter Speaking. Rejects
    /// single-frame noise spikes.
    pub speech_start_frames: u32,
    /// Consecutive silence frames required to leave Speaking (the redemption
    /// window). Absorbs breaths and word gaps.
    pub redemption_frames: u32,
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for VadConfig {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            speech_start_frames: 3,
            redemption_frames: 8,
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

impl VadConfig {
    pub fn frame_duration_ms(&self) -> f32 {
        (self.frame_size_samples as f32 * 1000.0) / self.sample_rate_hz as f32
    }
}
