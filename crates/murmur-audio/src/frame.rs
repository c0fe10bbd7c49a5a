/// Fixed frame length shared by the whole pipeline: 512 samples = 32 ms at
/// 16 kHz.
pub const FRAME_SIZE_SAMPLES: usize = 512;
pub const SAMPLE_RATE_HZ: u32 = 16_000;
pub const FRAME_DURATION_MS: f32 = FRAME_SIZE_SAMPLES as f32 * 1000.0 / SAMPLE_RATE_HZ as f32;

/// One frame of normalized mono samples in [-1, 1]. Frames are ephemeral:
/// they flow from the assembler to the VAD and the encoder and are never
/// persisted as-is.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    /// Offset from capture start, derived from samples emitted so far.
    pub timestamp_ms: u64,
    /// True only for the single trailing frame emitted by a flush. May be
    /// shorter than `FRAME_SIZE_SAMPLES`, or empty.
    pub is_final: bool,
}
