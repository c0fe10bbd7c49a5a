pub mod capture;
pub mod frame;
pub mod resampler;
pub mod source;

pub use capture::{CaptureConfig, MicCapture};
pub use frame::{AudioFrame, FRAME_DURATION_MS, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use resampler::StreamResampler;
pub use source::FrameAssembler;

use murmur_foundation::AudioError;
use tokio::sync::broadcast;

/// Seam between the recorder and the physical microphone so tests can feed
/// synthetic frames.
pub trait AudioSource: Send + Sync {
    fn start(&self) -> Result<(), AudioError>;
    /// Stop capture. Sends a flush first, so the final partial frame reaches
    /// subscribers before the device is torn down.
    fn stop(&self);
    fn subscribe(&self) -> broadcast::Receiver<AudioFrame>;
    /// Fatal failures after a successful `start` (device loss, stream
    /// errors). One message per failed capture run; the source stops
    /// producing frames once it has reported here.
    fn subscribe_failures(&self) -> broadcast::Receiver<String>;
}
