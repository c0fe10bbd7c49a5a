//! Transcription: segmenting captured audio at VAD-derived flush points and
//! submitting the segments to an external speech-to-text provider.

pub mod provider;
pub mod session;
pub mod types;

pub use provider::{HttpProvider, SttError, TranscriptionProvider};
pub use session::{SessionConfig, TranscriptionSession};
pub use types::{SegmentOutcome, Transcript};
