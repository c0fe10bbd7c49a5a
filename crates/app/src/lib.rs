//! The Murmur application: settings, the recording controller, and the
//! runtime wiring that connects capture, VAD, transcription, shortcuts, and
//! the native helper into one pipeline.

pub mod controller;
pub mod metrics;
pub mod runtime;
pub mod settings;

pub use controller::{ControllerConfig, ControllerEvent, RecordingController};
pub use metrics::PipelineMetrics;
pub use runtime::{AppHandle, AppRuntimeOptions};
pub use settings::AppSettings;
