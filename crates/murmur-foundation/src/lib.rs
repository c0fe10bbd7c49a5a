pub mod error;
pub mod state;

pub use error::{AppError, AudioError};
pub use state::{RecordingMode, RecordingState};
