pub mod config;
pub mod processor;
pub mod scorer;
pub mod state;
pub mod types;

pub use config::VadConfig;
pub use processor::VadProcessor;
pub use scorer::{EnergyScorer, SpeechScorer};
pub use state::VadStateMachine;
pub use types::{VadEvent, VadState};
