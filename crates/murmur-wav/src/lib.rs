pub mod writer;

pub use writer::{EncoderError, StreamingWavWriter, WavSpec};
