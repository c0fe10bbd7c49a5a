use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use murmur_foundation::AudioError;

/// Streaming mono resampler bringing arbitrary device rates to the pipeline
/// rate. Accumulates input until rubato's fixed chunk size is available, so
/// callers may feed arbitrary-sized callback buffers.
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: SincFixedIn<f32>,
    input_buffer: Vec<f32>,
    chunk_size: usize,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Result<Self, AudioError> {
        let chunk_size = 512;
        // Speech-grade sinc settings; cutoff below Nyquist for anti-aliasing.
        let sinc_params = SincInterpolationParameters {
            sinc_len: 64,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Cubic,
            oversampling_factor: 128,
            window: WindowFunction::Blackman2,
        };
        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            sinc_params,
            chunk_size,
            1,
        )
        .map_err(|e| AudioError::Fatal(format!("failed to create resampler: {}", e)))?;

        Ok(Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            chunk_size,
        })
    }

    /// Feed an arbitrary chunk of mono samples, returning whatever resampled
    /// output became available. Bounded-time; safe from the capture callback.
    pub fn process(&mut self, input: &[f32]) -> Vec<f32> {
        if self.in_rate == self.out_rate {
            return input.to_vec();
        }

        self.input_buffer.extend_from_slice(input);

        let mut output = Vec::new();
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            match self.resampler.process(&[chunk], None) {
                Ok(mut frames) => {
                    if !frames.is_empty() {
                        output.append(&mut frames[0]);
                    }
                }
                Err(e) => {
                    tracing::error!("Resampler error: {}", e);
                    return output;
                }
            }
        }
        output
    }

    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.resampler.reset();
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}
