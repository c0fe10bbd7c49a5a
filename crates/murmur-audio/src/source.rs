use crate::frame::AudioFrame;

/// Buffers a continuous sample stream and cuts it into fixed-size frames.
///
/// Full frames are emitted as soon as enough samples accumulate; leftover
/// remainder samples stay buffered for the next push and are never dropped.
/// `flush` emits exactly one final frame with whatever remains.
pub struct FrameAssembler {
    buffer: Vec<f32>,
    frame_size: usize,
    sample_rate_hz: u32,
    samples_emitted: u64,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, sample_rate_hz: u32) -> Self {
        Self {
            buffer: Vec::with_capacity(frame_size * 2),
            frame_size,
            sample_rate_hz,
            samples_emitted: 0,
        }
    }

    /// Append samples and return every full frame now available.
    pub fn push(&mut self, samples: &[f32]) -> Vec<AudioFrame> {
        self.buffer.extend_from_slice(samples);

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let rest = self.buffer.split_off(self.frame_size);
            let full = std::mem::replace(&mut self.buffer, rest);
            frames.push(self.emit(full, false));
        }
        frames
    }

    /// Emit the single final frame, possibly shorter than the frame size or
    /// empty, and clear the buffer.
    pub fn flush(&mut self) -> AudioFrame {
        let remainder = std::mem::take(&mut self.buffer);
        self.emit(remainder, true)
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn emit(&mut self, samples: Vec<f32>, is_final: bool) -> AudioFrame {
        let timestamp_ms = self.samples_emitted * 1000 / self.sample_rate_hz as u64;
        self.samples_emitted += samples.len() as u64;
        AudioFrame {
            samples,
            timestamp_ms,
            is_final,
        }
    }
}
