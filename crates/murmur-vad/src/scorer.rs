/// Maps an audio frame to a speech probability in [0, 1].
///
/// The state machine only sees probabilities, so the scoring backend is a
/// seam: the default is energy-based, an ML scorer drops in behind the same
/// trait.
pub trait SpeechScorer: Send {
    fn score(&mut self, frame: &[f32]) -> f32;
    fn reset(&mut self) {}
}

/// Short-term energy scorer. RMS is converted to dBFS and mapped linearly
/// onto [0, 1] between a noise floor and a nominal speech level.
pub struct EnergyScorer {
    floor_dbfs: f32,
    ceiling_dbfs: f32,
}

impl EnergyScorer {
    pub fn new(floor_dbfs: f32, ceiling_dbfs: f32) -> Self {
        Self {
            floor_dbfs,
            ceiling_dbfs,
        }
    }

    fn rms(frame: &[f32]) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let sum_squares: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_squares / frame.len() as f64).sqrt() as f32
    }

    fn rms_to_dbfs(rms: f32) -> f32 {
        if rms <= 1e-10 {
            return -100.0;
        }
        20.0 * rms.log10()
    }
}

impl Default for EnergyScorer {
    fn default() -> Self {
        // -55 dBFS noise floor, -25 dBFS nominal speech.
        Self::new(-55.0, -25.0)
    }
}

impl SpeechScorer for EnergyScorer {
    fn score(&mut self, frame: &[f32]) -> f32 {
        let dbfs = Self::rms_to_dbfs(Self::rms(frame));
        ((dbfs - self.floor_dbfs) / (self.ceiling_dbfs - self.floor_dbfs)).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_audio::FRAME_SIZE_SAMPLES;

    #[test]
    fn digital_silence_scores_zero() {
        let mut scorer = EnergyScorer::default();
        assert_eq!(scorer.score(&vec![0.0; FRAME_SIZE_SAMPLES]), 0.0);
    }

    #[test]
    fn full_scale_scores_one() {
        let mut scorer = EnergyScorer::default();
        assert_eq!(scorer.score(&vec![1.0; FRAME_SIZE_SAMPLES]), 1.0);
    }

    #[test]
    fn empty_frame_scores_zero() {
        let mut scorer = EnergyScorer::default();
        assert_eq!(scorer.score(&[]), 0.0);
    }

    #[test]
    fn score_increases_with_level() {
        let mut scorer = EnergyScorer::default();
        let quiet = scorer.score(&vec![0.005; FRAME_SIZE_SAMPLES]);
        let loud = scorer.score(&vec![0.05; FRAME_SIZE_SAMPLES]);
        assert!(loud > quiet);
    }
}
