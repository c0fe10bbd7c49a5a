/// Result of one submitted segment. Failures stay visible in the final
/// transcript rather than silently dropping text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutcome {
    Transcribed(String),
    Failed(String),
}

/// The session's combined result, ordered by segment sequence number.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub segments: Vec<(u64, SegmentOutcome)>,
}

impl Transcript {
    /// Concatenation of the successful segments, in sequence order.
    pub fn text(&self) -> String {
        let parts: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|(_, outcome)| match outcome {
                SegmentOutcome::Transcribed(text) => {
                    let trimmed = text.trim();
                    (!trimmed.is_empty()).then_some(trimmed)
                }
                SegmentOutcome::Failed(_) => None,
            })
            .collect();
        parts.join(" ")
    }

    /// Sequence numbers whose transcription failed.
    pub fn failed_segments(&self) -> Vec<u64> {
        self.segments
            .iter()
            .filter_map(|(seq, outcome)| {
                matches!(outcome, SegmentOutcome::Failed(_)).then_some(*seq)
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_joins_successes_and_skips_failures() {
        let transcript = Transcript {
            segments: vec![
                (0, SegmentOutcome::Transcribed("hello".into())),
                (1, SegmentOutcome::Failed("timeout".into())),
                (2, SegmentOutcome::Transcribed(" world ".into())),
            ],
        };
        assert_eq!(transcript.text(), "hello world");
        assert_eq!(transcript.failed_segments(), vec![1]);
    }

    #[test]
    fn empty_transcript_yields_empty_text() {
        let transcript = Transcript::default();
        assert!(transcript.is_empty());
        assert_eq!(transcript.text(), "");
    }
}
