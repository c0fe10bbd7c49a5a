use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::provider::{SttError, TranscriptionProvider};
use crate::types::{SegmentOutcome, Transcript};
use murmur_audio::AudioFrame;
use murmur_vad::VadEvent;
use murmur_wav::{StreamingWavWriter, WavSpec};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Accumulated silence after speech that closes the current segment.
    pub silence_flush_ms: u64,
    /// Hard cap on segment length, applied regardless of VAD state.
    pub max_segment_ms: u64,
    pub sample_rate_hz: u32,
    pub language: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            silence_flush_ms: 3_000,
            max_segment_ms: 30_000,
            sample_rate_hz: murmur_audio::SAMPLE_RATE_HZ,
            language: None,
        }
    }
}

/// Chops the incoming frame stream into WAV segments at VAD-derived flush
/// points and submits each finalized segment to the provider without
/// stalling capture: a new container opens the moment the old one is
/// submitted. Results carry sequence numbers so out-of-order network
/// completions are reordered before concatenation.
pub struct TranscriptionSession {
    provider: Arc<dyn TranscriptionProvider>,
    config: SessionConfig,
    scratch_dir: PathBuf,
    writer: Option<StreamingWavWriter>,
    next_seq: u64,
    /// Bumped on cancel; results from earlier generations are discarded.
    generation: u64,
    speaking: bool,
    has_speech: bool,
    silence_ms: u64,
    buffered_ms: u64,
    pending: JoinSet<(u64, u64, SegmentOutcome)>,
    completed: BTreeMap<u64, SegmentOutcome>,
}

impl TranscriptionSession {
    pub fn new(
        provider: Arc<dyn TranscriptionProvider>,
        config: SessionConfig,
        scratch_dir: &Path,
    ) -> Result<Self, SttError> {
        let mut session = Self {
            provider,
            config,
            scratch_dir: scratch_dir.to_path_buf(),
            writer: None,
            next_seq: 0,
            generation: 0,
            speaking: false,
            has_speech: false,
            silence_ms: 0,
            buffered_ms: 0,
            pending: JoinSet::new(),
            completed: BTreeMap::new(),
        };
        session.open_writer()?;
        Ok(session)
    }

    /// Append one frame and apply the flush triggers. Cheap enough to sit on
    /// the frame path: network submission happens out-of-band.
    pub fn handle_frame(&mut self, frame: &AudioFrame) -> Result<(), SttError> {
        if self.writer.is_none() {
            // Cancelled; frames still in flight are dropped.
            return Ok(());
        }
        if let Some(writer) = &mut self.writer {
            writer.append(&frame.samples)?;
        }

        let frame_ms = frame.samples.len() as u64 * 1_000 / self.config.sample_rate_hz as u64;
        self.buffered_ms += frame_ms;
        if self.speaking {
            self.silence_ms = 0;
        } else {
            self.silence_ms += frame_ms;
        }

        let silence_trigger =
            self.has_speech && self.silence_ms >= self.config.silence_flush_ms;
        let duration_trigger = self.buffered_ms >= self.config.max_segment_ms;
        if silence_trigger || duration_trigger {
            debug!(
                buffered_ms = self.buffered_ms,
                silence_ms = self.silence_ms,
                "segment flush triggered"
            );
            self.flush_segment()?;
        }
        Ok(())
    }

    pub fn handle_vad(&mut self, event: &VadEvent) {
        match event {
            VadEvent::SpeechStart { .. } => {
                self.speaking = true;
                self.has_speech = true;
                self.silence_ms = 0;
            }
            VadEvent::SpeechEnd { .. } => {
                self.speaking = false;
            }
        }
    }

    /// Drop everything captured so far: abort the open container, abandon
    /// in-flight submissions, and forget completed segments.
    pub fn cancel(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.abort();
        }
        self.pending.abort_all();
        self.completed.clear();
        self.generation += 1;
        self.speaking = false;
        self.has_speech = false;
        self.silence_ms = 0;
        self.buffered_ms = 0;
        info!("transcription session cancelled");
    }

    /// Flush any non-empty open container, await every in-flight submission,
    /// and assemble the transcript in sequence order.
    pub async fn finish(mut self) -> Result<Transcript, SttError> {
        if let Some(writer) = self.writer.take() {
            if writer.data_size() > 0 {
                self.submit(writer)?;
            } else {
                let mut writer = writer;
                writer.abort();
            }
        }

        while let Some(joined) = self.pending.join_next().await {
            match joined {
                Ok((generation, seq, outcome)) if generation == self.generation => {
                    self.completed.insert(seq, outcome);
                }
                Ok((generation, seq, _)) => {
                    debug!(generation, seq, "dropping result from cancelled generation");
                }
                Err(e) if e.is_cancelled() => {}
                Err(e) => warn!("segment task panicked: {}", e),
            }
        }

        let segments: Vec<_> = self.completed.into_iter().collect();
        info!(segments = segments.len(), "transcription session finished");
        Ok(Transcript { segments })
    }

    fn flush_segment(&mut self) -> Result<(), SttError> {
        let Some(writer) = self.writer.take() else {
            return Ok(());
        };
        if writer.data_size() == 0 {
            // Nothing captured yet; keep the container open.
            self.writer = Some(writer);
            self.silence_ms = 0;
            return Ok(());
        }
        self.submit(writer)?;
        self.open_writer()?;
        self.has_speech = false;
        self.silence_ms = 0;
        self.buffered_ms = 0;
        Ok(())
    }

    fn submit(&mut self, mut writer: StreamingWavWriter) -> Result<(), SttError> {
        writer.finalize()?;
        let seq = self.next_seq;
        self.next_seq += 1;

        let path = writer.path().to_path_buf();
        let provider = Arc::clone(&self.provider);
        let language = self.config.language.clone();
        let generation = self.generation;
        debug!(seq, path = %path.display(), "submitting segment");
        self.pending.spawn(async move {
            let outcome = match provider.transcribe(&path, language.as_deref()).await {
                Ok(text) => SegmentOutcome::Transcribed(text),
                Err(e) => {
                    warn!(seq, "segment transcription failed: {}", e);
                    SegmentOutcome::Failed(e.to_string())
                }
            };
            (generation, seq, outcome)
        });
        Ok(())
    }

    fn open_writer(&mut self) -> Result<(), SttError> {
        let path = self
            .scratch_dir
            .join(format!("segment-{:05}.wav", self.next_seq));
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.config.sample_rate_hz,
            bits_per_sample: 16,
        };
        self.writer = Some(StreamingWavWriter::create(path, spec)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use murmur_audio::FRAME_SIZE_SAMPLES;

    struct ScriptedProvider {
        /// Per-call (delay, result) script, consumed in submission order.
        script: Mutex<VecDeque<(Duration, Result<String, String>)>>,
        calls: Mutex<Vec<PathBuf>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<(Duration, Result<String, String>)>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl TranscriptionProvider for ScriptedProvider {
        async fn transcribe(
            &self,
            audio: &Path,
            _language: Option<&str>,
        ) -> Result<String, SttError> {
            self.calls.lock().unwrap().push(audio.to_path_buf());
            let entry = self.script.lock().unwrap().pop_front();
            let (delay, result) = entry.unwrap_or((Duration::ZERO, Ok(String::new())));
            tokio::time::sleep(delay).await;
            result.map_err(|_| SttError::MalformedResponse)
        }
    }

    fn config() -> SessionConfig {
        // Shrunk windows so tests need only a handful of 32 ms frames:
        // flush after ~3 silence frames, cap at ~10 frames.
        SessionConfig {
            silence_flush_ms: 96,
            max_segment_ms: 320,
            ..Default::default()
        }
    }

    fn frame(level: f32) -> AudioFrame {
        AudioFrame {
            samples: vec![level; FRAME_SIZE_SAMPLES],
            timestamp_ms: 0,
            is_final: false,
        }
    }

    fn speech_start() -> VadEvent {
        VadEvent::SpeechStart { timestamp_ms: 0 }
    }

    fn speech_end() -> VadEvent {
        VadEvent::SpeechEnd {
            timestamp_ms: 0,
            duration_ms: 1,
        }
    }

    #[tokio::test]
    async fn silence_after_speech_flushes_a_segment() {
        let provider = ScriptedProvider::new(vec![(Duration::ZERO, Ok("hello".into()))]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        session.handle_vad(&speech_start());
        for _ in 0..3 {
            session.handle_frame(&frame(0.2)).unwrap();
        }
        session.handle_vad(&speech_end());
        for _ in 0..3 {
            session.handle_frame(&frame(0.0)).unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(provider.call_count(), 1);

        let transcript = session.finish().await.unwrap();
        assert_eq!(transcript.text(), "hello");
    }

    #[tokio::test]
    async fn silence_alone_never_flushes() {
        let provider = ScriptedProvider::new(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        // Plenty of silence, but no speech was ever detected.
        for _ in 0..8 {
            session.handle_frame(&frame(0.0)).unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn max_duration_flushes_regardless_of_vad() {
        let provider = ScriptedProvider::new(vec![(Duration::ZERO, Ok("long".into()))]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        // 10 frames x 32 ms reaches the 320 ms cap with no VAD events at all.
        for _ in 0..10 {
            session.handle_frame(&frame(0.1)).unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn out_of_order_completions_are_reordered_by_sequence() {
        // First segment is slow, second is fast: completion order is 1 then
        // 0, transcript order must still be 0 then 1.
        let provider = ScriptedProvider::new(vec![
            (Duration::from_millis(80), Ok("first".into())),
            (Duration::from_millis(5), Ok("second".into())),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        for _ in 0..2 {
            session.handle_vad(&speech_start());
            for _ in 0..3 {
                session.handle_frame(&frame(0.2)).unwrap();
            }
            session.handle_vad(&speech_end());
            for _ in 0..3 {
                session.handle_frame(&frame(0.0)).unwrap();
            }
        }
        tokio::task::yield_now().await;
        assert_eq!(provider.call_count(), 2);

        let transcript = session.finish().await.unwrap();
        assert_eq!(transcript.text(), "first second");
    }

    #[tokio::test]
    async fn failed_segments_stay_detectable() {
        let provider = ScriptedProvider::new(vec![
            (Duration::ZERO, Ok("kept".into())),
            (Duration::ZERO, Err("boom".into())),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        for _ in 0..2 {
            session.handle_vad(&speech_start());
            for _ in 0..3 {
                session.handle_frame(&frame(0.2)).unwrap();
            }
            session.handle_vad(&speech_end());
            for _ in 0..3 {
                session.handle_frame(&frame(0.0)).unwrap();
            }
        }

        let transcript = session.finish().await.unwrap();
        assert_eq!(transcript.text(), "kept");
        assert_eq!(transcript.failed_segments(), vec![1]);
        assert_eq!(transcript.segments.len(), 2);
    }

    #[tokio::test]
    async fn final_flush_is_awaited_on_finish() {
        let provider =
            ScriptedProvider::new(vec![(Duration::from_millis(30), Ok("tail".into()))]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        // Speech captured but no flush trigger fired before stop.
        session.handle_vad(&speech_start());
        for _ in 0..3 {
            session.handle_frame(&frame(0.2)).unwrap();
        }

        let transcript = session.finish().await.unwrap();
        assert_eq!(transcript.text(), "tail");
    }

    #[tokio::test]
    async fn cancel_discards_pending_and_completed_segments() {
        let provider = ScriptedProvider::new(vec![
            (Duration::from_millis(200), Ok("slow".into())),
        ]);
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        session.handle_vad(&speech_start());
        for _ in 0..3 {
            session.handle_frame(&frame(0.2)).unwrap();
        }
        session.handle_vad(&speech_end());
        for _ in 0..3 {
            session.handle_frame(&frame(0.0)).unwrap();
        }
        tokio::task::yield_now().await;
        assert_eq!(provider.call_count(), 1);

        session.cancel();
        // Frames arriving after cancel are dropped, not written.
        session.handle_frame(&frame(0.2)).unwrap();

        let transcript = session.finish().await.unwrap();
        assert!(transcript.is_empty());
    }

    #[tokio::test]
    async fn empty_session_finishes_with_no_submissions() {
        let provider = ScriptedProvider::new(vec![]);
        let dir = tempfile::tempdir().unwrap();
        let session = TranscriptionSession::new(provider.clone(), config(), dir.path()).unwrap();

        let transcript = session.finish().await.unwrap();
        assert!(transcript.is_empty());
        assert_eq!(provider.call_count(), 0);
    }
}
