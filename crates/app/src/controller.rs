use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use murmur_audio::{AudioFrame, AudioSource};
use murmur_bridge::NativeBridge;
use murmur_foundation::{AppError, RecordingMode, RecordingState};
use murmur_stt::{SessionConfig, Transcript, TranscriptionProvider, TranscriptionSession};
use murmur_vad::{EnergyScorer, VadConfig, VadEvent, VadProcessor};

use crate::metrics::PipelineMetrics;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const VAD_CHANNEL_CAPACITY: usize = 200;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub vad: VadConfig,
    pub session: SessionConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            vad: VadConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

/// Notifications for the UI layer.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    StateChanged(RecordingState),
    VoiceDetected(bool),
    TranscriptReady(String),
    SessionFailed(String),
}

enum SessionCommand {
    Finish {
        reply: oneshot::Sender<Result<Transcript, String>>,
    },
    Cancel,
}

struct ActiveSession {
    id: u64,
    started_at: Instant,
    commands: mpsc::Sender<SessionCommand>,
    pipeline: JoinHandle<()>,
    vad: JoinHandle<()>,
    // Tears the session down if the capture device fails mid-recording.
    watchdog: JoinHandle<()>,
    // Keeps the per-session scratch directory alive until the session ends.
    _scratch: TempDir,
}

/// Top-level orchestrator. Owns the recording state machine and, per
/// session, wires capture frames and VAD events into a transcription
/// session, then pastes the merged transcript through the native helper.
///
/// All lifecycle transitions run under one async mutex, so a stop racing a
/// start is rejected cleanly instead of corrupting state.
pub struct RecordingController {
    lifecycle: tokio::sync::Mutex<()>,
    state: RwLock<RecordingState>,
    mode: RwLock<RecordingMode>,
    source: Arc<dyn AudioSource>,
    bridge: Arc<NativeBridge>,
    provider: Arc<dyn TranscriptionProvider>,
    config: ControllerConfig,
    metrics: Arc<PipelineMetrics>,
    events: broadcast::Sender<ControllerEvent>,
    active: Mutex<Option<ActiveSession>>,
    next_session_id: AtomicU64,
}

impl RecordingController {
    pub fn new(
        source: Arc<dyn AudioSource>,
        bridge: Arc<NativeBridge>,
        provider: Arc<dyn TranscriptionProvider>,
        config: ControllerConfig,
        metrics: Arc<PipelineMetrics>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            lifecycle: tokio::sync::Mutex::new(()),
            state: RwLock::new(RecordingState::Idle),
            mode: RwLock::new(RecordingMode::Idle),
            source,
            bridge,
            provider,
            config,
            metrics,
            events,
            active: Mutex::new(None),
            next_session_id: AtomicU64::new(1),
        })
    }

    pub fn state(&self) -> RecordingState {
        *self.state.read()
    }

    pub fn mode(&self) -> RecordingMode {
        *self.mode.read()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerEvent> {
        self.events.subscribe()
    }

    /// Id of the in-flight session, if any.
    pub fn current_session_id(&self) -> Option<u64> {
        self.active.lock().as_ref().map(|a| a.id)
    }

    /// Begin a recording session. Rejected while any session is active.
    pub async fn start(self: &Arc<Self>, mode: RecordingMode) -> Result<(), AppError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() != RecordingState::Idle {
            return Err(AppError::SessionActive);
        }
        self.set_state(RecordingState::Starting);

        // Helper loss must not block recording; mute is best-effort.
        if let Err(e) = self.bridge.mute_system_audio().await {
            warn!("could not mute system audio: {}", e);
        }

        let id = self.next_session_id.fetch_add(1, Ordering::Relaxed);
        match self.spawn_session(id) {
            Ok(active) => {
                *self.active.lock() = Some(active);
                *self.mode.write() = mode;
                self.metrics.incr_sessions();
                self.set_state(RecordingState::Recording);
                info!(session = id, ?mode, "recording started");
                Ok(())
            }
            Err(e) => {
                error!("failed to start session: {}", e);
                if let Err(restore) = self.bridge.restore_system_audio().await {
                    warn!("could not restore system audio: {}", restore);
                }
                self.set_state(RecordingState::Stopping);
                self.set_state(RecordingState::Idle);
                Err(e)
            }
        }
    }

    /// Stop, transcribe the remainder, and paste the merged transcript.
    /// Returns the transcript text (possibly empty).
    pub async fn stop(&self) -> Result<String, AppError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() != RecordingState::Recording {
            return Err(AppError::NoActiveSession);
        }
        self.set_state(RecordingState::Stopping);

        let active = self.active.lock().take();
        let Some(active) = active else {
            self.set_state(RecordingState::Idle);
            return Err(AppError::NoActiveSession);
        };

        // Stop flushes the final partial frame into the broadcast channel
        // before the device disconnects; the pipeline drains it below.
        self.source.stop();

        let (reply_tx, reply_rx) = oneshot::channel();
        let transcript = if active
            .commands
            .send(SessionCommand::Finish { reply: reply_tx })
            .await
            .is_ok()
        {
            match reply_rx.await {
                Ok(Ok(transcript)) => Some(transcript),
                Ok(Err(reason)) => {
                    let _ = self.events.send(ControllerEvent::SessionFailed(reason));
                    None
                }
                Err(_) => None,
            }
        } else {
            None
        };

        active.watchdog.abort();
        active.vad.abort();
        let _ = active.pipeline.await;
        let _ = active.vad.await;

        if let Err(e) = self.bridge.restore_system_audio().await {
            warn!("could not restore system audio: {}", e);
        }

        let text = match &transcript {
            Some(transcript) => {
                let failed = transcript.failed_segments();
                self.metrics
                    .record_segments(transcript.segments.len() as u64, failed.len() as u64);
                if !failed.is_empty() {
                    warn!(?failed, "transcript is missing failed segments");
                }
                transcript.text()
            }
            None => String::new(),
        };

        if !text.is_empty() {
            // A paste failure loses nothing: the transcript is still
            // returned and announced to subscribers.
            match self.bridge.paste_text(&text).await {
                Ok(()) => self.metrics.incr_pasted(),
                Err(e) => warn!("paste failed, transcript retained: {}", e),
            }
            let _ = self.events.send(ControllerEvent::TranscriptReady(text.clone()));
        }

        *self.mode.write() = RecordingMode::Idle;
        self.set_state(RecordingState::Idle);
        info!(
            session = active.id,
            elapsed_ms = active.started_at.elapsed().as_millis() as u64,
            chars = text.len(),
            "recording stopped"
        );
        Ok(text)
    }

    /// Abandon the session: no transcription, no paste.
    pub async fn cancel(&self) -> Result<(), AppError> {
        let _guard = self.lifecycle.lock().await;
        if self.state() != RecordingState::Recording {
            return Err(AppError::NoActiveSession);
        }
        self.set_state(RecordingState::Stopping);

        let active = self.active.lock().take();
        if let Some(active) = active {
            self.source.stop();
            let _ = active.commands.send(SessionCommand::Cancel).await;
            active.watchdog.abort();
            active.vad.abort();
            let _ = active.pipeline.await;
            let _ = active.vad.await;
            info!(
                session = active.id,
                elapsed_ms = active.started_at.elapsed().as_millis() as u64,
                "recording cancelled"
            );
        }

        if let Err(e) = self.bridge.restore_system_audio().await {
            warn!("could not restore system audio: {}", e);
        }

        self.metrics.incr_cancelled();
        *self.mode.write() = RecordingMode::Idle;
        self.set_state(RecordingState::Idle);
        Ok(())
    }

    /// Tear down after a fatal capture failure: abort the session, restore
    /// system audio, surface the failure, and force the recorder back to
    /// Idle so it is never stuck with the device gone.
    async fn fail_session(&self, reason: String) {
        let _guard = self.lifecycle.lock().await;
        if !matches!(
            self.state(),
            RecordingState::Recording | RecordingState::Starting
        ) {
            // A stop or cancel already won the race.
            return;
        }
        self.set_state(RecordingState::Stopping);

        let active = self.active.lock().take();
        if let Some(active) = active {
            self.source.stop();
            let _ = active.commands.send(SessionCommand::Cancel).await;
            active.vad.abort();
            let _ = active.pipeline.await;
            let _ = active.vad.await;
            error!(session = active.id, "recording session failed: {}", reason);
        }

        if let Err(e) = self.bridge.restore_system_audio().await {
            warn!("could not restore system audio: {}", e);
        }

        let _ = self.events.send(ControllerEvent::SessionFailed(reason));
        *self.mode.write() = RecordingMode::Idle;
        self.set_state(RecordingState::Idle);
    }

    fn spawn_session(self: &Arc<Self>, id: u64) -> Result<ActiveSession, AppError> {
        let scratch = tempfile::Builder::new()
            .prefix(&format!(
                "murmur-{}-",
                chrono::Local::now().format("%Y%m%d-%H%M%S")
            ))
            .tempdir()
            .map_err(|e| AppError::Fatal(format!("session scratch dir: {}", e)))?;

        let session = TranscriptionSession::new(
            Arc::clone(&self.provider),
            self.config.session.clone(),
            scratch.path(),
        )
        .map_err(|e| AppError::Fatal(format!("open session container: {}", e)))?;

        let (vad_tx, vad_rx) = mpsc::channel(VAD_CHANNEL_CAPACITY);
        let vad = VadProcessor::spawn(
            self.config.vad.clone(),
            Box::new(EnergyScorer::default()),
            self.source.subscribe(),
            vad_tx,
        );

        let frames = self.source.subscribe();
        let (commands, command_rx) = mpsc::channel(4);
        let pipeline = tokio::spawn(run_pipeline(
            session,
            frames,
            vad_rx,
            command_rx,
            self.events.clone(),
            Arc::clone(&self.metrics),
        ));

        // Subscribed before the device starts so no failure can slip by.
        // The watchdog never aborts itself: fail_session must finish its
        // restore-and-Idle cleanup, so stop and cancel abort it instead.
        let mut failures = self.source.subscribe_failures();
        let controller = Arc::clone(self);
        let watchdog = tokio::spawn(async move {
            loop {
                match failures.recv().await {
                    Ok(reason) => {
                        controller.fail_session(reason).await;
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        if let Err(e) = self.source.start() {
            vad.abort();
            pipeline.abort();
            watchdog.abort();
            return Err(AppError::Audio(e));
        }

        Ok(ActiveSession {
            id,
            started_at: Instant::now(),
            commands,
            pipeline,
            vad,
            watchdog,
            _scratch: scratch,
        })
    }

    fn set_state(&self, next: RecordingState) {
        {
            let mut state = self.state.write();
            if !state.can_transition(next) {
                // Recovery path: force back rather than leave the recorder
                // stuck mid-transition.
                warn!(from = ?*state, to = ?next, "forcing lifecycle transition");
            }
            *state = next;
        }
        let _ = self.events.send(ControllerEvent::StateChanged(next));
    }
}

/// Per-session pump: feeds frames and VAD events into the transcription
/// session until told to finish or cancel.
async fn run_pipeline(
    mut session: TranscriptionSession,
    mut frames: broadcast::Receiver<AudioFrame>,
    mut vad_rx: mpsc::Receiver<VadEvent>,
    mut commands: mpsc::Receiver<SessionCommand>,
    events: broadcast::Sender<ControllerEvent>,
    metrics: Arc<PipelineMetrics>,
) {
    let mut frames_open = true;
    let mut vad_open = true;
    loop {
        tokio::select! {
            command = commands.recv() => {
                match command {
                    Some(SessionCommand::Finish { reply }) => {
                        // The final flush frame may still sit in the channel.
                        while let Ok(frame) = frames.try_recv() {
                            metrics.incr_frames();
                            if let Err(e) = session.handle_frame(&frame) {
                                warn!("dropping frame during finish: {}", e);
                            }
                        }
                        let result = session.finish().await.map_err(|e| e.to_string());
                        let _ = reply.send(result);
                    }
                    Some(SessionCommand::Cancel) | None => {
                        session.cancel();
                    }
                }
                break;
            }
            frame = frames.recv(), if frames_open => {
                match frame {
                    Ok(frame) => {
                        metrics.incr_frames();
                        if let Err(e) = session.handle_frame(&frame) {
                            error!("session write failed: {}", e);
                            let _ = events.send(ControllerEvent::SessionFailed(e.to_string()));
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("pipeline lagged, dropped {} frames", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("frame channel closed");
                        frames_open = false;
                    }
                }
            }
            event = vad_rx.recv(), if vad_open => {
                match event {
                    Some(event) => {
                        metrics.incr_vad_events();
                        session.handle_vad(&event);
                        let speaking = matches!(event, VadEvent::SpeechStart { .. });
                        let _ = events.send(ControllerEvent::VoiceDetected(speaking));
                    }
                    None => vad_open = false,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use murmur_audio::FRAME_SIZE_SAMPLES;
    use murmur_bridge::{RpcRequest, Transport};
    use murmur_stt::SttError;

    /// Deterministic audio source: tests push frames straight into the
    /// broadcast channel; `stop` emits the final flush frame; `fail`
    /// simulates the device dying mid-session.
    struct FakeSource {
        tx: broadcast::Sender<AudioFrame>,
        failure_tx: broadcast::Sender<String>,
    }

    impl FakeSource {
        fn new() -> Arc<Self> {
            let (tx, _) = broadcast::channel(256);
            let (failure_tx, _) = broadcast::channel(4);
            Arc::new(Self { tx, failure_tx })
        }

        fn push(&self, level: f32) {
            let _ = self.tx.send(AudioFrame {
                samples: vec![level; FRAME_SIZE_SAMPLES],
                timestamp_ms: 0,
                is_final: false,
            });
        }

        fn fail(&self, reason: &str) {
            let _ = self.failure_tx.send(reason.to_string());
        }
    }

    impl AudioSource for FakeSource {
        fn start(&self) -> Result<(), murmur_foundation::AudioError> {
            Ok(())
        }

        fn stop(&self) {
            let _ = self.tx.send(AudioFrame {
                samples: Vec::new(),
                timestamp_ms: 0,
                is_final: true,
            });
        }

        fn subscribe(&self) -> broadcast::Receiver<AudioFrame> {
            self.tx.subscribe()
        }

        fn subscribe_failures(&self) -> broadcast::Receiver<String> {
            self.failure_tx.subscribe()
        }
    }

    struct FixedProvider(String);

    #[async_trait]
    impl TranscriptionProvider for FixedProvider {
        async fn transcribe(
            &self,
            _audio: &Path,
            _language: Option<&str>,
        ) -> Result<String, SttError> {
            Ok(self.0.clone())
        }
    }

    /// Auto-acknowledging helper stand-in that records every method called
    /// and any pasted text.
    fn fake_helper() -> (
        Arc<NativeBridge>,
        Arc<StdMutex<Vec<String>>>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let (transport, mut peer) = Transport::pair();
        let pasted = Arc::new(StdMutex::new(Vec::new()));
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let record = Arc::clone(&pasted);
        let record_calls = Arc::clone(&calls);
        tokio::spawn(async move {
            while let Some(line) = peer.rx.recv().await {
                let req: RpcRequest = serde_json::from_str(&line).unwrap();
                record_calls.lock().unwrap().push(req.method.to_string());
                if let Some(text) = req
                    .params
                    .as_ref()
                    .and_then(|p| p.get("text"))
                    .and_then(|t| t.as_str())
                {
                    record.lock().unwrap().push(text.to_string());
                }
                let response = format!(r#"{{"id":{},"result":null}}"#, req.id);
                if peer.tx.send(response).await.is_err() {
                    break;
                }
            }
        });
        (Arc::new(NativeBridge::new(transport)), pasted, calls)
    }

    fn controller(
        source: Arc<FakeSource>,
        transcript: &str,
    ) -> (
        Arc<RecordingController>,
        Arc<StdMutex<Vec<String>>>,
        Arc<StdMutex<Vec<String>>>,
    ) {
        let (bridge, pasted, calls) = fake_helper();
        let config = ControllerConfig {
            vad: VadConfig::default(),
            session: SessionConfig {
                silence_flush_ms: 96,
                max_segment_ms: 320,
                ..Default::default()
            },
        };
        let controller = RecordingController::new(
            source,
            bridge,
            Arc::new(FixedProvider(transcript.to_string())),
            config,
            Arc::new(PipelineMetrics::default()),
        );
        (controller, pasted, calls)
    }

    #[tokio::test]
    async fn second_start_is_rejected_while_active() {
        let source = FakeSource::new();
        let (controller, _, _) = controller(source.clone(), "x");

        controller.start(RecordingMode::PushToTalk).await.unwrap();
        assert_eq!(controller.state(), RecordingState::Recording);

        let err = controller.start(RecordingMode::Toggle).await.unwrap_err();
        assert!(matches!(err, AppError::SessionActive));
        // Mode is unchanged by the rejected start.
        assert_eq!(controller.mode(), RecordingMode::PushToTalk);

        controller.stop().await.unwrap();
        assert_eq!(controller.state(), RecordingState::Idle);
    }

    #[tokio::test]
    async fn stop_without_session_is_an_error() {
        let source = FakeSource::new();
        let (controller, _, _) = controller(source, "x");
        assert!(matches!(
            controller.stop().await.unwrap_err(),
            AppError::NoActiveSession
        ));
        assert!(matches!(
            controller.cancel().await.unwrap_err(),
            AppError::NoActiveSession
        ));
    }

    #[tokio::test]
    async fn push_to_talk_session_pastes_the_transcript() {
        let source = FakeSource::new();
        let (controller, pasted, _) = controller(source.clone(), "hello world");

        controller.start(RecordingMode::PushToTalk).await.unwrap();

        // Loud frames so the energy scorer classifies speech.
        for _ in 0..5 {
            source.push(0.2);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        let text = controller.stop().await.unwrap();
        assert_eq!(text, "hello world");
        assert_eq!(pasted.lock().unwrap().as_slice(), ["hello world"]);
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(controller.mode(), RecordingMode::Idle);
    }

    #[tokio::test]
    async fn cancel_discards_audio_and_pastes_nothing() {
        let source = FakeSource::new();
        let (controller, pasted, _) = controller(source.clone(), "should never appear");

        controller.start(RecordingMode::Toggle).await.unwrap();
        for _ in 0..5 {
            source.push(0.2);
        }
        tokio::time::sleep(Duration::from_millis(20)).await;

        controller.cancel().await.unwrap();
        assert!(pasted.lock().unwrap().is_empty());
        assert_eq!(controller.state(), RecordingState::Idle);

        // A fresh session can start after the cancel.
        controller.start(RecordingMode::Toggle).await.unwrap();
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn empty_session_stops_cleanly_without_paste() {
        let source = FakeSource::new();
        let (controller, pasted, _) = controller(source.clone(), "unused");

        controller.start(RecordingMode::PushToTalk).await.unwrap();
        let text = controller.stop().await.unwrap();
        assert_eq!(text, "");
        assert!(pasted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn state_change_events_reach_subscribers() {
        let source = FakeSource::new();
        let (controller, _, _) = controller(source, "x");
        let mut events = controller.subscribe();

        controller.start(RecordingMode::Toggle).await.unwrap();

        let mut saw_starting = false;
        let mut saw_recording = false;
        while let Ok(event) = events.try_recv() {
            match event {
                ControllerEvent::StateChanged(RecordingState::Starting) => saw_starting = true,
                ControllerEvent::StateChanged(RecordingState::Recording) => saw_recording = true,
                _ => {}
            }
        }
        assert!(saw_starting && saw_recording);

        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn device_failure_forces_idle_and_restores_audio() {
        let source = FakeSource::new();
        let (controller, pasted, calls) = controller(source.clone(), "unused");
        let mut events = controller.subscribe();

        controller.start(RecordingMode::PushToTalk).await.unwrap();
        for _ in 0..3 {
            source.push(0.2);
        }

        source.fail("device disconnected");

        // The watchdog drives the teardown; wait for it to reach Idle.
        let mut saw_failed = false;
        let wait = async {
            loop {
                match events.recv().await.unwrap() {
                    ControllerEvent::SessionFailed(reason) => {
                        assert_eq!(reason, "device disconnected");
                        saw_failed = true;
                    }
                    ControllerEvent::StateChanged(RecordingState::Idle) => break,
                    _ => {}
                }
            }
        };
        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("controller never returned to Idle after device loss");

        assert!(saw_failed);
        assert_eq!(controller.state(), RecordingState::Idle);
        assert_eq!(controller.mode(), RecordingMode::Idle);
        assert!(controller.current_session_id().is_none());
        assert!(pasted.lock().unwrap().is_empty());
        assert!(calls
            .lock()
            .unwrap()
            .iter()
            .any(|m| m == "restoreSystemAudio"));

        // The recorder is usable again after the failure.
        controller.start(RecordingMode::PushToTalk).await.unwrap();
        controller.stop().await.unwrap();
    }

    #[tokio::test]
    async fn session_ids_increase_across_sessions() {
        let source = FakeSource::new();
        let (controller, _, _) = controller(source.clone(), "x");

        controller.start(RecordingMode::Toggle).await.unwrap();
        let first = controller.current_session_id().unwrap();
        controller.stop().await.unwrap();
        assert!(controller.current_session_id().is_none());

        controller.start(RecordingMode::Toggle).await.unwrap();
        let second = controller.current_session_id().unwrap();
        assert!(second > first);
        controller.stop().await.unwrap();
    }
}
