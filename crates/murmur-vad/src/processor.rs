use tokio::sync::broadcast;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::VadConfig;
use crate::scorer::SpeechScorer;
use crate::state::VadStateMachine;
use crate::types::{VadEvent, VadState};
use murmur_audio::AudioFrame;

/// Task bridging the audio frame broadcast to a VAD event channel.
pub struct VadProcessor {
    machine: VadStateMachine,
    scorer: Box<dyn SpeechScorer>,
    audio_rx: broadcast::Receiver<AudioFrame>,
    event_tx: Sender<VadEvent>,
    frames_processed: u64,
    events_generated: u64,
}

impl VadProcessor {
    pub fn new(
        config: VadConfig,
        scorer: Box<dyn SpeechScorer>,
        audio_rx: broadcast::Receiver<AudioFrame>,
        event_tx: Sender<VadEvent>,
    ) -> Self {
        Self {
            machine: VadStateMachine::new(&config),
            scorer,
            audio_rx,
            event_tx,
            frames_processed: 0,
            events_generated: 0,
        }
    }

    pub fn spawn(
        config: VadConfig,
        scorer: Box<dyn SpeechScorer>,
        audio_rx: broadcast::Receiver<AudioFrame>,
        event_tx: Sender<VadEvent>,
    ) -> JoinHandle<()> {
        let processor = Self::new(config, scorer, audio_rx, event_tx);
        tokio::spawn(async move {
            processor.run().await;
        })
    }

    pub async fn run(mut self) {
        info!("VAD processor task started");

        loop {
            match self.audio_rx.recv().await {
                Ok(frame) => self.process_frame(frame).await,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    error!("VAD processor lagged, skipped {} frames", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }

        info!(
            "VAD processor task shutting down. Frames processed: {}, events generated: {}",
            self.frames_processed, self.events_generated
        );
    }

    async fn process_frame(&mut self, frame: AudioFrame) {
        // The final flush frame may be empty; it still runs through the
        // machine so trailing silence is accounted for.
        let probability = self.scorer.score(&frame.samples);
        if let Some(event) = self.machine.process(probability) {
            self.events_generated += 1;
            if let Err(e) = self.event_tx.send(event).await {
                error!("Failed to send VAD event: {}", e);
            }
        }

        self.frames_processed += 1;
        if self.frames_processed % 1000 == 0 {
            debug!(
                "VAD processor: {} frames, {} events, state: {:?}",
                self.frames_processed,
                self.events_generated,
                self.machine.current_state()
            );
        }
    }

    pub fn current_state(&self) -> VadState {
        self.machine.current_state()
    }
}
