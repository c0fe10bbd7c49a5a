use std::sync::atomic::{AtomicU64, Ordering};

use tracing::info;

/// Lightweight pipeline counters, shared across tasks. Relaxed ordering is
/// enough; these are diagnostics, not control flow.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    pub frames_captured: AtomicU64,
    pub vad_events: AtomicU64,
    pub segments_submitted: AtomicU64,
    pub segments_failed: AtomicU64,
    pub transcripts_pasted: AtomicU64,
    pub sessions_started: AtomicU64,
    pub sessions_cancelled: AtomicU64,
}

impl PipelineMetrics {
    pub fn incr_frames(&self) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_vad_events(&self) {
        self.vad_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_sessions(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_cancelled(&self) {
        self.sessions_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_pasted(&self) {
        self.transcripts_pasted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_segments(&self, submitted: u64, failed: u64) {
        self.segments_submitted.fetch_add(submitted, Ordering::Relaxed);
        self.segments_failed.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn log_summary(&self) {
        info!(
            frames = self.frames_captured.load(Ordering::Relaxed),
            vad_events = self.vad_events.load(Ordering::Relaxed),
            sessions = self.sessions_started.load(Ordering::Relaxed),
            cancelled = self.sessions_cancelled.load(Ordering::Relaxed),
            segments = self.segments_submitted.load(Ordering::Relaxed),
            segment_failures = self.segments_failed.load(Ordering::Relaxed),
            pasted = self.transcripts_pasted.load(Ordering::Relaxed),
            "pipeline metrics"
        );
    }
}
