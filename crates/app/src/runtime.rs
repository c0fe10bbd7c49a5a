use std::path::PathBuf;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use murmur_audio::{AudioSource, CaptureConfig, MicCapture};
use murmur_bridge::{EventSubscription, NativeBridge, Transport};
use murmur_foundation::RecordingMode;
use murmur_shortcuts::{Platform, ShortcutKind, ShortcutMatcher, ShortcutTrigger};
use murmur_stt::{HttpProvider, SessionConfig};
use murmur_vad::VadConfig;

use crate::controller::{ControllerConfig, RecordingController};
use crate::metrics::PipelineMetrics;
use crate::settings::AppSettings;

/// Options for starting the Murmur runtime.
#[derive(Debug, Clone, Default)]
pub struct AppRuntimeOptions {
    pub settings_path: Option<PathBuf>,
    /// Overrides the device from the settings file.
    pub device: Option<String>,
}

/// Handle to the running pipeline.
pub struct AppHandle {
    pub controller: Arc<RecordingController>,
    pub metrics: Arc<PipelineMetrics>,
    bridge: Arc<NativeBridge>,
    key_loop: JoinHandle<()>,
}

impl AppHandle {
    /// Gracefully stop the pipeline and wait for shutdown.
    pub async fn shutdown(self) {
        info!("shutting down Murmur runtime");
        self.key_loop.abort();
        let _ = self.key_loop.await;

        // Cancel is only an error when nothing is recording.
        if self.controller.cancel().await.is_ok() {
            info!("active recording cancelled during shutdown");
        }

        self.bridge.shutdown();
        self.metrics.log_summary();
        info!("runtime shutdown complete");
    }

    /// Wait for SIGINT.
    pub async fn wait_for_shutdown_signal() {
        info!("waiting for shutdown signal (Ctrl+C)");
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for SIGINT: {}", e);
        }
    }
}

/// Start the pipeline: settings, helper bridge, capture, controller, and the
/// key-event loop that turns helper key events into start/stop/cancel.
pub async fn start(
    settings: AppSettings,
    opts: AppRuntimeOptions,
) -> Result<AppHandle, anyhow::Error> {
    let platform = Platform::current();
    let registry = settings.build_registry(platform)?;

    let bridge = Arc::new(match &settings.helper_path {
        Some(path) => NativeBridge::new(Transport::spawn_helper(path)?),
        None => {
            // Degraded mode: no paste, no mute, no global shortcuts.
            warn!("no helper configured; paste and system-audio control are disabled");
            let (transport, _peer) = Transport::pair();
            NativeBridge::new(transport)
        }
    });

    if settings.helper_path.is_some() {
        preflight_accessibility(&bridge).await;
        if let Err(e) = bridge.set_shortcuts(registry.bindings()).await {
            warn!("could not push shortcuts to helper: {}", e);
        }
    }

    let device = opts.device.or_else(|| settings.device.clone());
    let source: Arc<dyn AudioSource> = Arc::new(MicCapture::new(CaptureConfig {
        device,
        ..Default::default()
    }));

    let provider = Arc::new(HttpProvider::new(
        settings.provider.endpoint.clone(),
        settings.api_key(),
        settings.provider_timeout(),
    )?);

    let config = ControllerConfig {
        vad: VadConfig::default(),
        session: SessionConfig {
            silence_flush_ms: settings.silence_flush_ms,
            max_segment_ms: settings.max_segment_ms,
            language: settings.language.clone(),
            ..Default::default()
        },
    };

    let metrics = Arc::new(PipelineMetrics::default());
    let controller = RecordingController::new(
        source,
        Arc::clone(&bridge),
        provider,
        config,
        Arc::clone(&metrics),
    );

    let matcher = ShortcutMatcher::new(platform, registry.bindings().to_vec());
    let key_loop = tokio::spawn(key_event_loop(
        bridge.subscribe_events(),
        matcher,
        Arc::clone(&controller),
    ));

    info!(
        platform = ?platform,
        bindings = registry.bindings().len(),
        helper = settings.helper_path.is_some(),
        "Murmur runtime started"
    );

    Ok(AppHandle {
        controller,
        metrics,
        bridge,
        key_loop,
    })
}

async fn preflight_accessibility(bridge: &NativeBridge) {
    match bridge.accessibility_granted().await {
        Ok(true) => info!("accessibility permission granted"),
        Ok(false) => {
            warn!("accessibility permission missing, prompting");
            if let Err(e) = bridge.request_accessibility_permission().await {
                warn!("accessibility prompt failed: {}", e);
            }
        }
        Err(e) => warn!("could not query accessibility status: {}", e),
    }
}

/// Translate helper key events into lifecycle operations: push-to-talk
/// records while held, toggle flips on each press.
async fn key_event_loop(
    mut events: EventSubscription,
    mut matcher: ShortcutMatcher,
    controller: Arc<RecordingController>,
) {
    while let Some(event) = events.recv().await {
        let Some(input) = event.key_input() else {
            continue;
        };
        for trigger in matcher.handle(input) {
            match trigger {
                ShortcutTrigger::Pressed {
                    kind: ShortcutKind::PushToTalk,
                    ..
                } => {
                    if let Err(e) = controller.start(RecordingMode::PushToTalk).await {
                        warn!("push-to-talk start rejected: {}", e);
                    }
                }
                ShortcutTrigger::Released {
                    kind: ShortcutKind::PushToTalk,
                    ..
                } => {
                    if let Err(e) = controller.stop().await {
                        warn!("push-to-talk stop rejected: {}", e);
                    }
                }
                ShortcutTrigger::Pressed {
                    kind: ShortcutKind::ToggleRecording,
                    ..
                } => {
                    let result = if controller.mode() == RecordingMode::Toggle {
                        controller.stop().await.map(|_| ())
                    } else {
                        controller.start(RecordingMode::Toggle).await
                    };
                    if let Err(e) = result {
                        warn!("toggle rejected: {}", e);
                    }
                }
                ShortcutTrigger::Released { .. } => {}
            }
        }
    }
    info!("key event loop ended");
}
