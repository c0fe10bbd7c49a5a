use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, StreamConfig};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tokio::sync::broadcast;

use crate::frame::{AudioFrame, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
use crate::resampler::StreamResampler;
use crate::source::FrameAssembler;
use crate::AudioSource;
use murmur_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Input device name; `None` selects the host default.
    pub device: Option<String>,
    pub frame_size_samples: usize,
    pub sample_rate_hz: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame_size_samples: FRAME_SIZE_SAMPLES,
            sample_rate_hz: SAMPLE_RATE_HZ,
        }
    }
}

/// Downmix, resample and frame-cut stage shared between the capture callback
/// and the stop path. All operations are bounded-time; the callback never
/// touches I/O or the network.
struct Pipeline {
    assembler: FrameAssembler,
    resampler: Option<StreamResampler>,
    channels: u16,
    frame_tx: broadcast::Sender<AudioFrame>,
    closed: bool,
}

impl Pipeline {
    fn ingest(&mut self, interleaved: &[f32]) {
        if self.closed {
            return;
        }
        let mono: Vec<f32> = if self.channels <= 1 {
            interleaved.to_vec()
        } else {
            let ch = self.channels as usize;
            interleaved
                .chunks_exact(ch)
                .map(|frame| frame.iter().sum::<f32>() / ch as f32)
                .collect()
        };
        let at_target_rate = match &mut self.resampler {
            Some(rs) => rs.process(&mono),
            None => mono,
        };
        for frame in self.assembler.push(&at_target_rate) {
            // No receivers just means nobody is listening yet.
            let _ = self.frame_tx.send(frame);
        }
    }

    /// Emit the final partial frame and refuse further samples.
    fn flush_and_close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let _ = self.frame_tx.send(self.assembler.flush());
    }
}

struct CaptureWorker {
    shutdown: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Microphone capture on a dedicated thread (the cpal stream is not `Send`).
///
/// `start` and `stop` are guarded by one lock so lifecycle operations never
/// interleave: no double-initialization, no use of a torn-down stream. Stop
/// flushes the assembler before the stream is dropped.
pub struct MicCapture {
    config: CaptureConfig,
    frame_tx: broadcast::Sender<AudioFrame>,
    failure_tx: broadcast::Sender<String>,
    worker: Mutex<Option<CaptureWorker>>,
}

impl MicCapture {
    pub fn new(config: CaptureConfig) -> Self {
        let (frame_tx, _) = broadcast::channel(256);
        let (failure_tx, _) = broadcast::channel(4);
        Self {
            config,
            frame_tx,
            failure_tx,
            worker: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn start_locked(&self, slot: &mut Option<CaptureWorker>) -> Result<(), AudioError> {
        if slot.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let pipeline = Arc::new(Mutex::new(Pipeline {
            assembler: FrameAssembler::new(self.config.frame_size_samples, self.config.sample_rate_hz),
            resampler: None,
            channels: 1,
            frame_tx: self.frame_tx.clone(),
            closed: false,
        }));

        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), AudioError>>();
        let device_name = self.config.device.clone();
        let target_rate = self.config.sample_rate_hz;
        let thread_shutdown = shutdown.clone();
        let thread_pipeline = pipeline.clone();
        let thread_failure = self.failure_tx.clone();

        let handle = thread::Builder::new()
            .name("audio-capture".to_string())
            .spawn(move || {
                let stream = match build_capture_stream(
                    device_name.as_deref(),
                    target_rate,
                    thread_pipeline.clone(),
                    thread_failure,
                    thread_shutdown.clone(),
                ) {
                    Ok(s) => {
                        let _ = ready_tx.send(Ok(()));
                        s
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                while !thread_shutdown.load(Ordering::SeqCst) {
                    thread::sleep(Duration::from_millis(50));
                }

                // Flush before disconnecting so the final partial frame
                // reaches subscribers ahead of teardown.
                thread_pipeline.lock().flush_and_close();
                drop(stream);
                tracing::info!("Audio capture thread shut down");
            })
            .map_err(|e| AudioError::Fatal(format!("failed to spawn audio thread: {}", e)))?;

        match ready_rx.recv_timeout(Duration::from_secs(3)) {
            Ok(Ok(())) => {
                *slot = Some(CaptureWorker { shutdown, handle });
                tracing::info!("Audio capture started");
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = handle.join();
                Err(e)
            }
            Err(_) => {
                shutdown.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(AudioError::Fatal(
                    "capture stream did not come up within timeout".to_string(),
                ))
            }
        }
    }
}

impl AudioSource for MicCapture {
    fn start(&self) -> Result<(), AudioError> {
        let mut slot = self.worker.lock();
        self.start_locked(&mut slot)
    }

    fn stop(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.shutdown.store(true, Ordering::SeqCst);
            let _ = worker.handle.join();
            tracing::info!("Audio capture stopped");
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AudioFrame> {
        self.frame_tx.subscribe()
    }

    fn subscribe_failures(&self) -> broadcast::Receiver<String> {
        self.failure_tx.subscribe()
    }
}

fn open_device(name: Option<&str>) -> Result<cpal::Device, AudioError> {
    let host = cpal::default_host();
    match name {
        Some(want) => host
            .input_devices()?
            .find(|d| d.name().map(|n| n == want).unwrap_or(false))
            .ok_or_else(|| AudioError::DeviceNotFound {
                name: Some(want.to_string()),
            }),
        None => host
            .default_input_device()
            .ok_or(AudioError::DeviceNotFound { name: None }),
    }
}

fn build_capture_stream(
    device_name: Option<&str>,
    target_rate: u32,
    pipeline: Arc<Mutex<Pipeline>>,
    failure_tx: broadcast::Sender<String>,
    shutdown: Arc<AtomicBool>,
) -> Result<cpal::Stream, AudioError> {
    let device = open_device(device_name)?;
    if let Ok(n) = device.name() {
        tracing::info!("Selected input device: {}", n);
    }

    let default_config = device.default_input_config()?;
    let sample_format = default_config.sample_format();
    let config = StreamConfig {
        channels: default_config.channels(),
        sample_rate: default_config.sample_rate(),
        buffer_size: cpal::BufferSize::Default,
    };

    {
        let mut p = pipeline.lock();
        p.channels = config.channels;
        if config.sample_rate.0 != target_rate {
            tracing::info!(
                "Resampling {} Hz {} ch -> {} Hz mono",
                config.sample_rate.0,
                config.channels,
                target_rate
            );
            p.resampler = Some(StreamResampler::new(config.sample_rate.0, target_rate)?);
        }
    }

    let err_fn = move |err: cpal::StreamError| {
        tracing::error!("Audio stream error: {}", err);
        // Fatal for this session; close out so subscribers see the final
        // frame, and notify failure subscribers so the recorder tears down.
        let _ = failure_tx.send(err.to_string());
        shutdown.store(true, Ordering::SeqCst);
    };

    let stream = match sample_format {
        SampleFormat::F32 => device.build_input_stream(
            &config,
            move |data: &[f32], _: &_| {
                pipeline.lock().ingest(data);
            },
            err_fn,
            None,
        )?,
        SampleFormat::I16 => device.build_input_stream(
            &config,
            move |data: &[i16], _: &_| {
                let converted: Vec<f32> = data.iter().map(|&s| s as f32 / 32768.0).collect();
                pipeline.lock().ingest(&converted);
            },
            err_fn,
            None,
        )?,
        SampleFormat::U16 => device.build_input_stream(
            &config,
            move |data: &[u16], _: &_| {
                let converted: Vec<f32> = data
                    .iter()
                    .map(|&s| (s as f32 - 32768.0) / 32768.0)
                    .collect();
                pipeline.lock().ingest(&converted);
            },
            err_fn,
            None,
        )?,
        other => {
            return Err(AudioError::FormatNotSupported {
                format: format!("{:?}", other),
            });
        }
    };

    stream.play()?;
    Ok(stream)
}
