use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::RecvTimeoutError;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::backend::{AudioChunk, CaptureBackend, CaptureConfig, CaptureStreams, SampleWindow};

/// Format the device actually opened with
#[derive(Debug, Clone, Copy)]
struct StreamInfo {
    sample_rate: u32,
    channels: u16,
}

/// Microphone capture backend using the default cpal input device
///
/// The cpal stream is not `Send`, so it lives on a dedicated thread for
/// the duration of the capture. The input callback accumulates 16-bit
/// PCM for chunk delivery and emits amplitude windows for the
/// visualizer and silence detection.
pub struct MicrophoneBackend {
    config: CaptureConfig,
    capturing: Arc<AtomicBool>,
    accumulator: Arc<Mutex<Vec<i16>>>,
    chunk_tx: Option<mpsc::Sender<AudioChunk>>,
    sequence: u32,
    started: Option<Instant>,
    stream_rate: u32,
    stream_channels: u16,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: CaptureConfig) -> Self {
        let stream_rate = config.sample_rate;
        let stream_channels = config.channels;
        Self {
            config,
            capturing: Arc::new(AtomicBool::new(false)),
            accumulator: Arc::new(Mutex::new(Vec::new())),
            chunk_tx: None,
            sequence: 0,
            started: None,
            stream_rate,
            stream_channels,
            stop_tx: None,
            thread: None,
        }
    }

    /// List input device names, marking the default
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();
        let default_name = host.default_input_device().and_then(|d| d.name().ok());

        let mut names = Vec::new();
        for device in host
            .input_devices()
            .context("Failed to enumerate input devices")?
        {
            let name = device
                .name()
                .unwrap_or_else(|_| "Unknown Device".to_string());
            let marker = if Some(&name) == default_name.as_ref() {
                " (default)"
            } else {
                ""
            };
            names.push(format!("{name}{marker}"));
        }

        Ok(names)
    }
}

#[async_trait::async_trait]
impl CaptureBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        if self.is_capturing() {
            bail!("Microphone capture already started");
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (window_tx, window_rx) = mpsc::channel(256);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel();

        let started = Instant::now();
        self.capturing.store(true, Ordering::Release);
        if let Ok(mut pcm) = self.accumulator.lock() {
            pcm.clear();
        }

        let config = self.config.clone();
        let accumulator = Arc::clone(&self.accumulator);
        let capturing = Arc::clone(&self.capturing);

        let thread = std::thread::spawn(move || {
            run_capture(
                config,
                accumulator,
                window_tx,
                capturing,
                started,
                ready_tx,
                stop_rx,
            );
        });

        // Wait for the capture thread to open the device (or fail to)
        let ready = tokio::task::spawn_blocking(move || ready_rx.recv()).await;
        let info = match ready {
            Ok(Ok(Ok(info))) => info,
            Ok(Ok(Err(e))) => {
                self.capturing.store(false, Ordering::Release);
                let _ = thread.join();
                return Err(e).context("Microphone unavailable or access denied");
            }
            Ok(Err(_)) | Err(_) => {
                self.capturing.store(false, Ordering::Release);
                let _ = thread.join();
                bail!("Capture thread exited before the device was ready");
            }
        };

        info!(
            "Microphone capture started: {}Hz, {} channels",
            info.sample_rate, info.channels
        );

        self.chunk_tx = Some(chunk_tx);
        self.sequence = 0;
        self.started = Some(started);
        self.stream_rate = info.sample_rate;
        self.stream_channels = info.channels;
        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);

        Ok(CaptureStreams {
            chunks: chunk_rx,
            windows: window_rx,
        })
    }

    async fn request_chunk(&mut self) -> Result<()> {
        let tx = match &self.chunk_tx {
            Some(tx) => tx.clone(),
            None => bail!("Microphone capture not started"),
        };

        let samples = {
            let mut pcm = self
                .accumulator
                .lock()
                .map_err(|_| anyhow!("Audio accumulator lock poisoned"))?;
            std::mem::take(&mut *pcm)
        };

        if samples.is_empty() {
            debug!("Chunk requested with no accumulated audio");
            return Ok(());
        }

        let chunk = AudioChunk {
            samples,
            sample_rate: self.stream_rate,
            channels: self.stream_channels,
            sequence: self.sequence,
            timestamp_ms: self
                .started
                .map(|s| s.elapsed().as_millis() as u64)
                .unwrap_or(0),
        };
        self.sequence += 1;

        tx.send(chunk).await.context("Chunk stream closed")?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.is_capturing() {
            warn!("Microphone capture not active");
            return Ok(());
        }

        self.capturing.store(false, Ordering::Release);

        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let joined = tokio::task::spawn_blocking(move || thread.join()).await;
            if !matches!(joined, Ok(Ok(()))) {
                error!("Capture thread did not shut down cleanly");
            }
        }

        // Deliver whatever is still accumulated as the final chunk, then
        // close the chunk stream so consumers can drain deterministically.
        // The stream must close even when delivery fails, or a draining
        // consumer would wait forever.
        let delivered = self.request_chunk().await;
        self.chunk_tx = None;
        self.started = None;
        delivered?;

        info!("Microphone capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

/// Owns the cpal stream for the lifetime of a capture
///
/// Reports readiness (or the open error) through `ready_tx`, then parks
/// until stopped. Dropping the stream releases the device.
fn run_capture(
    config: CaptureConfig,
    accumulator: Arc<Mutex<Vec<i16>>>,
    window_tx: mpsc::Sender<SampleWindow>,
    capturing: Arc<AtomicBool>,
    started: Instant,
    ready_tx: std::sync::mpsc::Sender<Result<StreamInfo>>,
    stop_rx: std::sync::mpsc::Receiver<()>,
) {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(anyhow!("No default input device found")));
            return;
        }
    };

    let supported = match select_config(&device, config.sample_rate) {
        Ok(supported) => supported,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    let sample_format = supported.sample_format();
    let stream_config: cpal::StreamConfig = supported.into();
    let info = StreamInfo {
        sample_rate: stream_config.sample_rate.0,
        channels: stream_config.channels,
    };

    let built = match sample_format {
        cpal::SampleFormat::F32 => build_stream::<f32>(
            &device,
            &stream_config,
            config.window_size,
            accumulator,
            window_tx,
            capturing,
            started,
        ),
        cpal::SampleFormat::I16 => build_stream::<i16>(
            &device,
            &stream_config,
            config.window_size,
            accumulator,
            window_tx,
            capturing,
            started,
        ),
        cpal::SampleFormat::U16 => build_stream::<u16>(
            &device,
            &stream_config,
            config.window_size,
            accumulator,
            window_tx,
            capturing,
            started,
        ),
        other => Err(anyhow!("Unsupported input sample format: {:?}", other)),
    };

    let stream = match built {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(e.into()));
        return;
    }

    let _ = ready_tx.send(Ok(info));

    loop {
        match stop_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {}
        }
    }

    drop(stream);
}

/// Prefer the target sample rate when the device supports it
fn select_config(device: &cpal::Device, target_rate: u32) -> Result<cpal::SupportedStreamConfig> {
    let default = device
        .default_input_config()
        .context("No supported input configuration")?;

    if let Ok(mut configs) = device.supported_input_configs() {
        if let Some(range) = configs.find(|c| {
            c.channels() == default.channels()
                && c.sample_format() == default.sample_format()
                && c.min_sample_rate().0 <= target_rate
                && target_rate <= c.max_sample_rate().0
        }) {
            return Ok(range.with_sample_rate(cpal::SampleRate(target_rate)));
        }
    }

    Ok(default)
}

fn build_stream<T>(
    device: &cpal::Device,
    stream_config: &cpal::StreamConfig,
    window_size: usize,
    accumulator: Arc<Mutex<Vec<i16>>>,
    window_tx: mpsc::Sender<SampleWindow>,
    capturing: Arc<AtomicBool>,
    started: Instant,
) -> Result<cpal::Stream>
where
    T: cpal::SizedSample + Send + 'static,
    f32: cpal::FromSample<T>,
{
    let mut window_buf: Vec<f32> = Vec::with_capacity(window_size);

    let stream = device
        .build_input_stream(
            stream_config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                if !capturing.load(Ordering::Acquire) {
                    return;
                }

                if let Ok(mut pcm) = accumulator.lock() {
                    for &sample in data {
                        let sample_f32: f32 = cpal::Sample::from_sample(sample);
                        pcm.push(
                            (sample_f32 * i16::MAX as f32)
                                .clamp(i16::MIN as f32, i16::MAX as f32)
                                as i16,
                        );

                        window_buf.push(sample_f32);
                        if window_buf.len() >= window_size {
                            let amplitudes = std::mem::take(&mut window_buf);
                            let timestamp_ms = started.elapsed().as_millis() as u64;
                            // Drop windows under backpressure rather than
                            // stalling the audio callback
                            let _ = window_tx.try_send(SampleWindow {
                                amplitudes,
                                timestamp_ms,
                            });
                        }
                    }
                }
            },
            move |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .context("Failed to build input stream")?;

    Ok(stream)
}
