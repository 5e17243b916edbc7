use anyhow::{anyhow, bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backend::{AudioChunk, CaptureBackend, CaptureConfig, CaptureStreams, SampleWindow};

/// One scripted span of constant amplitude
#[derive(Debug, Clone)]
pub struct SyntheticSegment {
    /// Peak amplitude in [0.0, 1.0]
    pub peak: f32,
    /// How long this amplitude holds
    pub duration_ms: u64,
}

/// A scripted amplitude sequence played by the synthetic backend
#[derive(Debug, Clone)]
pub struct SyntheticScript {
    pub segments: Vec<SyntheticSegment>,
    /// Cadence of amplitude-window emission
    pub window_interval_ms: u64,
    /// Replay the script from the top when it runs out
    pub repeat: bool,
}

impl SyntheticScript {
    pub fn new(segments: Vec<SyntheticSegment>, window_interval_ms: u64) -> Self {
        Self {
            segments,
            window_interval_ms,
            repeat: false,
        }
    }

    pub fn looping(mut self) -> Self {
        self.repeat = true;
        self
    }

    /// Alternating speech-level and silence-level spans, for demos
    pub fn speech_with_pauses() -> Self {
        Self::new(
            vec![
                SyntheticSegment {
                    peak: 0.3,
                    duration_ms: 2000,
                },
                SyntheticSegment {
                    peak: 0.002,
                    duration_ms: 4000,
                },
            ],
            20,
        )
        .looping()
    }
}

/// Scripted capture backend for tests and demos
///
/// Emits amplitude windows on a fixed cadence and accumulates matching
/// PCM, so the whole pipeline runs without a microphone. Timestamps
/// come from the script position rather than the wall clock, which
/// keeps them deterministic under a paused test clock.
pub struct SyntheticBackend {
    config: CaptureConfig,
    script: SyntheticScript,
    capturing: Arc<AtomicBool>,
    accumulator: Arc<Mutex<Vec<i16>>>,
    chunk_tx: Option<mpsc::Sender<AudioChunk>>,
    sequence: u32,
    clock_ms: Arc<std::sync::atomic::AtomicU64>,
    shutdown_tx: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticBackend {
    pub fn new(config: CaptureConfig, script: SyntheticScript) -> Self {
        Self {
            config,
            script,
            capturing: Arc::new(AtomicBool::new(false)),
            accumulator: Arc::new(Mutex::new(Vec::new())),
            chunk_tx: None,
            sequence: 0,
            clock_ms: Arc::new(std::sync::atomic::AtomicU64::new(0)),
            shutdown_tx: None,
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl CaptureBackend for SyntheticBackend {
    async fn start(&mut self) -> Result<CaptureStreams> {
        if self.is_capturing() {
            bail!("Synthetic capture already started");
        }

        let (chunk_tx, chunk_rx) = mpsc::channel(64);
        let (window_tx, window_rx) = mpsc::channel(256);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);

        self.capturing.store(true, Ordering::Release);
        self.sequence = 0;
        self.clock_ms.store(0, Ordering::Release);
        if let Ok(mut pcm) = self.accumulator.lock() {
            pcm.clear();
        }

        let script = self.script.clone();
        let config = self.config.clone();
        let accumulator = Arc::clone(&self.accumulator);
        let clock = Arc::clone(&self.clock_ms);

        let task = tokio::spawn(async move {
            let interval = script.window_interval_ms.max(1);
            let samples_per_tick = (config.sample_rate as u64 * interval / 1000) as usize
                * config.channels as usize;
            let mut clock_ms = 0u64;

            'playback: loop {
                if script.segments.is_empty() {
                    break;
                }

                for segment in &script.segments {
                    let mut remaining = segment.duration_ms;
                    while remaining > 0 {
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_millis(interval)) => {}
                            _ = shutdown_rx.changed() => break 'playback,
                        }

                        clock_ms += interval;
                        remaining = remaining.saturating_sub(interval);
                        clock.store(clock_ms, Ordering::Release);

                        let amplitude = (segment.peak * i16::MAX as f32) as i16;
                        if let Ok(mut pcm) = accumulator.lock() {
                            pcm.extend(std::iter::repeat(amplitude).take(samples_per_tick));
                        }

                        let window = SampleWindow {
                            amplitudes: vec![segment.peak; config.window_size],
                            timestamp_ms: clock_ms,
                        };
                        if window_tx.send(window).await.is_err() {
                            break 'playback;
                        }
                    }
                }

                if !script.repeat {
                    break;
                }
            }

            debug!("Synthetic playback finished at {}ms", clock_ms);
        });

        info!(
            "Synthetic capture started: {} segments, {}ms windows",
            self.script.segments.len(),
            self.script.window_interval_ms
        );

        self.chunk_tx = Some(chunk_tx);
        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);

        Ok(CaptureStreams {
            chunks: chunk_rx,
            windows: window_rx,
        })
    }

    async fn request_chunk(&mut self) -> Result<()> {
        let tx = match &self.chunk_tx {
            Some(tx) => tx.clone(),
            None => bail!("Synthetic capture not started"),
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
            sample_rate: self.config.sample_rate,
            channels: self.config.channels,
            sequence: self.sequence,
            timestamp_ms: self.clock_ms.load(Ordering::Acquire),
        };
        self.sequence += 1;

        tx.send(chunk).await.context("Chunk stream closed")?;
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if !self.is_capturing() {
            warn!("Synthetic capture not active");
            return Ok(());
        }

        self.capturing.store(false, Ordering::Release);

        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(true);
        }
        if let Some(task) = self.task.take() {
            if task.await.is_err() {
                warn!("Synthetic playback task panicked");
            }
        }

        // The chunk stream must close even when the final delivery
        // fails, or a draining consumer would wait forever
        let delivered = self.request_chunk().await;
        self.chunk_tx = None;
        delivered?;

        info!("Synthetic capture stopped");
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing.load(Ordering::Acquire)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
