use anyhow::{bail, Context, Result};
use chrono::Utc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::state::SessionState;
use super::stats::{format_clock, SessionStats};
use crate::audio::{chunks_to_wav, AudioChunk, CaptureBackend};
use crate::flush::{FlushPolicy, FlushReason, SilenceDetector};
use crate::transcribe::Transcriber;
use crate::transcript::TranscriptRenderer;
use crate::waveform::{Bar, Waveform, WaveformConfig};

/// Configuration for a capture session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Unique session identifier
    pub session_id: String,

    /// When buffered audio gets sent to the transcription endpoint
    pub policy: FlushPolicy,

    /// Waveform geometry and pacing
    pub waveform: WaveformConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("caption-{}", uuid::Uuid::new_v4()),
            policy: FlushPolicy::default(),
            waveform: WaveformConfig::default(),
        }
    }
}

/// A capture session owning the microphone, the chunk buffer, the
/// waveform model, and the transcript pipeline
///
/// Lifecycle is an explicit state machine (Idle → Recording → Stopping
/// → Stopped); stopping is signalled through a watch channel rather
/// than a polled flag, so tasks wind down deterministically. The
/// stop-triggered send runs only after the device-level stop has
/// completed and the chunk collector has drained.
pub struct CaptureSession {
    config: SessionConfig,
    backend: Arc<Mutex<Box<dyn CaptureBackend>>>,
    transcriber: Arc<dyn Transcriber>,

    state: Arc<Mutex<SessionState>>,
    started_at: chrono::DateTime<chrono::Utc>,
    elapsed_secs: Arc<AtomicU64>,
    chunk_buffer: Arc<Mutex<Vec<AudioChunk>>>,
    waveform: Arc<Mutex<Waveform>>,
    renderer: Arc<Mutex<TranscriptRenderer>>,
    flushes_sent: Arc<AtomicUsize>,

    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    flush_tx: Mutex<Option<mpsc::Sender<FlushReason>>>,
    collector_task: Mutex<Option<JoinHandle<()>>>,
    flush_task: Mutex<Option<JoinHandle<()>>>,
    aux_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl CaptureSession {
    pub fn new(
        config: SessionConfig,
        backend: Box<dyn CaptureBackend>,
        transcriber: Arc<dyn Transcriber>,
        renderer: TranscriptRenderer,
    ) -> Self {
        let waveform = Waveform::new(config.waveform.clone());
        Self {
            config,
            backend: Arc::new(Mutex::new(backend)),
            transcriber,
            state: Arc::new(Mutex::new(SessionState::Idle)),
            started_at: Utc::now(),
            elapsed_secs: Arc::new(AtomicU64::new(0)),
            chunk_buffer: Arc::new(Mutex::new(Vec::new())),
            waveform: Arc::new(Mutex::new(waveform)),
            renderer: Arc::new(Mutex::new(renderer)),
            flushes_sent: Arc::new(AtomicUsize::new(0)),
            shutdown_tx: Mutex::new(None),
            flush_tx: Mutex::new(None),
            collector_task: Mutex::new(None),
            flush_task: Mutex::new(None),
            aux_tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.config.session_id
    }

    /// Start recording
    ///
    /// Device or permission failures come back as a recoverable error;
    /// the session stays Idle and can be started again.
    pub async fn start(&self) -> Result<()> {
        {
            let state = self.state.lock().await;
            if state.is_recording() {
                warn!("Recording already started");
                return Ok(());
            }
            if !state.can_transition_to(SessionState::Recording) {
                bail!("Cannot start recording from state {}", *state);
            }
        }

        info!("Starting recording session: {}", self.config.session_id);

        let streams = {
            let mut backend = self.backend.lock().await;
            backend
                .start()
                .await
                .context("Failed to start audio capture")?
        };

        {
            self.state.lock().await.transition(SessionState::Recording)?;
        }
        self.elapsed_secs.store(0, Ordering::Relaxed);
        self.chunk_buffer.lock().await.clear();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (flush_tx, mut flush_rx) = mpsc::channel::<FlushReason>(16);

        // Chunk collector: appends arrivals in order, terminates when the
        // backend closes the stream on stop
        let buffer = Arc::clone(&self.chunk_buffer);
        let mut chunks = streams.chunks;
        let collector = tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                debug!(
                    "Buffered chunk {} ({} samples)",
                    chunk.sequence,
                    chunk.samples.len()
                );
                buffer.lock().await.push(chunk);
            }
            debug!("Chunk stream closed");
        });

        // Monitor: feeds the waveform every window and drives the silence
        // policy when one is configured
        let waveform = Arc::clone(&self.waveform);
        let mut windows = streams.windows;
        let mut detector = match &self.config.policy {
            FlushPolicy::OnSilence(cfg) => Some(SilenceDetector::new(*cfg)),
            _ => None,
        };
        let monitor_flush_tx = flush_tx.clone();
        let mut monitor_shutdown = shutdown_rx.clone();
        let monitor = tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe = windows.recv() => {
                        let Some(window) = maybe else { break };
                        let peak = window.peak();
                        {
                            let mut wf = waveform.lock().await;
                            wf.observe(peak, window.timestamp_ms);
                            wf.advance();
                        }
                        if let Some(det) = detector.as_mut() {
                            if det.observe(peak, window.timestamp_ms) {
                                info!("Silence span elapsed, requesting flush");
                                if monitor_flush_tx.send(FlushReason::SilenceDetected).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    _ = monitor_shutdown.changed() => break,
                }
            }
            debug!("Monitor task stopped");
        });

        // Interval policy: force a send on a fixed period
        let mut aux = vec![monitor];
        if let FlushPolicy::Interval(period) = &self.config.policy {
            let period = *period;
            let interval_flush_tx = flush_tx.clone();
            let mut interval_shutdown = shutdown_rx.clone();
            aux.push(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await; // consume the immediate first tick
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            if interval_flush_tx.send(FlushReason::IntervalElapsed).await.is_err() {
                                break;
                            }
                        }
                        _ = interval_shutdown.changed() => break,
                    }
                }
            }));
        }

        // Elapsed-seconds timer
        let elapsed = Arc::clone(&self.elapsed_secs);
        let mut timer_shutdown = shutdown_rx.clone();
        aux.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(1));
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        elapsed.fetch_add(1, Ordering::Relaxed);
                    }
                    _ = timer_shutdown.changed() => break,
                }
            }
        }));

        // Flush worker: all policies funnel into the same send path
        let flush_backend = Arc::clone(&self.backend);
        let flush_buffer = Arc::clone(&self.chunk_buffer);
        let flush_transcriber = Arc::clone(&self.transcriber);
        let flush_renderer = Arc::clone(&self.renderer);
        let flush_count = Arc::clone(&self.flushes_sent);
        let grace = match &self.config.policy {
            FlushPolicy::OnSilence(cfg) => cfg.grace,
            _ => Duration::ZERO,
        };
        let flush_worker = tokio::spawn(async move {
            while let Some(reason) = flush_rx.recv().await {
                run_flush(
                    reason,
                    grace,
                    &flush_backend,
                    &flush_buffer,
                    flush_transcriber.as_ref(),
                    &flush_renderer,
                    &flush_count,
                )
                .await;
            }
            debug!("Flush worker stopped");
        });

        *self.shutdown_tx.lock().await = Some(shutdown_tx);
        *self.flush_tx.lock().await = Some(flush_tx);
        *self.collector_task.lock().await = Some(collector);
        *self.flush_task.lock().await = Some(flush_worker);
        *self.aux_tasks.lock().await = aux;

        info!("Recording session started: {}", self.config.session_id);
        Ok(())
    }

    /// Stop recording, run the stop-triggered send, and release the device
    pub async fn stop(&self) -> Result<SessionStats> {
        {
            let mut state = self.state.lock().await;
            if !state.is_recording() {
                warn!("Recording not active");
                drop(state);
                return Ok(self.stats().await);
            }
            state.transition(SessionState::Stopping)?;
        }

        info!("Stopping recording session: {}", self.config.session_id);

        if let Some(shutdown_tx) = self.shutdown_tx.lock().await.take() {
            let _ = shutdown_tx.send(true);
        }

        // Stop the device; this delivers the final chunk and closes the
        // capture streams
        {
            let mut backend = self.backend.lock().await;
            if let Err(e) = backend.stop().await {
                error!("Failed to stop capture backend: {:#}", e);
            }
        }

        // The chunk stream is closed now; wait for the collector to drain
        // it so the stop-triggered send sees every chunk
        if let Some(task) = self.collector_task.lock().await.take() {
            if task.await.is_err() {
                error!("Chunk collector task panicked");
            }
        }

        // Stop-triggered send, exactly once, after the device-level stop
        if let Some(flush_tx) = self.flush_tx.lock().await.take() {
            let _ = flush_tx.send(FlushReason::Stopped).await;
        }
        if let Some(task) = self.flush_task.lock().await.take() {
            if task.await.is_err() {
                error!("Flush worker panicked");
            }
        }

        for task in self.aux_tasks.lock().await.drain(..) {
            if task.await.is_err() {
                error!("Session task panicked");
            }
        }

        {
            self.state.lock().await.transition(SessionState::Stopped)?;
        }

        info!("Recording session stopped: {}", self.config.session_id);
        Ok(self.stats().await)
    }

    /// Flip between recording and stopped; returns the new state
    pub async fn toggle(&self) -> Result<SessionState> {
        let current = { *self.state.lock().await };
        if current.is_recording() {
            self.stop().await?;
        } else {
            self.start().await?;
        }
        Ok(self.state().await)
    }

    /// Ask for a flush of whatever is currently buffered
    pub async fn flush(&self) -> Result<()> {
        let tx = { self.flush_tx.lock().await.clone() };
        match tx {
            Some(tx) => tx
                .send(FlushReason::Manual)
                .await
                .context("Flush channel closed"),
            None => bail!("Session is not recording"),
        }
    }

    pub async fn state(&self) -> SessionState {
        *self.state.lock().await
    }

    /// Current session statistics
    pub async fn stats(&self) -> SessionStats {
        let state = *self.state.lock().await;
        let elapsed = self.elapsed_secs.load(Ordering::Relaxed);
        let chunks_buffered = self.chunk_buffer.lock().await.len();
        let words_displayed = self.renderer.lock().await.displayed_words().len();

        SessionStats {
            session_id: self.config.session_id.clone(),
            state,
            started_at: self.started_at,
            elapsed_secs: elapsed,
            elapsed_label: format_clock(elapsed),
            chunks_buffered,
            flushes_sent: self.flushes_sent.load(Ordering::Relaxed),
            words_displayed,
        }
    }

    /// The transcript revealed so far, whitespace-joined
    pub async fn transcript(&self) -> String {
        self.renderer.lock().await.displayed_text()
    }

    /// Waveform bars for a renderer
    pub async fn waveform_snapshot(&self) -> Vec<Bar> {
        self.waveform.lock().await.snapshot()
    }
}

/// One pass of the shared send path
///
/// Requests the pending chunk (unless stopping, where the backend has
/// already delivered its final chunk), drains the buffer, packages it
/// as WAV, and sends. An empty buffer never issues a network call.
/// Send failures are logged; the transcript simply does not update.
async fn run_flush(
    reason: FlushReason,
    grace: Duration,
    backend: &Arc<Mutex<Box<dyn CaptureBackend>>>,
    buffer: &Arc<Mutex<Vec<AudioChunk>>>,
    transcriber: &dyn Transcriber,
    renderer: &Arc<Mutex<TranscriptRenderer>>,
    flushes_sent: &AtomicUsize,
) {
    if reason != FlushReason::Stopped {
        if let Err(e) = backend.lock().await.request_chunk().await {
            error!("Chunk request failed ({}): {:#}", reason, e);
        }
        if reason == FlushReason::SilenceDetected && !grace.is_zero() {
            // Let the requested chunk land in the buffer before draining
            tokio::time::sleep(grace).await;
        }
        tokio::task::yield_now().await;
    }

    let chunks = {
        let mut buf = buffer.lock().await;
        std::mem::take(&mut *buf)
    };

    if chunks.is_empty() {
        info!("Nothing buffered to send ({})", reason);
        return;
    }

    let wav = match chunks_to_wav(&chunks) {
        Ok(wav) => wav,
        Err(e) => {
            error!("Failed to package audio ({}): {:#}", reason, e);
            return;
        }
    };

    info!(
        "Sending {} chunks ({} bytes) for transcription ({})",
        chunks.len(),
        wav.len(),
        reason
    );

    match transcriber.transcribe(wav).await {
        Ok(text) => {
            flushes_sent.fetch_add(1, Ordering::Relaxed);
            if text.trim().is_empty() {
                warn!("Transcription result was empty, ignoring");
                return;
            }
            reveal_words(&text, renderer).await;
        }
        Err(e) => {
            error!("Transcription failed ({}): {:#}", reason, e);
        }
    }
}

/// Paced reveal that never sleeps while holding the renderer lock, so
/// `stats()` and `transcript()` stay responsive during a long batch
async fn reveal_words(text: &str, renderer: &Arc<Mutex<TranscriptRenderer>>) {
    let (fresh, pacing) = {
        let mut renderer = renderer.lock().await;
        (renderer.stage(text), renderer.config())
    };
    if fresh.is_empty() {
        info!("No new words to display");
        return;
    }

    for word in &fresh {
        renderer.lock().await.reveal(word);
        if !pacing.typing_delay.is_zero() {
            tokio::time::sleep(pacing.typing_delay).await;
        }
    }

    renderer.lock().await.set_processing(true);
    if !pacing.marker_hold.is_zero() {
        tokio::time::sleep(pacing.marker_hold).await;
    }
    renderer.lock().await.set_processing(false);

    debug!("Revealed {} new words", fresh.len());
}
