// Integration tests for the capture session
//
// These run the whole pipeline against the synthetic backend and a
// canned transcriber: chunks accumulate, flushes drain the buffer
// exactly once, and transcription text flows into the transcript.

use anyhow::Result;
use live_captions::{
    format_clock, CaptureBackend, CaptureBackendFactory, CaptureConfig, CaptureSession,
    CaptureSource, FlushPolicy, MemorySink, RendererConfig, SessionConfig, SessionState,
    SilenceConfig, SyntheticScript, SyntheticSegment, Transcriber, TranscriptRenderer,
    WaveformConfig,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Canned transcriber that records every upload
struct MockTranscriber {
    text: String,
    calls: AtomicUsize,
    uploads: Mutex<Vec<Vec<u8>>>,
}

impl MockTranscriber {
    fn new(text: &str) -> Arc<Self> {
        Arc::new(Self {
            text: text.to_string(),
            calls: AtomicUsize::new(0),
            uploads: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Transcriber for MockTranscriber {
    async fn transcribe(&self, wav_bytes: Vec<u8>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uploads.lock().unwrap().push(wav_bytes);
        Ok(self.text.clone())
    }
}

fn instant_renderer() -> TranscriptRenderer {
    TranscriptRenderer::new(
        RendererConfig {
            typing_delay: Duration::ZERO,
            marker_hold: Duration::ZERO,
            dedup_words: true,
        },
        Box::new(MemorySink::new()),
    )
}

fn build_session(
    script: SyntheticScript,
    policy: FlushPolicy,
    transcriber: Arc<MockTranscriber>,
) -> CaptureSession {
    build_session_with_renderer(script, policy, transcriber, instant_renderer())
}

fn build_session_with_renderer(
    script: SyntheticScript,
    policy: FlushPolicy,
    transcriber: Arc<MockTranscriber>,
    renderer: TranscriptRenderer,
) -> CaptureSession {
    let backend = CaptureBackendFactory::create(
        CaptureSource::Synthetic(script),
        CaptureConfig::default(),
    )
    .expect("synthetic backend");

    let config = SessionConfig {
        session_id: "test-session".to_string(),
        policy,
        waveform: WaveformConfig::default(),
    };

    CaptureSession::new(config, backend, transcriber, renderer)
}

#[tokio::test]
async fn test_stop_policy_sends_exactly_once_on_stop() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.3,
            duration_ms: 200,
        }],
        10,
    );
    let transcriber = MockTranscriber::new("hello from the endpoint");
    let session = build_session(script, FlushPolicy::OnStop, Arc::clone(&transcriber));

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(
        transcriber.call_count(),
        0,
        "Stop policy must not send while recording"
    );

    let stats = session.stop().await?;

    assert_eq!(transcriber.call_count(), 1, "Exactly one send on stop");
    assert_eq!(stats.state, SessionState::Stopped);
    assert_eq!(stats.chunks_buffered, 0, "Buffer is cleared by the send");
    assert_eq!(stats.flushes_sent, 1);
    assert_eq!(stats.words_displayed, 4);
    assert_eq!(session.transcript().await, "hello from the endpoint");

    Ok(())
}

#[tokio::test]
async fn test_uploads_are_valid_wav() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.2,
            duration_ms: 100,
        }],
        10,
    );
    let transcriber = MockTranscriber::new("ok");
    let session = build_session(script, FlushPolicy::OnStop, Arc::clone(&transcriber));

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(250)).await;
    session.stop().await?;

    let uploads = transcriber.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);

    let reader = hound::WavReader::new(Cursor::new(uploads[0].clone()))?;
    let spec = reader.spec();
    assert_eq!(spec.sample_rate, 16000);
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.bits_per_sample, 16);
    assert!(reader.len() > 0, "Upload carries the captured samples");

    Ok(())
}

#[tokio::test]
async fn test_empty_buffer_never_issues_a_send() -> Result<()> {
    // A script with no segments accumulates no audio at all
    let script = SyntheticScript::new(Vec::new(), 10);
    let transcriber = MockTranscriber::new("should never appear");
    let session = build_session(script, FlushPolicy::OnStop, Arc::clone(&transcriber));

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = session.stop().await?;

    assert_eq!(transcriber.call_count(), 0, "Empty buffer is a no-op");
    assert_eq!(stats.flushes_sent, 0);
    assert_eq!(stats.state, SessionState::Stopped);
    assert_eq!(session.transcript().await, "");

    Ok(())
}

#[tokio::test]
async fn test_whitespace_transcription_reveals_nothing() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.3,
            duration_ms: 200,
        }],
        10,
    );
    let transcriber = MockTranscriber::new("   ");
    let session = build_session(script, FlushPolicy::OnStop, Arc::clone(&transcriber));

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    let stats = session.stop().await?;

    // The audio still goes out and the buffer still drains; only the
    // transcript is left alone
    assert_eq!(transcriber.call_count(), 1);
    assert_eq!(stats.flushes_sent, 1);
    assert_eq!(stats.chunks_buffered, 0, "Buffer is cleared by the send");
    assert_eq!(stats.words_displayed, 0);
    assert_eq!(session.transcript().await, "");

    Ok(())
}

#[tokio::test]
async fn test_stats_stay_responsive_during_a_paced_reveal() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.3,
            duration_ms: 400,
        }],
        10,
    );
    let transcriber = MockTranscriber::new("one two three four five six");
    let renderer = TranscriptRenderer::new(
        RendererConfig {
            typing_delay: Duration::from_millis(150),
            marker_hold: Duration::ZERO,
            dedup_words: true,
        },
        Box::new(MemorySink::new()),
    );
    let session =
        build_session_with_renderer(script, FlushPolicy::OnStop, transcriber, renderer);

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    session.flush().await?;

    // Words are still typing out (six words at 150ms apiece); readers
    // must not block behind the reveal
    tokio::time::sleep(Duration::from_millis(300)).await;
    let stats = tokio::time::timeout(Duration::from_millis(100), session.stats())
        .await
        .expect("stats must answer while words are being revealed");
    assert!(stats.words_displayed > 0);

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_flush_requires_an_active_session() {
    let script = SyntheticScript::new(Vec::new(), 10);
    let transcriber = MockTranscriber::new("ok");
    let session = build_session(script, FlushPolicy::OnStop, transcriber);

    assert!(session.flush().await.is_err());
}

#[tokio::test]
async fn test_stop_closes_chunk_stream_even_when_delivery_fails() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.3,
            duration_ms: 5000,
        }],
        10,
    );
    let mut backend = CaptureBackendFactory::create(
        CaptureSource::Synthetic(script),
        CaptureConfig::default(),
    )?;

    let streams = backend.start().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    // A consumer that went away makes the final delivery fail
    drop(streams);

    assert!(backend.stop().await.is_err());
    assert!(!backend.is_capturing());
    assert!(
        backend.request_chunk().await.is_err(),
        "The chunk stream is closed despite the failed delivery"
    );

    // And the backend is still usable for a fresh capture
    let _streams = backend.start().await?;
    backend.stop().await?;

    Ok(())
}

#[tokio::test]
async fn test_silence_policy_flushes_mid_session() -> Result<()> {
    // 100ms of speech, then a long silent span
    let script = SyntheticScript::new(
        vec![
            SyntheticSegment {
                peak: 0.3,
                duration_ms: 100,
            },
            SyntheticSegment {
                peak: 0.001,
                duration_ms: 500,
            },
        ],
        10,
    );
    let silence = SilenceConfig {
        threshold: 0.01,
        min_silence: Duration::from_millis(150),
        grace: Duration::from_millis(20),
    };
    let transcriber = MockTranscriber::new("first words");
    let session = build_session(
        script,
        FlushPolicy::OnSilence(silence),
        Arc::clone(&transcriber),
    );

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(900)).await;

    assert_eq!(
        transcriber.call_count(),
        1,
        "One continuous silent span flushes exactly once"
    );

    let stats = session.stop().await?;

    // The audio accumulated after the mid-session flush goes out with
    // the stop-triggered send
    assert_eq!(transcriber.call_count(), 2);
    assert_eq!(stats.chunks_buffered, 0);
    assert_eq!(session.transcript().await, "first words");

    Ok(())
}

#[tokio::test]
async fn test_interval_policy_sends_periodically() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.3,
            duration_ms: 1000,
        }],
        10,
    )
    .looping();
    let transcriber = MockTranscriber::new("tick");
    let session = build_session(
        script,
        FlushPolicy::Interval(Duration::from_millis(200)),
        Arc::clone(&transcriber),
    );

    session.start().await?;
    tokio::time::sleep(Duration::from_millis(700)).await;

    assert!(
        transcriber.call_count() >= 2,
        "Interval policy keeps sending while recording, got {}",
        transcriber.call_count()
    );

    session.stop().await?;
    Ok(())
}

#[tokio::test]
async fn test_toggle_flips_between_recording_and_stopped() -> Result<()> {
    let script = SyntheticScript::new(
        vec![SyntheticSegment {
            peak: 0.2,
            duration_ms: 5000,
        }],
        10,
    );
    let transcriber = MockTranscriber::new("ok");
    let session = build_session(script, FlushPolicy::OnStop, transcriber);

    assert_eq!(session.state().await, SessionState::Idle);
    assert_eq!(session.toggle().await?, SessionState::Recording);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(session.toggle().await?, SessionState::Stopped);

    Ok(())
}

#[tokio::test]
async fn test_stop_when_not_recording_is_benign() -> Result<()> {
    let script = SyntheticScript::new(Vec::new(), 10);
    let transcriber = MockTranscriber::new("ok");
    let session = build_session(script, FlushPolicy::OnStop, transcriber);

    let stats = session.stop().await?;
    assert_eq!(stats.state, SessionState::Idle);

    Ok(())
}

#[test]
fn test_state_machine_transitions() {
    let mut state = SessionState::Idle;
    assert!(state.transition(SessionState::Stopped).is_err());
    assert!(state.transition(SessionState::Recording).is_ok());
    assert!(state.transition(SessionState::Recording).is_err());
    assert!(state.transition(SessionState::Stopping).is_ok());
    assert!(state.transition(SessionState::Stopped).is_ok());
    // A stopped session can start a fresh take
    assert!(state.transition(SessionState::Recording).is_ok());
}

#[test]
fn test_elapsed_clock_formatting() {
    assert_eq!(format_clock(0), "00:00");
    assert_eq!(format_clock(59), "00:59");
    assert_eq!(format_clock(60), "01:00");
    assert_eq!(format_clock(3599), "59:59");
    assert_eq!(format_clock(3600), "60:00");
}

#[test]
fn test_wav_packaging_rejects_empty_buffer() {
    assert!(live_captions::audio::chunks_to_wav(&[]).is_err());
}
