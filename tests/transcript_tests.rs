// Tests for the incremental transcript renderer
//
// Only tokens not already displayed are revealed; the displayed set
// never shrinks within a session.

use live_captions::{MemorySink, RendererConfig, TranscriptRenderer, TranscriptSink};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sink handle the test can inspect after the renderer takes ownership
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<MemorySink>>);

impl TranscriptSink for SharedSink {
    fn append_word(&mut self, word: &str) {
        self.0.lock().unwrap().append_word(word);
    }

    fn set_processing(&mut self, active: bool) {
        self.0.lock().unwrap().set_processing(active);
    }
}

fn instant_config() -> RendererConfig {
    RendererConfig {
        typing_delay: Duration::ZERO,
        marker_hold: Duration::ZERO,
        dedup_words: true,
    }
}

fn renderer_with_sink() -> (TranscriptRenderer, SharedSink) {
    let sink = SharedSink::default();
    let renderer = TranscriptRenderer::new(instant_config(), Box::new(sink.clone()));
    (renderer, sink)
}

#[tokio::test]
async fn test_only_unseen_words_are_revealed() {
    let (mut renderer, _sink) = renderer_with_sink();

    assert_eq!(renderer.render("hello world").await, 2);
    assert_eq!(renderer.render("hello world foo").await, 1);

    assert_eq!(renderer.displayed_words(), &["hello", "world", "foo"]);
    assert_eq!(renderer.displayed_text(), "hello world foo");
}

#[tokio::test]
async fn test_identical_result_reveals_nothing() {
    let (mut renderer, sink) = renderer_with_sink();

    renderer.render("hello world").await;
    let toggles_before = sink.0.lock().unwrap().processing_toggles;

    assert_eq!(renderer.render("hello world").await, 0);

    let inner = sink.0.lock().unwrap();
    assert_eq!(inner.words, vec!["hello", "world"]);
    assert_eq!(
        inner.processing_toggles, toggles_before,
        "No typing sequence (and no marker) runs for an all-seen result"
    );
}

#[tokio::test]
async fn test_no_retype_across_multiple_results() {
    let (mut renderer, sink) = renderer_with_sink();

    assert_eq!(renderer.render("a b").await, 2);
    assert_eq!(renderer.render("b c").await, 1);

    assert_eq!(sink.0.lock().unwrap().words, vec!["a", "b", "c"]);
    assert_eq!(renderer.displayed_text(), "a b c");
}

#[tokio::test]
async fn test_whitespace_tokenization_skips_empty_tokens() {
    let (mut renderer, _sink) = renderer_with_sink();

    assert_eq!(renderer.render("  hello   world  ").await, 2);
    assert_eq!(renderer.displayed_words(), &["hello", "world"]);
}

#[tokio::test]
async fn test_processing_marker_raised_then_cleared_after_batch() {
    let (mut renderer, sink) = renderer_with_sink();

    renderer.render("one two").await;

    let inner = sink.0.lock().unwrap();
    assert_eq!(inner.processing_toggles, 2, "Marker set then cleared once");
    assert!(!inner.processing, "Marker is down after the hold");
}

#[tokio::test]
async fn test_dedup_disabled_re_reveals_repeats() {
    let sink = SharedSink::default();
    let config = RendererConfig {
        dedup_words: false,
        ..instant_config()
    };
    let mut renderer = TranscriptRenderer::new(config, Box::new(sink.clone()));

    renderer.render("over and").await;
    assert_eq!(renderer.render("over again").await, 2);
    assert_eq!(renderer.displayed_text(), "over and over again");
}
