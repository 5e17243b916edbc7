use std::io::Write;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

/// Where revealed words go
///
/// `set_processing(true)` shows a transient "still working" marker
/// after a batch of new words; `false` removes it.
pub trait TranscriptSink: Send {
    fn append_word(&mut self, word: &str);
    fn set_processing(&mut self, active: bool);
}

/// Renders the transcript as a single updating console line
pub struct ConsoleSink {
    line: String,
}

impl ConsoleSink {
    pub fn new() -> Self {
        Self {
            line: String::new(),
        }
    }

    /// One full console frame; the suffix slot is padded so clearing
    /// the marker leaves no residue
    fn frame(&self, suffix: &str) -> String {
        format!("\r{}{:<4}", self.line, suffix)
    }

    fn redraw(&self, suffix: &str) {
        print!("{}", self.frame(suffix));
        std::io::stdout().flush().ok();
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptSink for ConsoleSink {
    fn append_word(&mut self, word: &str) {
        if !self.line.is_empty() {
            self.line.push(' ');
        }
        self.line.push_str(word);
        self.redraw("");
    }

    fn set_processing(&mut self, active: bool) {
        self.redraw(if active { " ..." } else { "" });
    }
}

/// Collects everything for assertions in tests
#[derive(Debug, Default)]
pub struct MemorySink {
    pub words: Vec<String>,
    pub processing: bool,
    pub processing_toggles: usize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TranscriptSink for MemorySink {
    fn append_word(&mut self, word: &str) {
        self.words.push(word.to_string());
    }

    fn set_processing(&mut self, active: bool) {
        self.processing = active;
        self.processing_toggles += 1;
    }
}

/// Transcript reveal pacing
#[derive(Debug, Clone, Copy)]
pub struct RendererConfig {
    /// Pause between revealed words
    pub typing_delay: Duration,
    /// How long the processing marker stays up after a batch
    pub marker_hold: Duration,
    /// Skip tokens that textually match one already displayed
    pub dedup_words: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            typing_delay: Duration::from_millis(150),
            marker_hold: Duration::from_secs(1),
            dedup_words: true,
        }
    }
}

/// Incrementally reveals newly transcribed words
///
/// Displayed tokens only grow within a session. With dedup on (the
/// default), a token textually matching one already displayed is never
/// re-revealed, even across separate results.
pub struct TranscriptRenderer {
    config: RendererConfig,
    sink: Box<dyn TranscriptSink>,
    words: Vec<String>,
}

impl TranscriptRenderer {
    pub fn new(config: RendererConfig, sink: Box<dyn TranscriptSink>) -> Self {
        Self {
            config,
            sink,
            words: Vec::new(),
        }
    }

    pub fn config(&self) -> RendererConfig {
        self.config
    }

    /// Tokens already revealed, in reveal order
    pub fn displayed_words(&self) -> &[String] {
        &self.words
    }

    /// The transcript as one whitespace-joined string
    pub fn displayed_text(&self) -> String {
        self.words.join(" ")
    }

    /// Incoming tokens that are not already displayed, in order
    fn new_words(&self, incoming: &str) -> Vec<String> {
        incoming
            .split_whitespace()
            .filter(|word| !self.config.dedup_words || !self.words.iter().any(|w| w == word))
            .map(str::to_string)
            .collect()
    }

    /// Record one result's unseen tokens as displayed and return them
    ///
    /// Bookkeeping only; the caller paces the actual reveal. Keeping
    /// the sleeps out of here means a shared renderer stays available
    /// to `displayed_words` readers during a long batch.
    pub fn stage(&mut self, incoming: &str) -> Vec<String> {
        let fresh = self.new_words(incoming);
        self.words.extend(fresh.iter().cloned());
        fresh
    }

    /// Push one staged word to the sink
    pub fn reveal(&mut self, word: &str) {
        self.sink.append_word(word);
    }

    /// Raise or clear the processing marker
    pub fn set_processing(&mut self, active: bool) {
        self.sink.set_processing(active);
    }

    /// Reveal the new words from one transcription result
    ///
    /// Returns how many words were revealed. An all-seen result is a
    /// logged no-op; no typing sequence or marker runs.
    pub async fn render(&mut self, incoming: &str) -> usize {
        let fresh = self.stage(incoming);
        if fresh.is_empty() {
            info!("No new words to display");
            return 0;
        }

        for word in &fresh {
            self.reveal(word);
            if !self.config.typing_delay.is_zero() {
                sleep(self.config.typing_delay).await;
            }
        }

        self.set_processing(true);
        if !self.config.marker_hold.is_zero() {
            sleep(self.config.marker_hold).await;
        }
        self.set_processing(false);

        fresh.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_clear_frame_covers_the_marker() {
        let mut sink = ConsoleSink::new();
        sink.append_word("hello");

        let marker = sink.frame(" ...");
        let clear = sink.frame("");
        assert_eq!(clear.len(), marker.len(), "Clearing repaints every cell");
        assert!(clear.ends_with("    "));
    }
}
