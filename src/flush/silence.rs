use serde::Deserialize;
use std::time::Duration;

/// Silence-triggered flush tuning
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SilenceConfig {
    /// Peak amplitude below which a window counts as silent
    pub threshold: f32,
    /// Continuous silence required before a flush is due
    pub min_silence: Duration,
    /// Delay between requesting the chunk and sending, so the chunk
    /// lands in the buffer first
    pub grace: Duration,
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            threshold: 0.01,
            min_silence: Duration::from_secs(3),
            grace: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum DetectorState {
    /// Sound at or above threshold seen most recently
    Voiced,
    /// Below threshold since the recorded clock reading
    Silent { since_ms: u64 },
    /// Flush already requested for the current silent span
    Fired,
}

/// Utterance-boundary detector over peak amplitudes
///
/// Pure and clock-injected: callers feed each window's peak with a
/// monotonic millisecond reading. Yields exactly one flush per
/// continuous silent span; any voiced window re-arms it.
#[derive(Debug)]
pub struct SilenceDetector {
    config: SilenceConfig,
    state: DetectorState,
}

impl SilenceDetector {
    pub fn new(config: SilenceConfig) -> Self {
        Self {
            config,
            state: DetectorState::Voiced,
        }
    }

    /// Feed one peak amplitude; returns true when a flush is due
    pub fn observe(&mut self, peak: f32, now_ms: u64) -> bool {
        if peak >= self.config.threshold {
            self.state = DetectorState::Voiced;
            return false;
        }

        match self.state {
            DetectorState::Voiced => {
                self.state = DetectorState::Silent { since_ms: now_ms };
                false
            }
            DetectorState::Silent { since_ms } => {
                if now_ms.saturating_sub(since_ms) >= self.config.min_silence.as_millis() as u64 {
                    self.state = DetectorState::Fired;
                    true
                } else {
                    false
                }
            }
            DetectorState::Fired => false,
        }
    }
}
