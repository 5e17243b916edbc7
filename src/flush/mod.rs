pub mod silence;

pub use silence::{SilenceConfig, SilenceDetector};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which flush policy to run, as named in config files and on the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FlushPolicyKind {
    /// Accumulate for the whole session; send only on stop
    Stop,
    /// Send when the live amplitude stays below threshold long enough
    Silence,
    /// Send on a fixed wall-clock period regardless of content
    Interval,
}

/// Flush policy with its tuning
///
/// One policy runs per session; all three share the same send path.
#[derive(Debug, Clone)]
pub enum FlushPolicy {
    OnStop,
    OnSilence(SilenceConfig),
    Interval(Duration),
}

impl FlushPolicy {
    pub fn kind(&self) -> FlushPolicyKind {
        match self {
            FlushPolicy::OnStop => FlushPolicyKind::Stop,
            FlushPolicy::OnSilence(_) => FlushPolicyKind::Silence,
            FlushPolicy::Interval(_) => FlushPolicyKind::Interval,
        }
    }
}

impl Default for FlushPolicy {
    fn default() -> Self {
        FlushPolicy::OnSilence(SilenceConfig::default())
    }
}

/// Why a flush was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Silence detector saw an utterance boundary
    SilenceDetected,
    /// Fixed-interval timer elapsed
    IntervalElapsed,
    /// Recording stopped
    Stopped,
    /// Caller asked explicitly
    Manual,
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlushReason::SilenceDetected => "silence",
            FlushReason::IntervalElapsed => "interval",
            FlushReason::Stopped => "stop",
            FlushReason::Manual => "manual",
        };
        write!(f, "{name}")
    }
}
