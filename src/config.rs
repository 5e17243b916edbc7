use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::flush::{FlushPolicy, FlushPolicyKind, SilenceConfig};
use crate::transcript::RendererConfig;
use crate::waveform::WaveformConfig;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub transcription: TranscriptionSettings,
    pub audio: AudioSettings,
    pub flush: FlushSettings,
    pub display: DisplaySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionSettings {
    /// Remote transcription endpoint (multipart POST, `audio` field)
    pub endpoint: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for TranscriptionSettings {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:5000/transcribe".to_string(),
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

impl TranscriptionSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub window_size: usize,
}

impl Default for AudioSettings {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            sample_rate: capture.sample_rate,
            channels: capture.channels,
            window_size: capture.window_size,
        }
    }
}

impl AudioSettings {
    pub fn capture(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            window_size: self.window_size,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlushSettings {
    /// Which send-triggering policy runs (stop, silence, interval)
    pub policy: FlushPolicyKind,
    pub silence_threshold: f32,
    pub silence_duration_ms: u64,
    pub grace_ms: u64,
    pub interval_secs: u64,
}

impl Default for FlushSettings {
    fn default() -> Self {
        let silence = SilenceConfig::default();
        Self {
            policy: FlushPolicyKind::Silence,
            silence_threshold: silence.threshold,
            silence_duration_ms: silence.min_silence.as_millis() as u64,
            grace_ms: silence.grace.as_millis() as u64,
            interval_secs: 5,
        }
    }
}

impl FlushSettings {
    /// Build the policy, optionally overriding the configured kind
    pub fn policy(&self, kind: Option<FlushPolicyKind>) -> FlushPolicy {
        match kind.unwrap_or(self.policy) {
            FlushPolicyKind::Stop => FlushPolicy::OnStop,
            FlushPolicyKind::Silence => FlushPolicy::OnSilence(SilenceConfig {
                threshold: self.silence_threshold,
                min_silence: Duration::from_millis(self.silence_duration_ms),
                grace: Duration::from_millis(self.grace_ms),
            }),
            FlushPolicyKind::Interval => {
                FlushPolicy::Interval(Duration::from_secs(self.interval_secs))
            }
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    pub bar_width: i32,
    pub scroll_step: i32,
    pub amplitude_scale: f32,
    pub tick_divisor_ms: u64,
    pub typing_delay_ms: u64,
    pub marker_hold_ms: u64,
    pub dedup_words: bool,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        let waveform = WaveformConfig::default();
        let renderer = RendererConfig::default();
        Self {
            width: waveform.width,
            height: waveform.height,
            bar_width: waveform.bar_width,
            scroll_step: waveform.scroll_step,
            amplitude_scale: waveform.amplitude_scale,
            tick_divisor_ms: waveform.tick_divisor_ms,
            typing_delay_ms: renderer.typing_delay.as_millis() as u64,
            marker_hold_ms: renderer.marker_hold.as_millis() as u64,
            dedup_words: renderer.dedup_words,
        }
    }
}

impl DisplaySettings {
    pub fn waveform(&self) -> WaveformConfig {
        WaveformConfig {
            width: self.width,
            height: self.height,
            bar_width: self.bar_width,
            scroll_step: self.scroll_step,
            amplitude_scale: self.amplitude_scale,
            tick_divisor_ms: self.tick_divisor_ms,
        }
    }

    pub fn renderer(&self) -> RendererConfig {
        RendererConfig {
            typing_delay: Duration::from_millis(self.typing_delay_ms),
            marker_hold: Duration::from_millis(self.marker_hold_ms),
            dedup_words: self.dedup_words,
        }
    }
}

impl Config {
    /// Load from a config file (TOML/YAML/JSON by extension)
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
