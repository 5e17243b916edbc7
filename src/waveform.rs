use serde::Deserialize;

/// One scrolling bar in the waveform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bar {
    /// Left edge in pixels from the left boundary
    pub x: i32,
    /// Top edge in pixels (vertically centered on creation)
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Waveform geometry and pacing
#[derive(Debug, Clone, Deserialize)]
pub struct WaveformConfig {
    /// Visible width in pixels
    pub width: u32,
    /// Visible height in pixels
    pub height: u32,
    /// Width of each bar
    pub bar_width: i32,
    /// Pixels every bar moves left per frame
    pub scroll_step: i32,
    /// Amplitude-to-pixel-height multiplier
    pub amplitude_scale: f32,
    /// Milliseconds per admission slot; at most one bar per slot
    pub tick_divisor_ms: u64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 60,
            bar_width: 2,
            scroll_step: 2,
            amplitude_scale: 650.0,
            tick_divisor_ms: 60,
        }
    }
}

/// Scrolling bar-waveform model
///
/// Headless: `observe` admits at most one bar per elapsed time slot,
/// `advance` scrolls everything left and drops what falls off. A
/// renderer draws from `bars()` however it likes.
#[derive(Debug)]
pub struct Waveform {
    config: WaveformConfig,
    bars: Vec<Bar>,
    last_slot: u64,
}

impl Waveform {
    pub fn new(config: WaveformConfig) -> Self {
        Self {
            config,
            bars: Vec::new(),
            last_slot: 0,
        }
    }

    /// Feed the current peak amplitude at a monotonic millisecond clock
    ///
    /// Returns true when a new bar was admitted (the clock crossed into
    /// a new time slot since the last admission).
    pub fn observe(&mut self, peak: f32, now_ms: u64) -> bool {
        let divisor = self.config.tick_divisor_ms.max(1);
        let slot = now_ms / divisor;
        if slot <= self.last_slot {
            return false;
        }
        self.last_slot = slot;

        let height = ((peak * self.config.amplitude_scale).floor() as i32)
            .clamp(0, self.config.height as i32);

        self.bars.push(Bar {
            x: self.config.width as i32,
            y: self.config.height as i32 / 2 - height / 2,
            width: self.config.bar_width,
            height,
        });

        true
    }

    /// Shift every bar left one scroll step and drop off-screen bars
    pub fn advance(&mut self) {
        let step = self.config.scroll_step;
        for bar in &mut self.bars {
            bar.x -= step;
        }
        self.bars.retain(|bar| bar.x >= 1);
    }

    /// Current bars, oldest (leftmost) first
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Snapshot for a renderer running elsewhere
    pub fn snapshot(&self) -> Vec<Bar> {
        self.bars.clone()
    }
}

/// Meter glyphs from quietest to loudest
const METER_LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Render a bar snapshot as one fixed-width console line
///
/// The newest bar sits on the right; shorter snapshots are left-padded
/// so the line never jitters. `max_height` maps a full-height bar to
/// the tallest glyph.
pub fn meter_line(bars: &[Bar], max_height: u32, columns: usize) -> String {
    let top = METER_LEVELS.len() as i32 - 1;
    let scale = max_height.max(1) as i32;
    let take = bars.len().min(columns);

    let mut line = String::with_capacity(columns * 3);
    for _ in 0..columns - take {
        line.push(METER_LEVELS[0]);
    }
    for bar in &bars[bars.len() - take..] {
        let level = (bar.height * top / scale).clamp(0, top) as usize;
        line.push(METER_LEVELS[level]);
    }
    line
}
