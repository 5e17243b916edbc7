use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SessionState;

/// Snapshot of a capture session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Current lifecycle state
    pub state: SessionState,

    /// When the session was created
    pub started_at: DateTime<Utc>,

    /// Elapsed recording time in whole seconds
    pub elapsed_secs: u64,

    /// Elapsed time formatted as zero-padded MM:SS
    pub elapsed_label: String,

    /// Audio chunks currently buffered (unsent)
    pub chunks_buffered: usize,

    /// Successful sends to the transcription endpoint
    pub flushes_sent: usize,

    /// Words revealed in the transcript so far
    pub words_displayed: usize,
}

/// Format elapsed seconds as a zero-padded MM:SS label
///
/// Minutes keep counting past 59, so 3600 seconds reads "60:00".
pub fn format_clock(total_secs: u64) -> String {
    format!("{:02}:{:02}", total_secs / 60, total_secs % 60)
}
