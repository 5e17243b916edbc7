pub mod session;
pub mod state;
pub mod stats;

pub use session::{CaptureSession, SessionConfig};
pub use state::SessionState;
pub use stats::{format_clock, SessionStats};
