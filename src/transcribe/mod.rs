pub mod client;

pub use client::{HttpTranscriber, Transcriber};
