pub mod audio;
pub mod config;
pub mod listener;
pub mod rate_limit;
pub mod server;
pub mod state;
pub mod transcription;
pub mod vad;

pub use audio::{AudioCapture, Microphone};
pub use listener::CommandListener;
pub use rate_limit::CommandRateLimiter;
pub use shared::ipc::CaptureOutcome;
pub use transcription::{HttpTranscriber, TranscribeError, Transcriber};
pub use vad::{PhraseCollector, VoiceActivityDetector};
