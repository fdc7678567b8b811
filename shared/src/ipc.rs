use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Upper bound on a capture onset timeout. The daemon clamps larger
/// requests to this, and the CLI sizes its read deadline from it.
pub const MAX_CAPTURE_TIMEOUT_SECS: u64 = 600;

/// Requests the CLI sends to the daemon over the Unix socket.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Command {
    /// Capture a single phrase and transcribe it. `timeout_secs` bounds the
    /// wait for speech onset; `None` falls back to the daemon's configured
    /// default, and values above [`MAX_CAPTURE_TIMEOUT_SECS`] are clamped.
    Capture { timeout_secs: Option<u64> },
    Listen,
    Stop,
    Calibrate,
    Status,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum Response {
    Ok,
    Error(String),
    Capture(CaptureOutcome),
    Status(StatusInfo),
}

/// Result of one capture attempt. Only `Transcript` carries usable text;
/// the other variants describe why no command was heard.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Transcript(String),
    Timeout,
    Unintelligible,
    BackendError(String),
}

impl CaptureOutcome {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CaptureOutcome::Transcript(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            CaptureOutcome::Transcript(text) => Some(text),
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StatusInfo {
    pub is_running: bool,
    pub is_listening: bool,
    pub last_command: Option<String>,
    pub language: String,
}

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Connection refused: is vcmdd running?")]
    ConnectionRefused,

    #[error("Connection timeout")]
    Timeout,
}

/// Socket path used by both the daemon and the CLI. Prefers the user
/// runtime directory, falling back to /tmp on systems without one.
pub fn socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("vcmdd.sock")
}
