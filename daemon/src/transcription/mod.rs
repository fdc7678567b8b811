pub mod http;

pub use http::HttpTranscriber;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TranscribeError {
    /// The service processed the clip but produced no usable text.
    #[error("could not understand audio")]
    Unintelligible,

    /// The request itself failed: network, auth, quota, malformed reply.
    #[error("speech service error: {0}")]
    Service(String),

    /// The clip could not be encoded for upload.
    #[error("invalid audio clip: {0}")]
    InvalidAudio(String),
}

/// Converts a captured phrase to text. Implemented by the HTTP client in
/// production and by scripted stubs in tests.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, samples: &[f32], language: &str)
        -> Result<String, TranscribeError>;
}

/// Clean up raw recognizer output: strip bracketed annotations such as
/// `[music]` or `(laughs)`, collapse runs of whitespace, and trim.
pub fn normalize_transcript(text: &str) -> String {
    let re = regex::Regex::new(r"\[.*?\]|\{.*?\}|\(.*?\)").unwrap();
    let stripped = re.replace_all(text, "");
    let normalized = stripped.split_whitespace().collect::<Vec<_>>().join(" ");

    tracing::debug!("Normalized transcript: '{}' -> '{}'", text, normalized);
    normalized
}
