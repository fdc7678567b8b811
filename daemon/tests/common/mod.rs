#![allow(dead_code)]
// Shared helpers for daemon integration tests: scripted microphones and
// canned transcribers for hardware-free capture runs, tone generators,
// and console helpers for the interactive microphone tests.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use vcmdd::audio::Microphone;
use vcmdd::config::Config;
use vcmdd::transcription::{TranscribeError, Transcriber};

/// 100 ms of audio at 16 kHz.
pub const BLOCK_SAMPLES: usize = 1600;

/// Config with short VAD timings so capture tests finish quickly.
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.vad.min_silence_ms = 200;
    config.vad.calibration_ms = 200;
    config.capture.default_timeout_secs = 1;
    config
}

fn sine_block(amplitude: f32) -> Vec<f32> {
    (0..BLOCK_SAMPLES)
        .map(|i| {
            let t = i as f32 / 16000.0;
            amplitude * (2.0 * std::f32::consts::PI * 440.0 * t).sin()
        })
        .collect()
}

pub fn speech_block() -> Vec<f32> {
    sine_block(0.5)
}

/// Below the default 0.02 threshold once calibration has raised it.
pub fn quiet_speech_block() -> Vec<f32> {
    sine_block(0.08)
}

/// Steady room noise for calibration runs.
pub fn ambient_block() -> Vec<f32> {
    sine_block(0.2)
}

pub fn silence_block() -> Vec<f32> {
    vec![0.0; BLOCK_SAMPLES]
}

/// What one `Microphone::start` call feeds into the audio channel. The
/// scripted blocks go out first; after that the feeder keeps sending
/// silence until `stop` aborts it, unless `close_after` drops the
/// sender to simulate the audio stream dying, or `stall_after` parks
/// the feeder with the sender still alive.
pub struct MicSession {
    pub blocks: Vec<Vec<f32>>,
    pub close_after: bool,
    pub stall_after: bool,
}

impl MicSession {
    /// A short spoken phrase surrounded by silence.
    pub fn phrase() -> Self {
        let mut blocks = vec![silence_block(), silence_block()];
        blocks.extend((0..5).map(|_| speech_block()));
        Self {
            blocks,
            close_after: false,
            stall_after: false,
        }
    }

    pub fn quiet_phrase() -> Self {
        let mut blocks = vec![silence_block()];
        blocks.extend((0..5).map(|_| quiet_speech_block()));
        Self {
            blocks,
            close_after: false,
            stall_after: false,
        }
    }

    pub fn ambient(blocks: usize) -> Self {
        Self {
            blocks: (0..blocks).map(|_| ambient_block()).collect(),
            close_after: false,
            stall_after: false,
        }
    }

    pub fn silence() -> Self {
        Self {
            blocks: Vec::new(),
            close_after: false,
            stall_after: false,
        }
    }

    /// Send the given blocks, then drop the sender mid-capture.
    pub fn dying(blocks: Vec<Vec<f32>>) -> Self {
        Self {
            blocks,
            close_after: true,
            stall_after: false,
        }
    }

    /// Send the given blocks, then go quiet while keeping the sender
    /// alive, like a device that died without reporting it.
    pub fn stalling(blocks: Vec<Vec<f32>>) -> Self {
        Self {
            blocks,
            close_after: false,
            stall_after: true,
        }
    }
}

/// Microphone that replays scripted sessions, one per `start` call.
/// Sessions beyond the script feed endless silence. Acquire and release
/// counts are observable through `counters`.
pub struct MockMicrophone {
    sessions: Mutex<VecDeque<MicSession>>,
    acquires: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
    feeder: Option<JoinHandle<()>>,
}

impl MockMicrophone {
    pub fn new(sessions: Vec<MicSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions.into()),
            acquires: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
            feeder: None,
        }
    }

    /// Clone the counter handles before the microphone moves into a
    /// listener.
    pub fn counters(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::clone(&self.acquires), Arc::clone(&self.releases))
    }
}

async fn feed(session: MicSession, tx: broadcast::Sender<Vec<f32>>) {
    for block in session.blocks {
        if tx.send(block).is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    if session.close_after {
        return;
    }
    if session.stall_after {
        // Hold the sender open without sending, until aborted.
        return std::future::pending::<()>().await;
    }
    loop {
        if tx.send(silence_block()).is_err() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

impl Microphone for MockMicrophone {
    fn start(&mut self, audio_tx: broadcast::Sender<Vec<f32>>) -> Result<()> {
        self.acquires.fetch_add(1, Ordering::SeqCst);
        let session = self
            .sessions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(MicSession::silence);
        self.feeder = Some(tokio::spawn(feed(session, audio_tx)));
        Ok(())
    }

    fn stop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
    }
}

pub enum ScriptedReply {
    Text(String),
    Unintelligible,
    ServiceError(String),
}

/// Transcriber returning canned replies in order. Panics when called
/// more times than scripted, which fails the test.
pub struct ScriptedTranscriber {
    replies: Mutex<VecDeque<ScriptedReply>>,
    seen: Arc<Mutex<Vec<(usize, String)>>>,
}

impl ScriptedTranscriber {
    pub fn new(replies: Vec<ScriptedReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn text(reply: &str) -> Self {
        Self::new(vec![ScriptedReply::Text(reply.to_string())])
    }

    /// Handle to the (sample count, language) pairs of every call,
    /// cloneable before the transcriber moves into a listener.
    pub fn seen(&self) -> Arc<Mutex<Vec<(usize, String)>>> {
        Arc::clone(&self.seen)
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(
        &self,
        samples: &[f32],
        language: &str,
    ) -> Result<String, TranscribeError> {
        self.seen
            .lock()
            .unwrap()
            .push((samples.len(), language.to_string()));
        match self.replies.lock().unwrap().pop_front() {
            Some(ScriptedReply::Text(text)) => Ok(text),
            Some(ScriptedReply::Unintelligible) => Err(TranscribeError::Unintelligible),
            Some(ScriptedReply::ServiceError(detail)) => Err(TranscribeError::Service(detail)),
            None => panic!("transcriber called more times than scripted"),
        }
    }
}

/// Ask user to confirm an action
pub fn confirm_action(prompt: &str) -> bool {
    print!(
        "\n[CONFIRM] {}\nPress 'y' to confirm, any other key to skip: ",
        prompt
    );
    io::stdout().flush().unwrap();

    let mut input = String::new();
    io::stdin().read_line(&mut input).unwrap();

    input.trim().to_lowercase() == "y"
}

/// Print a section header
pub fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("  {}", title);
    println!("{}", "=".repeat(60));
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("\n✓ {}", message);
}

/// Print an error message
pub fn print_error(message: &str) {
    println!("\n✗ {}", message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("\nℹ {}", message);
}
