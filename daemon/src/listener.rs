use anyhow::Result;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::time;
use tracing::{error, info, warn};

use shared::ipc::{CaptureOutcome, MAX_CAPTURE_TIMEOUT_SECS};

use crate::audio::Microphone;
use crate::config::Config;
use crate::transcription::{normalize_transcript, TranscribeError, Transcriber};
use crate::vad::calibration;
use crate::vad::{rms_level, PhraseCollector, MAX_PHRASE_SECS};

/// Wall-clock slack on top of the audio-time bounds before a silent
/// stream is treated as dead.
const STALL_GRACE: Duration = Duration::from_secs(2);

/// Captures single voice commands from a microphone and sends them to a
/// cloud recognizer.
///
/// One listener drives one microphone. `capture_command` takes `&mut
/// self`, so captures on the same listener are strictly sequential, and
/// the microphone is released before the recognizer request goes out.
/// Expected failures (no speech, nothing recognizable, a failing
/// backend) come back as `CaptureOutcome` values; `Err` is reserved for
/// faults the listener cannot classify, such as the audio stream dying
/// mid-capture.
pub struct CommandListener<M: Microphone, T: Transcriber> {
    microphone: M,
    transcriber: T,
    energy_threshold: f32,
    sample_rate: u32,
    gain: f32,
    broadcast_capacity: usize,
    energy_floor: f32,
    ambient_ratio: f32,
    calibration_ms: u32,
    min_silence_ms: u32,
    default_timeout: Duration,
    language: String,
}

impl<M: Microphone, T: Transcriber> CommandListener<M, T> {
    pub fn new(config: &Config, microphone: M, transcriber: T) -> Self {
        info!(
            "Command listener ready: threshold={:.4}, language={}",
            config.vad.energy_threshold, config.recognizer.language
        );

        Self {
            microphone,
            transcriber,
            energy_threshold: config.vad.energy_threshold,
            sample_rate: config.audio.sample_rate,
            gain: config.audio.gain,
            broadcast_capacity: config.audio.broadcast_capacity,
            energy_floor: config.vad.energy_floor,
            ambient_ratio: config.vad.ambient_ratio,
            calibration_ms: config.vad.calibration_ms,
            min_silence_ms: config.vad.min_silence_ms,
            default_timeout: Duration::from_secs(config.capture.default_timeout_secs),
            language: config.recognizer.language.clone(),
        }
    }

    /// Current speech threshold, either the configured starting value or
    /// the result of the last `calibrate` call.
    pub fn energy_threshold(&self) -> f32 {
        self.energy_threshold
    }

    /// Sample ambient room noise and derive a fresh speech threshold
    /// from it. Returns the new threshold.
    pub async fn calibrate(&mut self) -> Result<f32> {
        info!("Calibrating for ambient noise ({} ms)", self.calibration_ms);

        let (audio_tx, mut audio_rx) = broadcast::channel(self.broadcast_capacity);
        self.microphone.start(audio_tx)?;
        let needed = calibration::samples_for_ms(self.sample_rate, self.calibration_ms);
        let deadline = time::Instant::now()
            + Duration::from_millis(u64::from(self.calibration_ms))
            + STALL_GRACE;
        let collected = Self::collect_ambient(&mut audio_rx, needed, deadline).await;
        self.microphone.stop();

        let ambient = collected?;
        let ambient_rms = rms_level(&ambient) * self.gain;
        self.energy_threshold =
            calibration::ambient_threshold(ambient_rms, self.ambient_ratio, self.energy_floor);
        Ok(self.energy_threshold)
    }

    /// Capture one phrase and transcribe it. `timeout` bounds the wait
    /// for speech onset only; once speech starts, the phrase runs until
    /// trailing silence or the phrase cap. Timeouts above
    /// `MAX_CAPTURE_TIMEOUT_SECS` are clamped.
    pub async fn capture_command(&mut self, timeout: Duration) -> Result<CaptureOutcome> {
        let timeout = timeout.min(Duration::from_secs(MAX_CAPTURE_TIMEOUT_SECS));
        info!("Listening for command (onset timeout {:?})", timeout);

        let (audio_tx, mut audio_rx) = broadcast::channel(self.broadcast_capacity);
        self.microphone.start(audio_tx)?;
        let collector = PhraseCollector::new(
            self.energy_threshold,
            self.sample_rate,
            self.min_silence_ms,
            self.gain,
        );
        let collected = Self::collect_phrase(&mut audio_rx, collector, timeout).await;
        self.microphone.stop();

        let phrase = match collected? {
            Some(phrase) => phrase,
            None => {
                warn!("No speech detected within {:?}", timeout);
                return Ok(CaptureOutcome::Timeout);
            }
        };

        match self.transcriber.transcribe(&phrase, &self.language).await {
            Ok(raw) => {
                let text = normalize_transcript(&raw);
                if text.is_empty() {
                    error!("Could not understand audio");
                    Ok(CaptureOutcome::Unintelligible)
                } else {
                    info!("Recognized: {}", text);
                    Ok(CaptureOutcome::Transcript(text))
                }
            }
            Err(TranscribeError::Unintelligible) => {
                error!("Could not understand audio");
                Ok(CaptureOutcome::Unintelligible)
            }
            Err(TranscribeError::Service(detail)) => {
                error!("Speech recognition service error: {}", detail);
                Ok(CaptureOutcome::BackendError(detail))
            }
            Err(err @ TranscribeError::InvalidAudio(_)) => Err(err.into()),
        }
    }

    /// Capture commands in a loop, invoking `handler` for each
    /// recognized transcript. Timeouts and recognition failures are
    /// logged and skipped. The loop exits cleanly once `shutdown` turns
    /// true, checked between iterations so an in-flight capture always
    /// completes first.
    pub async fn run_continuous<F>(
        &mut self,
        mut handler: F,
        shutdown: watch::Receiver<bool>,
    ) -> Result<()>
    where
        F: FnMut(&str),
    {
        info!("Continuous listening started");
        let timeout = self.default_timeout;

        loop {
            if *shutdown.borrow() {
                break;
            }
            match self.capture_command(timeout).await? {
                CaptureOutcome::Transcript(text) => handler(&text),
                CaptureOutcome::Timeout
                | CaptureOutcome::Unintelligible
                | CaptureOutcome::BackendError(_) => {}
            }
        }

        info!("Continuous listening stopped");
        Ok(())
    }

    async fn collect_ambient(
        audio_rx: &mut broadcast::Receiver<Vec<f32>>,
        needed: usize,
        deadline: time::Instant,
    ) -> Result<Vec<f32>> {
        let mut samples = Vec::with_capacity(needed);
        while samples.len() < needed {
            match time::timeout_at(deadline, audio_rx.recv()).await {
                Ok(Ok(block)) => samples.extend_from_slice(&block),
                Ok(Err(RecvError::Lagged(n))) => {
                    warn!("Calibration lagged, dropped {} blocks", n);
                }
                Ok(Err(RecvError::Closed)) => {
                    anyhow::bail!("audio stream closed during calibration");
                }
                Err(_) => {
                    anyhow::bail!("audio stream stalled during calibration");
                }
            }
        }
        Ok(samples)
    }

    async fn collect_phrase(
        audio_rx: &mut broadcast::Receiver<Vec<f32>>,
        mut collector: PhraseCollector,
        timeout: Duration,
    ) -> Result<Option<Vec<f32>>> {
        let onset_deadline = time::Instant::now() + timeout;
        // A live device delivers the capped phrase in real time, so
        // waiting much longer than the cap after onset means the stream
        // died without closing the channel.
        let stall_deadline =
            onset_deadline + Duration::from_secs(MAX_PHRASE_SECS as u64) + STALL_GRACE;

        loop {
            // The onset deadline only applies before speech starts.
            let deadline = if collector.is_idle() {
                onset_deadline
            } else {
                stall_deadline
            };
            let block = match time::timeout_at(deadline, audio_rx.recv()).await {
                Ok(received) => received,
                Err(_) if collector.is_idle() => return Ok(None),
                Err(_) => anyhow::bail!("audio stream stalled during capture"),
            };

            match block {
                Ok(samples) => {
                    if let Some(phrase) = collector.push(&samples) {
                        return Ok(Some(phrase));
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Audio processing lagged, dropped {} blocks", n);
                }
                Err(RecvError::Closed) => {
                    anyhow::bail!("audio stream closed during capture");
                }
            }
        }
    }
}
