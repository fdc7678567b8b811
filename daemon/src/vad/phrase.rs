use tracing::{debug, info};

use super::detector::{rms_level, VoiceActivityDetector};

/// Hard cap on a single phrase. Collection ends once this much audio has
/// accumulated even if the speaker has not paused.
pub const MAX_PHRASE_SECS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhraseState {
    Idle,
    Speaking,
    Ending,
}

/// Accumulates one spoken phrase from a stream of audio blocks.
///
/// Starts buffering at the first block whose level crosses the speech
/// threshold, and completes when enough trailing silence has been seen or
/// the phrase cap is hit. Progress is measured in sample counts rather
/// than wall-clock time, so the collector behaves identically on live
/// audio and on pre-recorded blocks pushed through it in a test.
pub struct PhraseCollector {
    vad: VoiceActivityDetector,
    state: PhraseState,
    buffer: Vec<f32>,
    silence_run: usize,
    silence_limit: usize,
    max_samples: usize,
    sample_rate: u32,
    gain: f32,
}

impl PhraseCollector {
    pub fn new(threshold: f32, sample_rate: u32, min_silence_ms: u32, gain: f32) -> Self {
        let silence_limit = (sample_rate as usize * min_silence_ms as usize) / 1000;
        let max_samples = sample_rate as usize * MAX_PHRASE_SECS;
        debug!(
            "Phrase collector ready: threshold={:.4}, silence_limit={} samples, cap={} samples",
            threshold, silence_limit, max_samples
        );

        Self {
            vad: VoiceActivityDetector::new(threshold),
            state: PhraseState::Idle,
            buffer: Vec::new(),
            silence_run: 0,
            silence_limit,
            max_samples,
            sample_rate,
            gain,
        }
    }

    /// True until the first speech block arrives. The onset timeout only
    /// applies while the collector is idle.
    pub fn is_idle(&self) -> bool {
        self.state == PhraseState::Idle
    }

    /// Feed one block of samples. Returns the completed phrase once the
    /// trailing silence requirement or the phrase cap is reached.
    pub fn push(&mut self, samples: &[f32]) -> Option<Vec<f32>> {
        let block: Vec<f32> = if (self.gain - 1.0).abs() > f32::EPSILON {
            samples.iter().map(|s| s * self.gain).collect()
        } else {
            samples.to_vec()
        };
        let is_speech = self.vad.is_speech(rms_level(&block));

        match self.state {
            PhraseState::Idle => {
                if is_speech {
                    self.state = PhraseState::Speaking;
                    self.buffer.extend_from_slice(&block);
                    info!("Speech onset detected");
                }
            }
            PhraseState::Speaking => {
                self.buffer.extend_from_slice(&block);
                if !is_speech {
                    self.state = PhraseState::Ending;
                    self.silence_run = block.len();
                }
            }
            PhraseState::Ending => {
                self.buffer.extend_from_slice(&block);
                if is_speech {
                    self.state = PhraseState::Speaking;
                    self.silence_run = 0;
                } else {
                    self.silence_run += block.len();
                    if self.silence_run >= self.silence_limit {
                        return Some(self.finish());
                    }
                }
            }
        }

        if self.state != PhraseState::Idle && self.buffer.len() >= self.max_samples {
            debug!("Phrase cap reached while speaker still active");
            return Some(self.finish());
        }

        None
    }

    fn finish(&mut self) -> Vec<f32> {
        let phrase = std::mem::take(&mut self.buffer);
        self.state = PhraseState::Idle;
        self.silence_run = 0;
        info!(
            "Phrase complete: {} samples ({} ms)",
            phrase.len(),
            phrase.len() * 1000 / self.sample_rate as usize
        );
        phrase
    }
}
