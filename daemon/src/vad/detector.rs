use tracing::debug;

/// Root mean square level of a block of samples, in the 0.0..=1.0 range
/// for audio normalized to [-1.0, 1.0].
pub fn rms_level(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Energy-based speech detector. A block counts as speech when its RMS
/// level exceeds the threshold, which is set from ambient calibration.
pub struct VoiceActivityDetector {
    threshold: f32,
}

impl VoiceActivityDetector {
    pub fn new(threshold: f32) -> Self {
        debug!("VAD initialized with threshold: {:.4}", threshold);
        Self { threshold }
    }

    pub fn is_speech(&self, level: f32) -> bool {
        level > self.threshold
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}
