use tracing::info;

/// Derive a speech threshold from the measured ambient RMS level.
///
/// The threshold sits a configurable ratio above the ambient noise so
/// normal room tone stays below it, and is clamped to a floor so a dead
/// quiet room does not produce a threshold that fires on breath noise.
pub fn ambient_threshold(ambient_rms: f32, ratio: f32, floor: f32) -> f32 {
    let threshold = (ambient_rms * ratio).max(floor);
    info!(
        "Ambient noise calibration: rms={:.4}, threshold={:.4}",
        ambient_rms, threshold
    );
    threshold
}

/// Number of samples covering `ms` milliseconds at the given rate.
pub fn samples_for_ms(sample_rate: u32, ms: u32) -> usize {
    (sample_rate as usize * ms as usize) / 1000
}
