pub mod calibration;
pub mod detector;
pub mod phrase;

pub use detector::{rms_level, VoiceActivityDetector};
pub use phrase::{PhraseCollector, PhraseState, MAX_PHRASE_SECS};
