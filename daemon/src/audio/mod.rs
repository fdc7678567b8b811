pub mod capture;
pub mod wav;

pub use capture::AudioCapture;
pub use wav::samples_to_wav;

use anyhow::Result;
use tokio::sync::broadcast;

/// Audio source abstraction. The listener drives a microphone through
/// this trait so captures can run against recorded audio in tests.
///
/// `start` opens the device and begins publishing sample blocks to the
/// given channel; `stop` releases the device. Implementations must make
/// `stop` infallible since it runs on every capture path.
pub trait Microphone: Send {
    fn start(&mut self, audio_tx: broadcast::Sender<Vec<f32>>) -> Result<()>;
    fn stop(&mut self);
}
