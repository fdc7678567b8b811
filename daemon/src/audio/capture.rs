use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use super::Microphone;

const CHANNELS: u16 = 1;

/// Microphone backed by the system's default input device. Each
/// `start`/`stop` pair opens and closes one cpal input stream, so the
/// device is only held while a capture or calibration is in progress.
pub struct AudioCapture {
    device: Device,
    sample_rate: u32,
    stream: Option<Stream>,
    running: Arc<AtomicBool>,
}

impl AudioCapture {
    pub fn new(sample_rate: u32) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("no default input device found"))?;

        tracing::info!("Using input device: {}", device.name()?);

        Ok(Self {
            device,
            sample_rate,
            stream: None,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    fn forward(samples: Vec<f32>, tx: &broadcast::Sender<Vec<f32>>, running: &AtomicBool) {
        if running.load(Ordering::Relaxed) {
            // Send fails only when every receiver is gone; drop the block.
            let _ = tx.send(samples);
        }
    }
}

impl Microphone for AudioCapture {
    fn start(&mut self, audio_tx: broadcast::Sender<Vec<f32>>) -> Result<()> {
        if self.stream.is_some() {
            return Err(anyhow!("audio capture already running"));
        }

        let rate = self.sample_rate;
        tracing::debug!("Configuring audio stream: {}Hz, {} channel(s)", rate, CHANNELS);

        let supported = self
            .device
            .supported_input_configs()?
            .find(|c| {
                c.channels() == CHANNELS
                    && c.min_sample_rate().0 <= rate
                    && c.max_sample_rate().0 >= rate
            })
            .ok_or_else(|| anyhow!("no mono {}Hz input configuration available", rate))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();

        self.running.store(true, Ordering::Relaxed);

        // A stream error means the device is gone and no more data
        // callbacks will fire; stop forwarding so the capture path runs
        // into its stall bound instead of trusting a dead stream.
        let error_running = Arc::clone(&self.running);
        let error_callback = move |err| {
            tracing::error!("Audio stream error: {}", err);
            error_running.store(false, Ordering::Relaxed);
        };

        let stream = match sample_format {
            SampleFormat::F32 => {
                let tx = audio_tx;
                let running = Arc::clone(&self.running);
                self.device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &_| {
                        Self::forward(data.to_vec(), &tx, &running);
                    },
                    error_callback,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let tx = audio_tx;
                let running = Arc::clone(&self.running);
                self.device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &_| {
                        let converted: Vec<f32> =
                            data.iter().map(|&s| s as f32 / 32768.0).collect();
                        Self::forward(converted, &tx, &running);
                    },
                    error_callback,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let tx = audio_tx;
                let running = Arc::clone(&self.running);
                self.device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &_| {
                        let converted: Vec<f32> = data
                            .iter()
                            .map(|&s| (s as f32 - 32768.0) / 32768.0)
                            .collect();
                        Self::forward(converted, &tx, &running);
                    },
                    error_callback,
                    None,
                )?
            }
            format => {
                return Err(anyhow!("unsupported sample format: {:?}", format));
            }
        };

        stream.play()?;
        self.stream = Some(stream);

        tracing::info!("Audio capture started");
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(stream) = self.stream.take() {
            drop(stream);
        }
        tracing::info!("Audio capture stopped");
    }
}

// cpal streams carry no thread affinity on the Linux backends this
// daemon targets; the stream handle is only touched under &mut self.
unsafe impl Send for AudioCapture {}
