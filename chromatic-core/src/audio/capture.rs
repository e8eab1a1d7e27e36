//! Real-time capture from the default input device using CPAL.
//!
//! - Prefers a mono 32-bit float configuration at the target rate
//! - Falls back to multi-channel input, downmixed to mono in the callback
//! - Never blocks the audio callback: chunks are dropped when the queue is full

use super::{AudioCapture, AudioSource};
use crate::error::{Error, Result};
use anyhow::{anyhow, Context};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;
use crossbeam_channel::Sender;

/// Sample rate requested from the device when it supports it.
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

/// The system's default input device.
#[derive(Debug, Clone)]
pub struct CpalSource {
    target_sample_rate: u32,
}

impl CpalSource {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl Default for CpalSource {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_RATE)
    }
}

/// A playing CPAL input stream. The stream is paused and closed on drop.
pub struct CpalCapture {
    stream: cpal::Stream,
    sample_rate: u32,
}

impl AudioSource for CpalSource {
    type Capture = CpalCapture;

    fn begin_capture(&mut self, chunks: Sender<Vec<f32>>) -> Result<CpalCapture> {
        start_audio_capture(chunks, self.target_sample_rate).map_err(|e| {
            tracing::warn!("audio capture unavailable: {e:#}");
            Error::AcquisitionDenied(format!("{e:#}"))
        })
    }
}

impl AudioCapture for CpalCapture {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("error pausing input stream: {e}");
        }
        tracing::debug!("input stream released");
    }
}

fn start_audio_capture(sender: Sender<Vec<f32>>, target_rate: u32) -> anyhow::Result<CpalCapture> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let device_name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
    tracing::info!(device = %device_name, "using audio input device");

    let configs = device
        .supported_input_configs()
        .context("querying input configurations")?
        .collect::<Vec<_>>();
    let supported = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let sample_rate = target_rate.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
    let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(sample_rate)).into();
    let channels = usize::from(config.channels);

    tracing::info!(sample_rate, channels, "selected input configuration");

    let stream = device
        .build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = if channels == 1 {
                    data.to_vec()
                } else {
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                        .collect()
                };
                // Send the chunk, ignoring errors if the queue is full.
                let _ = sender.try_send(mono);
            },
            |err| tracing::error!("an error occurred on the audio stream: {err}"),
            None,
        )
        .context("building input stream")?;

    stream.play().context("starting input stream")?;

    Ok(CpalCapture { stream, sample_rate })
}

/// Picks the f32 configuration closest to `target_rate`, mono first.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_distance = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (c.channels() != 1, rate_distance)
        })
}
