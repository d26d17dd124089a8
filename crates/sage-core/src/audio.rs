//! Microphone capture for voice prompts
//!
//! A recording exists only between the start and stop gestures. Stopping
//! drops the input stream and yields one mono clip, encoded as 16-bit WAV
//! for upload.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, Stream};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use crate::error::{SageError, SageResult};

/// Captured mono PCM, normalized to -1.0..=1.0
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn to_wav(&self) -> SageResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
            for &s in &self.samples {
                let clamped = s.clamp(-1.0, 1.0);
                writer.write_sample((clamped * i16::MAX as f32) as i16)?;
            }
            writer.finalize()?;
        }

        Ok(cursor.into_inner())
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Something that can open a recording
pub trait AudioSource {
    fn start(&self) -> SageResult<Box<dyn RecordingSession>>;
}

/// An open recording; finishing it releases the device
pub trait RecordingSession {
    fn finish(self: Box<Self>) -> SageResult<AudioClip>;
}

/// Default system input device via cpal
#[derive(Debug, Clone, Copy, Default)]
pub struct MicrophoneSource;

struct MicrophoneSession {
    stream: Stream,
    samples: Arc<Mutex<Vec<f32>>>,
    sample_rate: u32,
}

impl AudioSource for MicrophoneSource {
    fn start(&self) -> SageResult<Box<dyn RecordingSession>> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or_else(|| SageError::Audio("No input device available".to_string()))?;

        info!(device = %device.name().unwrap_or_else(|_| "Unknown".to_string()), "opening microphone");

        let supported = device.default_input_config()?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels.max(1) as usize;
        let sample_rate = config.sample_rate.0;

        let samples = Arc::new(Mutex::new(Vec::new()));
        let err_fn = |err: cpal::StreamError| warn!("Audio stream error: {}", err);

        let stream = match sample_format {
            SampleFormat::F32 => {
                let buf = Arc::clone(&samples);
                device.build_input_stream(
                    &config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        push_mono(&buf, data.iter().copied(), channels)
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::I16 => {
                let buf = Arc::clone(&samples);
                device.build_input_stream(
                    &config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        push_mono(&buf, data.iter().map(|&s| s as f32 / i16::MAX as f32), channels)
                    },
                    err_fn,
                    None,
                )?
            }
            SampleFormat::U16 => {
                let buf = Arc::clone(&samples);
                device.build_input_stream(
                    &config,
                    move |data: &[u16], _: &cpal::InputCallbackInfo| {
                        push_mono(
                            &buf,
                            data.iter().map(|&s| (s as f32 - 32768.0) / 32768.0),
                            channels,
                        )
                    },
                    err_fn,
                    None,
                )?
            }
            other => {
                return Err(SageError::Audio(format!("Unsupported sample format: {:?}", other)));
            }
        };

        stream.play()?;

        Ok(Box::new(MicrophoneSession {
            stream,
            samples,
            sample_rate,
        }))
    }
}

impl RecordingSession for MicrophoneSession {
    fn finish(self: Box<Self>) -> SageResult<AudioClip> {
        let MicrophoneSession {
            stream,
            samples,
            sample_rate,
        } = *self;
        drop(stream);

        let samples = match samples.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let clip = AudioClip {
            samples,
            sample_rate,
        };
        info!(seconds = clip.duration_secs(), "recording finished");
        Ok(clip)
    }
}

/// Average interleaved frames down to one channel and append them
fn push_mono<I>(buf: &Arc<Mutex<Vec<f32>>>, data: I, channels: usize)
where
    I: Iterator<Item = f32>,
{
    let Ok(mut guard) = buf.lock() else {
        return;
    };

    let mut frame_sum = 0.0;
    let mut in_frame = 0;
    for sample in data {
        frame_sum += sample;
        in_frame += 1;
        if in_frame == channels {
            guard.push(frame_sum / channels as f32);
            frame_sum = 0.0;
            in_frame = 0;
        }
    }
}
