//! In-process mixer for WAV clips.
//!
//! Clips are decoded with `hound`, converted to the output layout, summed onto
//! a zeroed buffer and written back as 16-bit PCM.

use async_trait::async_trait;
use log::debug;
use std::io::Cursor;
use std::path::Path;

use super::{MixPlan, Mixer, RenderedTrack, TrackFormat};
use crate::errors::CompositeError;

/// File name of the mixed track inside the job workspace
pub const TRACK_FILE_NAME: &str = "dub_track.wav";

/// Decoded interleaved samples in `[-1.0, 1.0]`
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub samples: Vec<f32>,
    pub format: TrackFormat,
}

impl PcmBuffer {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    pub fn duration(&self) -> f64 {
        self.format.seconds_for(self.frames())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PcmMixer;

impl PcmMixer {
    pub fn new() -> Self {
        Self
    }

    /// Render the plan into an interleaved buffer
    pub fn render(plan: &MixPlan) -> Result<PcmBuffer, CompositeError> {
        let format = plan.format;
        let channels = format.channels as usize;
        let base_frames = format.frames_for(plan.total_duration);

        let mut overlays = Vec::with_capacity(plan.placements.len());
        let mut out_frames = base_frames;

        for placement in &plan.placements {
            let decoded = decode_wav(&placement.samples).map_err(|reason| CompositeError::Decode {
                cue_index: placement.cue_index,
                reason,
            })?;
            let mut converted = convert(&decoded, format);
            if let Some(limit) = placement.max_duration {
                converted.truncate(format.frames_for(limit) * channels);
            }

            let offset = format.frames_for(placement.offset);
            let frames = converted.len() / channels;
            out_frames = out_frames.max(offset + frames);
            overlays.push((offset, converted));
        }

        let mut samples = vec![0.0f32; out_frames * channels];
        for (offset, overlay) in overlays {
            let start = offset * channels;
            for (dst, src) in samples[start..start + overlay.len()].iter_mut().zip(overlay.iter()) {
                *dst += *src;
            }
        }

        if out_frames > base_frames {
            debug!(
                "Overlay runs {:.3}s past the base track",
                format.seconds_for(out_frames - base_frames)
            );
        }

        Ok(PcmBuffer { samples, format })
    }
}

#[async_trait]
impl Mixer for PcmMixer {
    async fn mix(&self, plan: &MixPlan, work_dir: &Path) -> Result<RenderedTrack, CompositeError> {
        let plan = plan.clone();
        let path = work_dir.join(TRACK_FILE_NAME);
        let target = path.clone();

        let duration = tokio::task::spawn_blocking(move || -> Result<f64, CompositeError> {
            let buffer = Self::render(&plan)?;
            write_wav_file(&target, &buffer)?;
            Ok(buffer.duration())
        })
        .await
        .map_err(|e| CompositeError::Aborted(e.to_string()))??;

        Ok(RenderedTrack { path, duration })
    }
}

/// Decode WAV bytes into normalized interleaved samples
pub fn decode_wav(bytes: &[u8]) -> Result<PcmBuffer, String> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        return Err(format!("unsupported WAV layout: {} channels at {} Hz", spec.channels, spec.sample_rate));
    }

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| e.to_string())?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?
        }
    };

    Ok(PcmBuffer {
        samples,
        format: TrackFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        },
    })
}

/// Convert a buffer to another channel count and sample rate
pub fn convert(buffer: &PcmBuffer, target: TrackFormat) -> Vec<f32> {
    let src_channels = buffer.format.channels as usize;
    let dst_channels = target.channels as usize;
    let frames = buffer.frames();

    let remixed: Vec<f32> = if src_channels == dst_channels {
        buffer.samples[..frames * src_channels].to_vec()
    } else {
        let mut out = Vec::with_capacity(frames * dst_channels);
        for frame in buffer.samples.chunks_exact(src_channels) {
            if dst_channels == 1 {
                out.push(frame.iter().sum::<f32>() / src_channels as f32);
            } else {
                for c in 0..dst_channels {
                    out.push(frame[c % src_channels]);
                }
            }
        }
        out
    };

    if buffer.format.sample_rate == target.sample_rate || frames == 0 {
        return remixed;
    }

    // Linear interpolation is enough for speech
    let ratio = buffer.format.sample_rate as f64 / target.sample_rate as f64;
    let out_frames = (frames as f64 / ratio).round() as usize;
    let mut out = Vec::with_capacity(out_frames * dst_channels);
    for i in 0..out_frames {
        let position = i as f64 * ratio;
        let i0 = (position.floor() as usize).min(frames - 1);
        let i1 = (i0 + 1).min(frames - 1);
        let frac = (position - i0 as f64) as f32;
        for c in 0..dst_channels {
            let a = remixed[i0 * dst_channels + c];
            let b = remixed[i1 * dst_channels + c];
            out.push(a + (b - a) * frac);
        }
    }
    out
}

fn wav_spec(format: TrackFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32).round() as i16
}

/// Write a buffer as 16-bit PCM WAV
pub fn write_wav_file(path: &Path, buffer: &PcmBuffer) -> Result<(), CompositeError> {
    let mut writer = hound::WavWriter::create(path, wav_spec(buffer.format))
        .map_err(|e| CompositeError::Encode(e.to_string()))?;
    for sample in &buffer.samples {
        writer.write_sample(to_i16(*sample)).map_err(|e| CompositeError::Encode(e.to_string()))?;
    }
    writer.finalize().map_err(|e| CompositeError::Encode(e.to_string()))
}

/// Encode a buffer as 16-bit PCM WAV bytes
pub fn encode_wav(buffer: &PcmBuffer) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(buffer.format))?;
        for sample in &buffer.samples {
            writer.write_sample(to_i16(*sample))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// A sine tone, handy as stand-in speech
pub fn sine_tone(frequency: f32, seconds: f64, format: TrackFormat, amplitude: f32) -> PcmBuffer {
    let frames = format.frames_for(seconds);
    let channels = format.channels as usize;
    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        let t = i as f32 / format.sample_rate as f32;
        let value = amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin();
        samples.extend(std::iter::repeat_n(value, channels));
    }
    PcmBuffer { samples, format }
}
