// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Decoding of fetched sample bytes into playable in-memory audio.

use std::io::Cursor;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::info;

use super::error::DecodeError;
use super::loader::LoadedSample;

/// Turns raw sample bytes into a decoded buffer.
pub trait SampleDecoder: Send + Sync + 'static {
    /// Decodes the bytes. The extension, if known, is a format hint.
    fn decode(
        &self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> BoxFuture<'static, Result<LoadedSample, DecodeError>>;
}

/// Decodes anything symphonia can read and resamples it to the output rate.
/// Decoding runs on the blocking pool.
#[derive(Debug, Clone)]
pub struct SymphoniaDecoder {
    target_sample_rate: u32,
}

impl SymphoniaDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }
}

impl SampleDecoder for SymphoniaDecoder {
    fn decode(
        &self,
        bytes: Vec<u8>,
        extension: Option<&str>,
    ) -> BoxFuture<'static, Result<LoadedSample, DecodeError>> {
        let target_sample_rate = self.target_sample_rate;
        let extension = extension.map(str::to_string);
        async move {
            tokio::task::spawn_blocking(move || {
                decode_to_sample(bytes, extension.as_deref(), target_sample_rate)
            })
            .await
            .map_err(|e| DecodeError::Task(e.to_string()))?
        }
        .boxed()
    }
}

/// Decodes the bytes and resamples them if the rate doesn't match.
pub fn decode_to_sample(
    bytes: Vec<u8>,
    extension: Option<&str>,
    target_sample_rate: u32,
) -> Result<LoadedSample, DecodeError> {
    let (samples, channel_count, source_rate) = decode_interleaved(bytes, extension)?;

    let (samples, sample_rate) = if source_rate != target_sample_rate {
        info!(
            source_rate,
            target_rate = target_sample_rate,
            "Transcoding sample"
        );
        (
            transcode_samples(&samples, channel_count, source_rate, target_sample_rate),
            target_sample_rate,
        )
    } else {
        (samples, source_rate)
    };

    Ok(LoadedSample::new(samples, channel_count, sample_rate))
}

/// Decodes every packet of the first audio track into interleaved f32 samples.
/// Returns the samples, channel count and sample rate.
fn decode_interleaved(
    bytes: Vec<u8>,
    extension: Option<&str>,
) -> Result<(Vec<f32>, u16, u32), DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let format_result = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format_reader = format_result.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::Unsupported("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channel_count = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    let mut sample_buffer: Option<SampleBuffer<f32>> = None;
    loop {
        let packet = match format_reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // A corrupt packet is skipped, the rest of the file may still be fine.
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        if channel_count == 0 {
            channel_count = spec.channels.count() as u16;
        }
        if sample_rate.is_none() {
            sample_rate = Some(spec.rate);
        }

        let buffer = sample_buffer
            .get_or_insert_with(|| SampleBuffer::new(decoded.capacity() as u64, spec));
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if channel_count == 0 {
        return Err(DecodeError::Unsupported(
            "Channels not specified".to_string(),
        ));
    }
    let sample_rate = sample_rate
        .ok_or_else(|| DecodeError::Unsupported("Sample rate not specified".to_string()))?;

    Ok((samples, channel_count, sample_rate))
}

/// Transcodes samples from one sample rate to another using linear interpolation.
/// Linear interpolation is sufficient for one-shot instrument samples.
pub fn transcode_samples(
    samples: &[f32],
    channel_count: u16,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let channels = channel_count.max(1) as usize;
    let ratio = target_rate as f64 / source_rate as f64;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}
