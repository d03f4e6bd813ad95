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

//! Test doubles for the host capabilities and helpers for audio fixtures.

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;

use crate::samples::{DecodeError, FetchError, LoadedSample, SampleDecoder, SampleFetcher};

/// Serves assets from memory and counts how often each one was fetched.
#[derive(Default)]
pub struct MemoryFetcher {
    files: Mutex<HashMap<String, Vec<u8>>>,
    fetches: Mutex<HashMap<String, usize>>,
    delays: Mutex<HashMap<String, Duration>>,
    delay: Duration,
}

impl MemoryFetcher {
    /// Delays every fetch by the given amount on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn insert(&self, asset_path: &str, bytes: Vec<u8>) {
        self.files.lock().insert(asset_path.to_string(), bytes);
    }

    /// Overrides the delay for a single asset.
    pub fn set_delay(&self, asset_path: &str, delay: Duration) {
        self.delays.lock().insert(asset_path.to_string(), delay);
    }

    pub fn fetch_count(&self, asset_path: &str) -> usize {
        self.fetches.lock().get(asset_path).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

impl SampleFetcher for MemoryFetcher {
    fn fetch(&self, asset_path: &str) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
        *self
            .fetches
            .lock()
            .entry(asset_path.to_string())
            .or_default() += 1;

        let delay = self
            .delays
            .lock()
            .get(asset_path)
            .copied()
            .unwrap_or(self.delay);
        let result = self
            .files
            .lock()
            .get(asset_path)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("{} not found", asset_path)));

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            result
        }
        .boxed()
    }
}

/// Turns each byte into one mono sample. Bytes equal to `CORRUPT` fail to decode.
#[derive(Debug, Clone)]
pub struct MemoryDecoder {
    sample_rate: u32,
}

impl MemoryDecoder {
    pub const CORRUPT: &'static [u8] = b"corrupt";

    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl Default for MemoryDecoder {
    fn default() -> Self {
        MemoryDecoder::new(44100)
    }
}

impl SampleDecoder for MemoryDecoder {
    fn decode(
        &self,
        bytes: Vec<u8>,
        _extension: Option<&str>,
    ) -> BoxFuture<'static, Result<LoadedSample, DecodeError>> {
        let sample_rate = self.sample_rate;
        async move {
            if bytes == MemoryDecoder::CORRUPT {
                return Err(DecodeError::Unsupported("corrupt sample".to_string()));
            }
            let data = bytes.iter().map(|b| *b as f32 / 255.0).collect();
            Ok(LoadedSample::new(data, 1, sample_rate))
        }
        .boxed()
    }
}

/// Encodes per-channel f32 samples as a float WAV file in memory.
pub fn wav_bytes(channels: &[Vec<f32>], sample_rate: u32) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(
            &mut cursor,
            WavSpec {
                channels: channels.len() as u16,
                sample_rate,
                bits_per_sample: 32,
                sample_format: SampleFormat::Float,
            },
        )
        .expect("wav writer");

        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for frame in 0..frames {
            for channel in channels {
                writer
                    .write_sample(channel.get(frame).copied().unwrap_or(0.0))
                    .expect("wav sample");
            }
        }
        writer.finalize().expect("wav finalize");
    }
    cursor.into_inner()
}
