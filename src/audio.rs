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
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::samples::VoiceSource;

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod silent;

/// Error types for audio outputs.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("no output device found with name {0}")]
    DeviceNotFound(String),

    #[error("audio device error: {0}")]
    Device(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("output is closed")]
    Closed,
}

/// Somewhere voices can be played.
pub trait Output: fmt::Display + Send + Sync {
    /// Starts playing the voice. The output drops the source once it's finished
    /// or cancelled.
    fn start(&self, source: VoiceSource) -> Result<(), OutputError>;

    /// The sample rate voices are expected to be in.
    fn sample_rate(&self) -> u32;
}

/// A shared linear gain, adjustable while voices are playing.
#[derive(Clone)]
pub struct Gain(Arc<AtomicU32>);

impl Gain {
    pub fn new(value: f32) -> Self {
        Gain(Arc::new(AtomicU32::new(Self::clamp(value).to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    /// Sets the gain, clamped to 0..=1. Returns the value actually set.
    pub fn set(&self, value: f32) -> f32 {
        let value = Self::clamp(value);
        self.0.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    fn clamp(value: f32) -> f32 {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        }
    }
}

impl Default for Gain {
    fn default() -> Self {
        Gain::new(1.0)
    }
}

impl fmt::Debug for Gain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Gain").field(&self.get()).finish()
    }
}

/// Lists the names of devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, OutputError> {
    cpal::list_device_names()
}

/// Gets the output with the given name.
/// `mock*` names give a recording mock, `silent` and `none` a silent output and
/// anything else a cpal device.
pub fn get_output(device: &str, sample_rate: u32) -> Result<Arc<dyn Output>, OutputError> {
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::MockOutput::new(device, 2, sample_rate)));
    }
    if device == "silent" || device == "none" {
        return Ok(Arc::new(silent::SilentOutput::new(sample_rate)));
    }

    Ok(Arc::new(cpal::CpalOutput::get(device, sample_rate)?))
}
