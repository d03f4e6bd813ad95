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
use std::time::Duration;

use serde::Deserialize;

use super::error::ConfigError;
use super::parse_duration;
use crate::samples::batch::{DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_TIMEOUT};

/// Preload batching settings.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Batch {
    /// How many samples load at once (default: 10).
    size: Option<usize>,

    /// How long a single sample may take before it's reported as timed out.
    sample_timeout: Option<String>,
}

impl Batch {
    pub fn size(&self) -> usize {
        self.size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn sample_timeout(&self) -> Result<Duration, ConfigError> {
        match &self.sample_timeout {
            Some(timeout) => parse_duration("batch.sample_timeout", timeout),
            None => Ok(DEFAULT_SAMPLE_TIMEOUT),
        }
    }
}
