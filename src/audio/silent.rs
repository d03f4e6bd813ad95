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

use tracing::trace;

use crate::samples::VoiceSource;

/// Discards every voice. Used when no audio device is available.
#[derive(Debug, Clone)]
pub struct SilentOutput {
    sample_rate: u32,
}

impl SilentOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl crate::audio::Output for SilentOutput {
    fn start(&self, source: VoiceSource) -> Result<(), crate::audio::OutputError> {
        trace!(voice = source.id(), sample = source.sample_key(), "Discarding voice");
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for SilentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Silent")
    }
}
