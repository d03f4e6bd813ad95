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

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::info;

use crate::audio::mixer::Mixer;
use crate::samples::{VoiceId, VoiceSource};

/// A voice the mock was asked to play.
#[derive(Debug, Clone)]
pub struct StartedVoice {
    pub id: VoiceId,
    pub sample_key: String,
    /// When the voice was started, on the tokio clock.
    pub at: Instant,
}

/// A mock output. Doesn't play anything, but records every voice it's given
/// and holds them in a mixer that can be driven by hand.
pub struct MockOutput {
    name: String,
    sample_rate: u32,
    started: Mutex<Vec<StartedVoice>>,
    mixer: Mutex<Mixer>,
}

impl MockOutput {
    pub fn new(name: &str, channels: u16, sample_rate: u32) -> Self {
        Self {
            name: name.to_string(),
            sample_rate,
            started: Mutex::new(Vec::new()),
            mixer: Mutex::new(Mixer::new(channels)),
        }
    }

    /// Every voice started so far, in order.
    pub fn started(&self) -> Vec<StartedVoice> {
        self.started.lock().clone()
    }

    pub fn started_keys(&self) -> Vec<String> {
        self.started
            .lock()
            .iter()
            .map(|v| v.sample_key.clone())
            .collect()
    }

    /// Number of voices the mixer still holds.
    pub fn sounding(&self) -> usize {
        self.mixer.lock().active_count()
    }

    /// Mixes the given number of frames, letting voices run to completion.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        self.mixer.lock().process_frames(frames)
    }

    /// Removes the held voices without playing them.
    #[cfg(test)]
    pub fn take_sources(&self) -> Vec<VoiceSource> {
        self.mixer.lock().take_voices()
    }
}

impl crate::audio::Output for MockOutput {
    fn start(&self, source: VoiceSource) -> Result<(), crate::audio::OutputError> {
        info!(
            device = self.name,
            voice = source.id(),
            sample = source.sample_key(),
            "Starting voice (mock)."
        );
        self.started.lock().push(StartedVoice {
            id: source.id(),
            sample_key: source.sample_key().to_string(),
            at: Instant::now(),
        });
        self.mixer.lock().add(source);
        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl fmt::Display for MockOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
