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
// Core voice mixing logic shared by the cpal output and the mock.
use crate::samples::VoiceSource;

/// Sums active voices into interleaved output frames.
///
/// The mixer owns its voices outright; whoever drives it (an audio callback or
/// a test) is the only thread touching it.
pub struct Mixer {
    /// Voices currently playing.
    voices: Vec<VoiceSource>,
    /// Number of output channels.
    num_channels: u16,
}

impl Mixer {
    pub fn new(num_channels: u16) -> Self {
        Self {
            voices: Vec::new(),
            num_channels: num_channels.max(1),
        }
    }

    pub fn add(&mut self, voice: VoiceSource) {
        self.voices.push(voice);
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    pub fn active_count(&self) -> usize {
        self.voices.len()
    }

    /// Mixes one frame into `frame`, which must hold `num_channels` samples.
    /// Finished and cancelled voices are dropped.
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        frame.fill(0.0);
        self.voices.retain_mut(|voice| voice.mix_next_frame(frame));
    }

    /// Fills an interleaved buffer with as many frames as fit.
    pub fn process_into(&mut self, output: &mut [f32]) {
        let channels = self.num_channels as usize;
        for frame in output.chunks_mut(channels) {
            self.process_frame(frame);
        }
    }

    /// Processes the given number of frames into a new buffer.
    pub fn process_frames(&mut self, num_frames: usize) -> Vec<f32> {
        let mut frames = vec![0.0f32; num_frames * self.num_channels as usize];
        self.process_into(&mut frames);
        frames
    }

    /// Removes every voice from the mixer and hands them back.
    pub fn take_voices(&mut self) -> Vec<VoiceSource> {
        std::mem::take(&mut self.voices)
    }
}
