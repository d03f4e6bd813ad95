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

//! Synthesized stand-ins for events whose sample can't be loaded.

use std::f32::consts::PI;

use crate::instrument::{Dynamic, SoundEvent};

use super::loader::LoadedSample;

const ATTACK_SECS: f32 = 0.02;
const DECAY_SECS: f32 = 0.1;
const SUSTAIN_LEVEL: f32 = 0.7;
const RELEASE_SECS: f32 = 0.15;

/// Length of a synthesized percussion hit.
const THUMP_SECS: f32 = 0.4;
const THUMP_START_HZ: f32 = 110.0;
const THUMP_END_HZ: f32 = 45.0;

/// Renders an approximation of the event as a mono sample.
///
/// Notes become a sine at the note's frequency shaped by an ADSR envelope and
/// lasting `multiplier` seconds. Hits become a short pitch-dropping thump.
/// The dynamic sets the peak level, falling back to `default_dynamic`.
pub fn synthesize(event: &SoundEvent, default_dynamic: Dynamic, sample_rate: u32) -> LoadedSample {
    let amplitude = event.dynamic().unwrap_or(default_dynamic).amplitude();
    let data = match event {
        SoundEvent::Note(note) => tone(
            note.frequency(),
            event.duration().multiplier() as f32,
            amplitude,
            sample_rate,
        ),
        SoundEvent::Hit(_) => thump(amplitude, sample_rate),
    };
    LoadedSample::new(data, 1, sample_rate)
}

fn tone(frequency: f32, seconds: f32, amplitude: f32, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let frames = (seconds * rate) as usize;
    (0..frames)
        .map(|i| {
            let t = i as f32 / rate;
            amplitude * envelope(t, seconds) * (2.0 * PI * frequency * t).sin()
        })
        .collect()
}

/// Attack, decay, sustain, release. The release ends exactly at `length`.
fn envelope(t: f32, length: f32) -> f32 {
    let release_start = (length - RELEASE_SECS).max(0.0);
    let level = if t < ATTACK_SECS {
        t / ATTACK_SECS
    } else if t < ATTACK_SECS + DECAY_SECS {
        1.0 - (1.0 - SUSTAIN_LEVEL) * (t - ATTACK_SECS) / DECAY_SECS
    } else {
        SUSTAIN_LEVEL
    };

    if t >= release_start {
        let remaining = (length - t).max(0.0) / (length - release_start).max(f32::EPSILON);
        level * remaining
    } else {
        level
    }
}

fn thump(amplitude: f32, sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    let frames = (THUMP_SECS * rate) as usize;
    let mut phase = 0.0f32;
    (0..frames)
        .map(|i| {
            let t = i as f32 / rate;
            let progress = t / THUMP_SECS;
            let frequency = THUMP_START_HZ + (THUMP_END_HZ - THUMP_START_HZ) * progress;
            phase += 2.0 * PI * frequency / rate;
            amplitude * (-6.0 * progress).exp() * phase.sin()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::{DurationClass, Hit, Note, PitchClass};

    fn peak(sample: &LoadedSample) -> f32 {
        sample.data().iter().fold(0.0f32, |max, s| max.max(s.abs()))
    }

    #[test]
    fn test_note_length_follows_duration() {
        let quarter: SoundEvent = Note::new(PitchClass::A, 4, DurationClass::Quarter)
            .unwrap()
            .into();
        let whole: SoundEvent = Note::new(PitchClass::A, 4, DurationClass::Whole)
            .unwrap()
            .into();

        let quarter = synthesize(&quarter, Dynamic::MezzoForte, 1000);
        let whole = synthesize(&whole, Dynamic::MezzoForte, 1000);

        assert_eq!(quarter.frames(), 500);
        assert_eq!(whole.frames(), 2000);
        assert_eq!(quarter.channel_count(), 1);
        assert_eq!(quarter.sample_rate(), 1000);
    }

    #[test]
    fn test_envelope_starts_and_ends_silent() {
        let event: SoundEvent = Note::new(PitchClass::C, 4, DurationClass::Half)
            .unwrap()
            .into();
        let sample = synthesize(&event, Dynamic::Forte, 44100);
        let data = sample.data();

        assert_eq!(data[0], 0.0);
        assert!(data[data.len() - 1].abs() < 0.01);
        assert!(peak(&sample) <= Dynamic::Forte.amplitude());
    }

    #[test]
    fn test_dynamic_sets_level() {
        let soft: SoundEvent = Note::new(PitchClass::G, 3, DurationClass::Half)
            .unwrap()
            .with_dynamic(Dynamic::Pianissimo)
            .into();
        let loud: SoundEvent = Note::new(PitchClass::G, 3, DurationClass::Half)
            .unwrap()
            .with_dynamic(Dynamic::Fortissimo)
            .into();

        let soft = synthesize(&soft, Dynamic::MezzoForte, 8000);
        let loud = synthesize(&loud, Dynamic::MezzoForte, 8000);
        assert!(peak(&loud) > peak(&soft) * 2.0);
    }

    #[test]
    fn test_hit_is_short_and_decays() {
        let hit: SoundEvent = Hit::new(DurationClass::Whole).into();
        let sample = synthesize(&hit, Dynamic::MezzoForte, 8000);
        let data = sample.data();

        assert_eq!(sample.frames(), (THUMP_SECS * 8000.0) as usize);
        let head = data[..800].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let tail = data[data.len() - 800..]
            .iter()
            .fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(head > tail * 4.0);
    }
}
