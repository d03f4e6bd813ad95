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

//! Maps sound events to sample file names.
//!
//! Pitched: `{instrument}_{pitch}{octave}_{duration}_{dynamic}_{technique}.{ext}`
//! Percussion: `{instrument}__{duration}_{dynamic}_{technique}.{ext}`

use std::fmt;

use crate::instrument::{InstrumentKind, InstrumentProfile, SoundEvent};

/// Default sample file extension.
pub const DEFAULT_EXTENSION: &str = "mp3";

/// A fully resolved sample location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SamplePath {
    /// Cache key, `{instrument}/{file_name}`.
    key: String,
    file_name: String,
    /// Path relative to the asset root, `{directory}/{file_name}`.
    asset_path: String,
}

impl SamplePath {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn asset_path(&self) -> &str {
        &self.asset_path
    }

    /// The file extension, used as a format hint by decoders.
    pub fn extension(&self) -> Option<&str> {
        self.file_name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

impl fmt::Display for SamplePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.asset_path)
    }
}

/// Resolves events against instrument profiles. Pure; never fails.
#[derive(Debug, Clone)]
pub struct Resolver {
    extension: String,
}

impl Resolver {
    pub fn new(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    /// Builds the sample path for the given event.
    pub fn resolve(&self, profile: &InstrumentProfile, event: &SoundEvent) -> SamplePath {
        let instrument = profile.instrument().as_str();
        let duration = event.duration().code();
        let dynamic = event
            .dynamic()
            .unwrap_or_else(|| profile.default_dynamic())
            .as_str();

        let file_name = match (profile.kind(), event) {
            (InstrumentKind::Pitched, SoundEvent::Note(note)) => format!(
                "{}_{}{}_{}_{}_{}.{}",
                instrument,
                note.pitch,
                note.octave,
                duration,
                dynamic,
                profile.technique(),
                self.extension
            ),
            // Anything else has no pitch to encode.
            (_, SoundEvent::Hit(hit)) => format!(
                "{}__{}_{}_{}.{}",
                instrument,
                duration,
                dynamic,
                hit.technique.as_deref().unwrap_or(profile.technique()),
                self.extension
            ),
            (InstrumentKind::Percussion, SoundEvent::Note(_)) => format!(
                "{}__{}_{}_{}.{}",
                instrument,
                duration,
                dynamic,
                profile.technique(),
                self.extension
            ),
        };

        let directory = profile.directory().trim_end_matches('/');
        let asset_path = if directory.is_empty() {
            file_name.clone()
        } else {
            format!("{}/{}", directory, file_name)
        };

        SamplePath {
            key: format!("{}/{}", instrument, file_name),
            file_name,
            asset_path,
        }
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Resolver::new(DEFAULT_EXTENSION)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::InstrumentOverride;
    use crate::instrument::{
        DurationClass, Dynamic, Hit, Instrument, InstrumentTable, Note, PitchClass,
    };

    fn note(pitch: PitchClass, octave: u8, duration: DurationClass) -> SoundEvent {
        Note::new(pitch, octave, duration).unwrap().into()
    }

    #[test]
    fn test_pitched_template() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();

        let path = resolver.resolve(
            table.profile(Instrument::Violin),
            &note(PitchClass::Gs, 3, DurationClass::Quarter),
        );
        assert_eq!(path.file_name(), "violin_Gs3_025_mezzo-forte_arco-normal.mp3");
        assert_eq!(path.key(), "violin/violin_Gs3_025_mezzo-forte_arco-normal.mp3");
        assert_eq!(
            path.asset_path(),
            "audio/philharmonia/strings/violin/violin_Gs3_025_mezzo-forte_arco-normal.mp3"
        );
        assert_eq!(path.extension(), Some("mp3"));
    }

    #[test]
    fn test_default_dynamic_is_per_instrument() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();
        let event = note(PitchClass::C, 4, DurationClass::Half);

        let cases = [
            (Instrument::Violin, "violin_C4_05_mezzo-forte_arco-normal.mp3"),
            (Instrument::Flute, "flute_C4_05_mezzo-forte_normal.mp3"),
            (Instrument::Clarinet, "clarinet_C4_05_forte_normal.mp3"),
            (Instrument::Trumpet, "trumpet_C4_05_forte_normal.mp3"),
            (Instrument::Tuba, "tuba_C4_05_mezzo-forte_normal.mp3"),
        ];
        for (instrument, expected) in cases {
            let path = resolver.resolve(table.profile(instrument), &event);
            assert_eq!(path.file_name(), expected, "instrument {}", instrument);
        }
    }

    #[test]
    fn test_explicit_dynamic_wins() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();
        let event: SoundEvent = Note::new(PitchClass::E, 5, DurationClass::Whole)
            .unwrap()
            .with_dynamic(Dynamic::Pianissimo)
            .into();

        let path = resolver.resolve(table.profile(Instrument::Trumpet), &event);
        assert_eq!(path.file_name(), "trumpet_E5_1_pianissimo_normal.mp3");
    }

    #[test]
    fn test_bass_drum_defaults() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();
        let profile = table.profile(Instrument::BassDrum);

        let path = resolver.resolve(profile, &Hit::new(DurationClass::Quarter).into());
        assert_eq!(path.file_name(), "bass-drum__025_mezzo-forte_bass-drum-mallet.mp3");
        assert_eq!(
            path.asset_path(),
            "audio/philharmonia/percussion/bass drum/bass-drum__025_mezzo-forte_bass-drum-mallet.mp3"
        );

        let path = resolver.resolve(
            profile,
            &Hit::new(DurationClass::Whole)
                .with_dynamic(Dynamic::Fortissimo)
                .with_technique("struck-singly")
                .into(),
        );
        assert_eq!(path.file_name(), "bass-drum__1_fortissimo_struck-singly.mp3");
    }

    #[test]
    fn test_kind_mismatch_still_resolves() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();

        let path = resolver.resolve(
            table.profile(Instrument::BassDrum),
            &note(PitchClass::A, 2, DurationClass::Half),
        );
        assert_eq!(path.file_name(), "bass-drum__05_mezzo-forte_bass-drum-mallet.mp3");

        let path = resolver.resolve(
            table.profile(Instrument::Flute),
            &Hit::new(DurationClass::Half).into(),
        );
        assert_eq!(path.file_name(), "flute__05_mezzo-forte_normal.mp3");
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let table = InstrumentTable::default();
        let resolver = Resolver::default();
        let event = note(PitchClass::Ds, 6, DurationClass::Whole);

        for instrument in Instrument::ALL {
            let first = resolver.resolve(table.profile(instrument), &event);
            let second = resolver.resolve(table.profile(instrument), &event);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_overrides_and_extension() {
        let mut overrides = HashMap::new();
        overrides.insert(
            Instrument::Violin,
            InstrumentOverride::new(
                Some("samples/violin/".to_string()),
                Some("pizzicato".to_string()),
                Some(Dynamic::Piano),
            ),
        );
        let table = InstrumentTable::with_overrides(&overrides);
        let resolver = Resolver::new(".wav");

        let path = resolver.resolve(
            table.profile(Instrument::Violin),
            &note(PitchClass::A, 4, DurationClass::Quarter),
        );
        assert_eq!(path.asset_path(), "samples/violin/violin_A4_025_piano_pizzicato.wav");
        assert_eq!(path.extension(), Some("wav"));

        // Other instruments keep their defaults.
        let path = resolver.resolve(
            table.profile(Instrument::Clarinet),
            &note(PitchClass::A, 4, DurationClass::Quarter),
        );
        assert_eq!(path.file_name(), "clarinet_A4_025_forte_normal.wav");
    }
}
