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

//! Instruments, the note vocabulary and the sound events built from it.
//!
//! Sample filenames are built from these types, so every `as_str` here is part
//! of the asset naming contract.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::InstrumentOverride;

/// Error for events or names that can't be represented.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidEvent {
    #[error("unknown instrument '{0}'")]
    Instrument(String),

    #[error("unknown pitch class '{0}'")]
    PitchClass(String),

    #[error("octave {0} is outside of {min}..={max}", min = Octave::MIN, max = Octave::MAX)]
    Octave(u8),

    #[error("unknown duration '{0}'")]
    Duration(String),

    #[error("unknown dynamic '{0}'")]
    Dynamic(String),

    #[error("malformed event '{0}'")]
    Malformed(String),
}

/// One of the twelve chromatic pitch names. Sharps are spelled with a trailing `s`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs,
    D,
    Ds,
    E,
    F,
    Fs,
    G,
    Gs,
    A,
    As,
    B,
}

impl PitchClass {
    const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "Cs",
            PitchClass::D => "D",
            PitchClass::Ds => "Ds",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "Fs",
            PitchClass::G => "G",
            PitchClass::Gs => "Gs",
            PitchClass::A => "A",
            PitchClass::As => "As",
            PitchClass::B => "B",
        }
    }

    /// Semitones above C.
    pub fn semitone(&self) -> u8 {
        *self as u8
    }
}

impl FromStr for PitchClass {
    type Err = InvalidEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept "#" as an alias for the sharp suffix.
        let normalized = s.replace('#', "s");
        PitchClass::ALL
            .iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(&normalized))
            .copied()
            .ok_or_else(|| InvalidEvent::PitchClass(s.to_string()))
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An octave number in the range covered by the sample library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Octave(u8);

impl Octave {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 6;

    pub fn new(octave: u8) -> Result<Octave, InvalidEvent> {
        if (Self::MIN..=Self::MAX).contains(&octave) {
            Ok(Octave(octave))
        } else {
            Err(InvalidEvent::Octave(octave))
        }
    }

    pub fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Octave {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Relative note length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationClass {
    Quarter,
    Half,
    Whole,
}

impl DurationClass {
    /// The code used in sample filenames.
    pub fn code(&self) -> &'static str {
        match self {
            DurationClass::Quarter => "025",
            DurationClass::Half => "05",
            DurationClass::Whole => "1",
        }
    }

    /// How many tempo units this duration lasts.
    pub fn multiplier(&self) -> f64 {
        match self {
            DurationClass::Quarter => 0.5,
            DurationClass::Half => 1.0,
            DurationClass::Whole => 2.0,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            DurationClass::Quarter => "quarter",
            DurationClass::Half => "half",
            DurationClass::Whole => "whole",
        }
    }
}

impl FromStr for DurationClass {
    type Err = InvalidEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "quarter" | "q" | "025" => Ok(DurationClass::Quarter),
            "half" | "h" | "05" => Ok(DurationClass::Half),
            "whole" | "w" | "1" => Ok(DurationClass::Whole),
            _ => Err(InvalidEvent::Duration(s.to_string())),
        }
    }
}

/// Loudness marking. Part of the sample key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dynamic {
    Pianissimo,
    Piano,
    MezzoPiano,
    MezzoForte,
    Forte,
    Fortissimo,
}

impl Dynamic {
    const ALL: [Dynamic; 6] = [
        Dynamic::Pianissimo,
        Dynamic::Piano,
        Dynamic::MezzoPiano,
        Dynamic::MezzoForte,
        Dynamic::Forte,
        Dynamic::Fortissimo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dynamic::Pianissimo => "pianissimo",
            Dynamic::Piano => "piano",
            Dynamic::MezzoPiano => "mezzo-piano",
            Dynamic::MezzoForte => "mezzo-forte",
            Dynamic::Forte => "forte",
            Dynamic::Fortissimo => "fortissimo",
        }
    }

    /// Linear amplitude used when a dynamic has to be rendered without a sample.
    pub fn amplitude(&self) -> f32 {
        match self {
            Dynamic::Pianissimo => 0.15,
            Dynamic::Piano => 0.25,
            Dynamic::MezzoPiano => 0.4,
            Dynamic::MezzoForte => 0.55,
            Dynamic::Forte => 0.75,
            Dynamic::Fortissimo => 0.9,
        }
    }
}

impl FromStr for Dynamic {
    type Err = InvalidEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let short = match lower.as_str() {
            "pp" => Some(Dynamic::Pianissimo),
            "p" => Some(Dynamic::Piano),
            "mp" => Some(Dynamic::MezzoPiano),
            "mf" => Some(Dynamic::MezzoForte),
            "f" => Some(Dynamic::Forte),
            "ff" => Some(Dynamic::Fortissimo),
            _ => None,
        };
        short
            .or_else(|| Dynamic::ALL.iter().find(|d| d.as_str() == lower).copied())
            .ok_or_else(|| InvalidEvent::Dynamic(s.to_string()))
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pitched note.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Note {
    pub pitch: PitchClass,
    pub octave: Octave,
    pub duration: DurationClass,
    pub dynamic: Option<Dynamic>,
}

impl Note {
    pub fn new(
        pitch: PitchClass,
        octave: u8,
        duration: DurationClass,
    ) -> Result<Note, InvalidEvent> {
        Ok(Note {
            pitch,
            octave: Octave::new(octave)?,
            duration,
            dynamic: None,
        })
    }

    pub fn with_dynamic(mut self, dynamic: Dynamic) -> Note {
        self.dynamic = Some(dynamic);
        self
    }

    /// MIDI note number, with C4 = 60.
    pub fn midi_number(&self) -> u8 {
        12 * (self.octave.get() + 1) + self.pitch.semitone()
    }

    /// Equal-tempered frequency with A4 = 440Hz.
    pub fn frequency(&self) -> f32 {
        440.0 * 2f32.powf((self.midi_number() as f32 - 69.0) / 12.0)
    }
}

/// A percussive hit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Hit {
    pub duration: DurationClass,
    pub dynamic: Option<Dynamic>,
    pub technique: Option<String>,
}

impl Hit {
    pub fn new(duration: DurationClass) -> Hit {
        Hit {
            duration,
            dynamic: None,
            technique: None,
        }
    }

    pub fn with_dynamic(mut self, dynamic: Dynamic) -> Hit {
        self.dynamic = Some(dynamic);
        self
    }

    pub fn with_technique(mut self, technique: &str) -> Hit {
        self.technique = Some(technique.to_string());
        self
    }
}

/// A logical instruction to play one note or hit, independent of any audio file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SoundEvent {
    Note(Note),
    Hit(Hit),
}

impl SoundEvent {
    pub fn duration(&self) -> DurationClass {
        match self {
            SoundEvent::Note(note) => note.duration,
            SoundEvent::Hit(hit) => hit.duration,
        }
    }

    pub fn dynamic(&self) -> Option<Dynamic> {
        match self {
            SoundEvent::Note(note) => note.dynamic,
            SoundEvent::Hit(hit) => hit.dynamic,
        }
    }
}

impl From<Note> for SoundEvent {
    fn from(note: Note) -> Self {
        SoundEvent::Note(note)
    }
}

impl From<Hit> for SoundEvent {
    fn from(hit: Hit) -> Self {
        SoundEvent::Hit(hit)
    }
}

/// Parses the compact event notation used on the command line:
/// `C4:quarter[:dynamic]` for notes and `hit:half[:dynamic[:technique]]` for hits.
impl FromStr for SoundEvent {
    type Err = InvalidEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() < 2 {
            return Err(InvalidEvent::Malformed(s.to_string()));
        }

        let duration = DurationClass::from_str(parts[1])?;
        let dynamic = match parts.get(2) {
            Some(dynamic) if !dynamic.is_empty() => Some(Dynamic::from_str(dynamic)?),
            _ => None,
        };

        if parts[0].eq_ignore_ascii_case("hit") {
            if parts.len() > 4 {
                return Err(InvalidEvent::Malformed(s.to_string()));
            }
            return Ok(SoundEvent::Hit(Hit {
                duration,
                dynamic,
                technique: parts
                    .get(3)
                    .filter(|t| !t.is_empty())
                    .map(|t| t.to_string()),
            }));
        }
        if parts.len() > 3 {
            return Err(InvalidEvent::Malformed(s.to_string()));
        }

        // Split "Cs4" into the pitch name and the trailing octave digits.
        let name = parts[0];
        let split = name
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| InvalidEvent::Malformed(s.to_string()))?;
        let pitch = PitchClass::from_str(&name[..split])?;
        let octave: u8 = name[split..]
            .parse()
            .map_err(|_| InvalidEvent::Malformed(s.to_string()))?;

        Ok(SoundEvent::Note(Note {
            pitch,
            octave: Octave::new(octave)?,
            duration,
            dynamic,
        }))
    }
}

impl fmt::Display for SoundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundEvent::Note(note) => {
                write!(f, "{}{}:{}", note.pitch, note.octave, note.duration.name())?;
                if let Some(dynamic) = note.dynamic {
                    write!(f, ":{}", dynamic)?;
                }
                Ok(())
            }
            SoundEvent::Hit(hit) => {
                write!(f, "hit:{}", hit.duration.name())?;
                match (&hit.dynamic, &hit.technique) {
                    (Some(dynamic), Some(technique)) => write!(f, ":{}:{}", dynamic, technique),
                    (Some(dynamic), None) => write!(f, ":{}", dynamic),
                    (None, Some(technique)) => write!(f, "::{}", technique),
                    (None, None) => Ok(()),
                }
            }
        }
    }
}

/// Whether an instrument plays pitches or unpitched hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstrumentKind {
    Pitched,
    Percussion,
}

/// The instruments in the sample library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Instrument {
    Violin,
    Flute,
    Clarinet,
    Trumpet,
    Tuba,
    BassDrum,
}

impl Instrument {
    pub const ALL: [Instrument; 6] = [
        Instrument::Violin,
        Instrument::Flute,
        Instrument::Clarinet,
        Instrument::Trumpet,
        Instrument::Tuba,
        Instrument::BassDrum,
    ];

    /// The name used as the sample filename prefix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Violin => "violin",
            Instrument::Flute => "flute",
            Instrument::Clarinet => "clarinet",
            Instrument::Trumpet => "trumpet",
            Instrument::Tuba => "tuba",
            Instrument::BassDrum => "bass-drum",
        }
    }

    pub fn kind(&self) -> InstrumentKind {
        match self {
            Instrument::BassDrum => InstrumentKind::Percussion,
            _ => InstrumentKind::Pitched,
        }
    }

    /// The built-in profile for this instrument.
    pub fn default_profile(&self) -> InstrumentProfile {
        // Clarinet and trumpet recordings have no mezzo-forte takes for the regular
        // durations, so they default to forte.
        let (directory, technique, default_dynamic) = match self {
            Instrument::Violin => (
                "audio/philharmonia/strings/violin",
                "arco-normal",
                Dynamic::MezzoForte,
            ),
            Instrument::Flute => (
                "audio/philharmonia/woodwinds/flute",
                "normal",
                Dynamic::MezzoForte,
            ),
            Instrument::Clarinet => (
                "audio/philharmonia/woodwinds/clarinet",
                "normal",
                Dynamic::Forte,
            ),
            Instrument::Trumpet => (
                "audio/philharmonia/brass/trumpet",
                "normal",
                Dynamic::Forte,
            ),
            Instrument::Tuba => (
                "audio/philharmonia/brass/tuba",
                "normal",
                Dynamic::MezzoForte,
            ),
            Instrument::BassDrum => (
                "audio/philharmonia/percussion/bass drum",
                "bass-drum-mallet",
                Dynamic::MezzoForte,
            ),
        };

        InstrumentProfile {
            instrument: *self,
            directory: directory.to_string(),
            technique: technique.to_string(),
            default_dynamic,
        }
    }
}

impl FromStr for Instrument {
    type Err = InvalidEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase().replace(['_', ' '], "-");
        Instrument::ALL
            .iter()
            .find(|i| i.as_str() == lower)
            .copied()
            .ok_or_else(|| InvalidEvent::Instrument(s.to_string()))
    }
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an instrument's samples live and how to fill in what an event leaves out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentProfile {
    instrument: Instrument,
    /// Asset directory, relative to the asset root.
    directory: String,
    /// Default articulation suffix.
    technique: String,
    /// Dynamic used when an event doesn't give one.
    default_dynamic: Dynamic,
}

impl InstrumentProfile {
    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    pub fn kind(&self) -> InstrumentKind {
        self.instrument.kind()
    }

    pub fn directory(&self) -> &str {
        &self.directory
    }

    pub fn technique(&self) -> &str {
        &self.technique
    }

    pub fn default_dynamic(&self) -> Dynamic {
        self.default_dynamic
    }
}

/// The per-instrument profile table, built-in defaults plus any overrides.
#[derive(Debug, Clone)]
pub struct InstrumentTable {
    profiles: HashMap<Instrument, InstrumentProfile>,
}

impl InstrumentTable {
    /// Applies configured overrides on top of the built-in profiles.
    pub fn with_overrides(overrides: &HashMap<Instrument, InstrumentOverride>) -> Self {
        let mut table = InstrumentTable::default();
        for (instrument, o) in overrides {
            let profile = table
                .profiles
                .entry(*instrument)
                .or_insert_with(|| instrument.default_profile());
            if let Some(path) = o.path() {
                profile.directory = path.trim_end_matches('/').to_string();
            }
            if let Some(technique) = o.technique() {
                profile.technique = technique.to_string();
            }
            if let Some(dynamic) = o.default_dynamic() {
                profile.default_dynamic = dynamic;
            }
        }
        table
    }

    pub fn profile(&self, instrument: Instrument) -> &InstrumentProfile {
        // The default table holds every instrument and overrides never remove one.
        &self.profiles[&instrument]
    }
}

impl Default for InstrumentTable {
    fn default() -> Self {
        InstrumentTable {
            profiles: Instrument::ALL
                .iter()
                .map(|i| (*i, i.default_profile()))
                .collect(),
        }
    }
}
