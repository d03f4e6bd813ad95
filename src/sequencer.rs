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

//! Timed playback of event lists.
//!
//! A sequence preloads everything it needs, then triggers each event at its
//! offset from the start. Waits use absolute deadlines so timing doesn't drift
//! over long sequences.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, span, warn, Instrument as _, Level};

use crate::audio::OutputError;
use crate::config::{self, ConfigError, MissingSamplePolicy};
use crate::instrument::{
    DurationClass, Instrument, InstrumentProfile, InstrumentTable, SoundEvent,
};
use crate::playsync::CancelHandle;
use crate::samples::{
    synth, LoadError, LoadedSample, Resolver, SampleLoader, SamplePath, VoiceManager,
};

/// Errors that stop a sequence.
#[derive(Debug, thiserror::Error)]
pub enum SequenceError {
    #[error("{missing} sample(s) unavailable, first: {first}")]
    MissingSamples { missing: usize, first: LoadError },

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Tempo(#[from] ConfigError),
}

/// Called with each event as its time arrives, in list order, before it's
/// triggered. Never called once the sequence has been cancelled.
pub type EventHook<'a> = dyn FnMut(&ScheduledEvent) + Send + 'a;

/// One event placed in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledEvent {
    /// Position in the input list.
    pub index: usize,
    pub event: SoundEvent,
    /// Time from the start of the sequence.
    pub offset: Duration,
    pub duration: Duration,
}

/// Start offsets for an event list at a tempo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    entries: Vec<ScheduledEvent>,
    total: Duration,
}

impl Schedule {
    /// Places every event right after the previous one. `tempo` is the length
    /// of a half note.
    pub fn build(events: &[SoundEvent], tempo: Duration) -> Schedule {
        let mut offset = Duration::ZERO;
        let entries = events
            .iter()
            .enumerate()
            .map(|(index, event)| {
                let duration = scale(event.duration(), tempo);
                let entry = ScheduledEvent {
                    index,
                    event: event.clone(),
                    offset,
                    duration,
                };
                offset = offset.saturating_add(duration);
                entry
            })
            .collect();

        Schedule {
            entries,
            total: offset,
        }
    }

    pub fn entries(&self) -> &[ScheduledEvent] {
        &self.entries
    }

    /// Sum of all event durations.
    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn offsets(&self) -> Vec<Duration> {
        self.entries.iter().map(|e| e.offset).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scales the tempo by the duration's multiplier without going through floats.
fn scale(duration: DurationClass, tempo: Duration) -> Duration {
    match duration {
        DurationClass::Quarter => tempo / 2,
        DurationClass::Half => tempo,
        DurationClass::Whole => tempo.saturating_mul(2),
    }
}

/// What happened during a sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SequenceReport {
    /// Events that started a voice, synthesized ones included.
    pub triggered: usize,
    /// Events left silent because their sample was unavailable.
    pub skipped: usize,
    /// Events played with a synthesized stand-in.
    pub synthesized: usize,
    pub cancelled: bool,
    /// Time from the first trigger until the sequence returned.
    pub elapsed: Duration,
}

/// Plays event lists for an instrument through a voice manager.
pub struct Sequencer {
    loader: SampleLoader,
    voices: Arc<VoiceManager>,
    resolver: Resolver,
    table: Arc<InstrumentTable>,
    policy: MissingSamplePolicy,
}

impl Sequencer {
    pub fn new(
        loader: SampleLoader,
        voices: Arc<VoiceManager>,
        resolver: Resolver,
        table: Arc<InstrumentTable>,
        policy: MissingSamplePolicy,
    ) -> Self {
        Self {
            loader,
            voices,
            resolver,
            table,
            policy,
        }
    }

    pub fn policy(&self) -> MissingSamplePolicy {
        self.policy
    }

    /// Plays the events in order, each at its scheduled offset, and returns once
    /// the whole span of the sequence has passed or it was cancelled. Cancelling
    /// stops further triggers but leaves sounding voices alone.
    ///
    /// `on_event` sees every event as it comes due, skipped ones included.
    pub async fn play(
        &self,
        instrument: Instrument,
        events: &[SoundEvent],
        tempo: Duration,
        cancel: &CancelHandle,
        on_event: Option<&mut EventHook<'_>>,
    ) -> Result<SequenceReport, SequenceError> {
        let span = span!(Level::INFO, "play sequence", instrument = %instrument);
        self.play_inner(instrument, events, tempo, cancel, on_event)
            .instrument(span)
            .await
    }

    async fn play_inner(
        &self,
        instrument: Instrument,
        events: &[SoundEvent],
        tempo: Duration,
        cancel: &CancelHandle,
        mut on_event: Option<&mut EventHook<'_>>,
    ) -> Result<SequenceReport, SequenceError> {
        config::check_tempo(tempo)?;

        let mut report = SequenceReport::default();
        if cancel.is_cancelled() {
            report.cancelled = true;
            return Ok(report);
        }

        let profile = self.table.profile(instrument);
        let schedule = Schedule::build(events, tempo);
        let paths: Vec<SamplePath> = events
            .iter()
            .map(|event| self.resolver.resolve(profile, event))
            .collect();

        let loaded = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                report.cancelled = true;
                return Ok(report);
            }
            loaded = self.loader.preload(&paths) => loaded,
        };
        self.check_missing(&paths, &loaded)?;

        info!(
            events = schedule.len(),
            tempo_ms = tempo.as_millis(),
            total_ms = schedule.total().as_millis(),
            "Starting sequence"
        );

        let start = Instant::now();
        for (entry, path) in schedule.entries().iter().zip(&paths) {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                _ = sleep_until(start + entry.offset) => {}
            }
            if let Some(hook) = on_event.as_mut() {
                hook(entry);
            }
            self.trigger(entry, path, loaded.get(path.key()), profile, &mut report)?;
        }

        if !report.cancelled {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => report.cancelled = true,
                _ = sleep_until(start + schedule.total()) => {}
            }
        }
        report.elapsed = start.elapsed();

        info!(
            triggered = report.triggered,
            skipped = report.skipped,
            synthesized = report.synthesized,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis(),
            "Sequence finished"
        );
        Ok(report)
    }

    /// Fails under the abort policy if any sample is unavailable.
    fn check_missing(
        &self,
        paths: &[SamplePath],
        loaded: &HashMap<String, Result<LoadedSample, LoadError>>,
    ) -> Result<(), SequenceError> {
        let mut missing: Vec<&LoadError> = Vec::new();
        for path in paths {
            if let Some(Err(e)) = loaded.get(path.key()) {
                if !missing.contains(&e) {
                    missing.push(e);
                }
            }
        }

        match missing.first() {
            Some(first) => {
                warn!(
                    missing = missing.len(),
                    policy = %self.policy,
                    "Some samples are unavailable"
                );
                if self.policy == MissingSamplePolicy::Abort {
                    return Err(SequenceError::MissingSamples {
                        missing: missing.len(),
                        first: (*first).clone(),
                    });
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn trigger(
        &self,
        entry: &ScheduledEvent,
        path: &SamplePath,
        loaded: Option<&Result<LoadedSample, LoadError>>,
        profile: &InstrumentProfile,
        report: &mut SequenceReport,
    ) -> Result<(), SequenceError> {
        if let Some(Ok(sample)) = loaded {
            debug!(index = entry.index, sample = path.key(), "Triggering event");
            self.voices.play(path.key(), sample, 1.0)?;
            report.triggered += 1;
            return Ok(());
        }

        match self.policy {
            MissingSamplePolicy::Synthesize => {
                warn!(index = entry.index, sample = path.key(), "Playing synthesized stand-in");
                let sample = synth::synthesize(
                    &entry.event,
                    profile.default_dynamic(),
                    self.voices.output().sample_rate(),
                );
                self.voices
                    .play(&format!("synth:{}", path.key()), &sample, 1.0)?;
                report.triggered += 1;
                report.synthesized += 1;
            }
            MissingSamplePolicy::Skip | MissingSamplePolicy::Abort => {
                warn!(
                    index = entry.index,
                    sample = path.key(),
                    "Sample unavailable, leaving slot silent"
                );
                report.skipped += 1;
            }
        }
        Ok(())
    }
}
