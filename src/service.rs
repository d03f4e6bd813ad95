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

//! The sample service: one loader, one voice manager and one output, with an
//! explicit lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::audio::{Gain, Output, OutputError};
use crate::config::{ConfigError, Ensemble, MissingSamplePolicy};
use crate::instrument::{Instrument, InstrumentTable, SoundEvent};
use crate::playsync::CancelHandle;
use crate::samples::{
    synth, BatchLoader, BatchReport, FileFetcher, LoadError, Resolver, SampleDecoder,
    SampleFetcher, SampleLoader, SamplePath, SymphoniaDecoder, VoiceId, VoiceManager,
};
use crate::sequencer::{EventHook, SequenceError, SequenceReport, Sequencer};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("the sample service has been disposed")]
    Disposed,

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error(transparent)]
    Sequence(#[from] SequenceError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct SampleService {
    loader: SampleLoader,
    voices: Arc<VoiceManager>,
    resolver: Resolver,
    table: Arc<InstrumentTable>,
    sequencer: Sequencer,
    batch: BatchLoader,
    tempo: Duration,
    policy: MissingSamplePolicy,
    disposed: AtomicBool,
    /// Cancelled by `dispose` to halt sequences that are still running.
    shutdown: CancelHandle,
}

impl SampleService {
    /// Builds a service from the configuration and the given host capabilities.
    pub fn init(
        config: &Ensemble,
        output: Arc<dyn Output>,
        fetcher: Arc<dyn SampleFetcher>,
        decoder: Arc<dyn SampleDecoder>,
    ) -> Result<SampleService, ServiceError> {
        let tempo = config.tempo()?;
        let batch = config.batch();
        let batch = BatchLoader::new(batch.size(), batch.sample_timeout()?);
        let policy = config.missing_sample();

        let loader = SampleLoader::new(fetcher, decoder);
        let voices = Arc::new(VoiceManager::new(output, Gain::new(config.volume())));
        let resolver = Resolver::new(config.extension());
        let table = Arc::new(InstrumentTable::with_overrides(&config.instruments()));
        let sequencer = Sequencer::new(
            loader.clone(),
            voices.clone(),
            resolver.clone(),
            table.clone(),
            policy,
        );

        info!(
            output = %voices.output(),
            tempo_ms = tempo.as_millis(),
            volume = voices.master_gain().get(),
            missing_sample = %policy,
            "Sample service ready"
        );

        Ok(SampleService {
            loader,
            voices,
            resolver,
            table,
            sequencer,
            batch,
            tempo,
            policy,
            disposed: AtomicBool::new(false),
            shutdown: CancelHandle::new(),
        })
    }

    /// Builds a service that reads samples from the configured asset root and
    /// decodes them with symphonia at the output's sample rate.
    pub fn from_config(
        config: &Ensemble,
        output: Arc<dyn Output>,
    ) -> Result<SampleService, ServiceError> {
        let fetcher = Arc::new(FileFetcher::new(config.assets()));
        let decoder = Arc::new(SymphoniaDecoder::new(output.sample_rate()));
        Self::init(config, output, fetcher, decoder)
    }

    fn check(&self) -> Result<(), ServiceError> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(ServiceError::Disposed);
        }
        Ok(())
    }

    /// Sets the master volume, clamped to 0..=1. Applies to sounding voices too.
    pub fn set_volume(&self, volume: f32) -> Result<f32, ServiceError> {
        self.check()?;
        Ok(self.voices.master_gain().set(volume))
    }

    pub fn volume(&self) -> f32 {
        self.voices.master_gain().get()
    }

    /// The sample path an event resolves to for an instrument.
    pub fn resolve(&self, instrument: Instrument, event: &SoundEvent) -> SamplePath {
        self.resolver.resolve(self.table.profile(instrument), event)
    }

    /// Loads and plays a single event right away.
    /// Under the synthesize policy a missing sample plays its stand-in instead
    /// of failing.
    pub async fn play_sound(
        &self,
        instrument: Instrument,
        event: &SoundEvent,
    ) -> Result<VoiceId, ServiceError> {
        self.check()?;
        let path = self.resolve(instrument, event);
        let loaded = self.loader.load(&path).await;
        // The service may have been disposed while the sample was loading.
        self.check()?;
        match loaded {
            Ok(sample) => Ok(self.voices.play(path.key(), &sample, 1.0)?),
            Err(e) if self.policy == MissingSamplePolicy::Synthesize => {
                warn!(path = %path, err = %e, "Playing synthesized stand-in");
                let sample = synth::synthesize(
                    event,
                    self.table.profile(instrument).default_dynamic(),
                    self.voices.output().sample_rate(),
                );
                Ok(self
                    .voices
                    .play(&format!("synth:{}", path.key()), &sample, 1.0)?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Plays a sequence. Without a tempo the configured one is used. The
    /// sequence stops early if `cancel` is cancelled or the service is disposed.
    /// `on_event` is called with each event as it comes due.
    pub async fn play_sequence(
        &self,
        instrument: Instrument,
        events: &[SoundEvent],
        tempo: Option<Duration>,
        cancel: Option<&CancelHandle>,
        on_event: Option<&mut EventHook<'_>>,
    ) -> Result<SequenceReport, ServiceError> {
        self.check()?;
        let run = CancelHandle::new();
        let play = self.sequencer.play(
            instrument,
            events,
            tempo.unwrap_or(self.tempo),
            &run,
            on_event,
        );
        tokio::pin!(play);

        let report = tokio::select! {
            biased;
            _ = self.halted(cancel) => {
                run.cancel();
                play.await
            }
            report = &mut play => report,
        };
        Ok(report?)
    }

    /// Resolves once the caller cancels or the service is disposed.
    async fn halted(&self, cancel: Option<&CancelHandle>) {
        match cancel {
            Some(cancel) => tokio::select! {
                _ = cancel.cancelled() => {}
                _ = self.shutdown.cancelled() => {}
            },
            None => self.shutdown.cancelled().await,
        }
    }

    /// Loads every sample the events need. Fails with the first error, in event
    /// order. Returns the number of distinct samples.
    pub async fn preload_instrument(
        &self,
        instrument: Instrument,
        events: &[SoundEvent],
    ) -> Result<usize, ServiceError> {
        self.check()?;
        let paths: Vec<SamplePath> = events
            .iter()
            .map(|event| self.resolve(instrument, event))
            .collect();
        let results = self.loader.preload(&paths).await;

        for path in &paths {
            if let Some(Err(e)) = results.get(path.key()) {
                return Err(e.clone().into());
            }
        }
        Ok(results.len())
    }

    /// Preloads many samples through the batch loader.
    pub async fn preload_batch<F>(
        &self,
        requests: &[(Instrument, SoundEvent)],
        progress: F,
    ) -> Result<BatchReport, ServiceError>
    where
        F: FnMut(usize, usize),
    {
        self.check()?;
        let paths: Vec<SamplePath> = requests
            .iter()
            .map(|(instrument, event)| self.resolve(*instrument, event))
            .collect();
        Ok(self.batch.load_all(&self.loader, &paths, progress).await)
    }

    /// Stops every sounding voice. Returns how many were stopped.
    pub fn stop(&self) -> Result<usize, ServiceError> {
        self.check()?;
        Ok(self.voices.stop_all())
    }

    /// Stops everything and drops the cache. Running sequences stop at their
    /// next wait and loads still in flight aren't cached. Every later call fails
    /// with `Disposed`. Disposing twice is harmless.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shutdown.cancel();
        let stopped = self.voices.stop_all();
        self.loader.clear();
        info!(stopped, "Sample service disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn loader(&self) -> &SampleLoader {
        &self.loader
    }

    pub fn voices(&self) -> &Arc<VoiceManager> {
        &self.voices
    }

    pub fn tempo(&self) -> Duration {
        self.tempo
    }
}

impl std::fmt::Debug for SampleService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleService")
            .field("loader", &self.loader)
            .field("voices", &self.voices)
            .field("tempo", &self.tempo)
            .field("policy", &self.policy)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
