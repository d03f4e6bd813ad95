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

//! Sample loading and caching.
//!
//! Samples are decoded entirely into memory and kept until the cache is cleared.
//! Concurrent requests for the same sample share a single fetch and decode.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{join_all, BoxFuture, Shared};
use futures_util::FutureExt;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::decode::SampleDecoder;
use super::error::LoadError;
use super::fetch::SampleFetcher;
use super::resolver::SamplePath;

/// A decoded sample that can be played back.
/// The sample data is stored in an Arc so voices share it without copying.
#[derive(Clone)]
pub struct LoadedSample {
    /// The sample data as f32 samples (interleaved if multi-channel).
    data: Arc<Vec<f32>>,
    /// Number of channels in the sample.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl LoadedSample {
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Self {
        Self {
            data: Arc::new(data),
            channel_count: channel_count.max(1),
            sample_rate,
        }
    }

    /// The interleaved sample data.
    pub fn data(&self) -> &Arc<Vec<f32>> {
        &self.data
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames, i.e. samples per channel.
    pub fn frames(&self) -> usize {
        self.data.len() / self.channel_count as usize
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

impl std::fmt::Debug for LoadedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSample")
            .field("channel_count", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

type SharedLoad = Shared<BoxFuture<'static, Result<LoadedSample, LoadError>>>;

#[derive(Default)]
struct LoaderState {
    /// Decoded samples by key.
    cache: HashMap<String, LoadedSample>,
    /// Loads that have started but not finished, by key.
    in_flight: HashMap<String, SharedLoad>,
    /// Bumped by every clear. Loads started before a clear don't write back.
    generation: u64,
}

/// Manages loading and caching of sample data.
///
/// Cloning a loader gives another handle to the same cache.
#[derive(Clone)]
pub struct SampleLoader {
    fetcher: Arc<dyn SampleFetcher>,
    decoder: Arc<dyn SampleDecoder>,
    state: Arc<Mutex<LoaderState>>,
}

impl SampleLoader {
    /// Creates a new sample loader.
    pub fn new(fetcher: Arc<dyn SampleFetcher>, decoder: Arc<dyn SampleDecoder>) -> Self {
        Self {
            fetcher,
            decoder,
            state: Arc::new(Mutex::new(LoaderState::default())),
        }
    }

    /// Loads a sample into memory.
    /// Returns the cached version if already loaded and joins a pending load if
    /// one is in progress.
    pub async fn load(&self, path: &SamplePath) -> Result<LoadedSample, LoadError> {
        let load = {
            let mut state = self.state.lock();
            if let Some(sample) = state.cache.get(path.key()) {
                debug!(key = path.key(), "Using cached sample");
                return Ok(sample.clone());
            }

            match state.in_flight.get(path.key()) {
                Some(load) => {
                    debug!(key = path.key(), "Joining in-flight load");
                    load.clone()
                }
                None => {
                    // The spawned task needs this lock to finish, so registering it
                    // here always happens before it deregisters itself.
                    let load = self.spawn_load(path.clone(), state.generation);
                    state
                        .in_flight
                        .insert(path.key().to_string(), load.clone());
                    load
                }
            }
        };

        load.await
    }

    /// Starts the fetch and decode on its own task. The task runs to completion
    /// even if every caller stops waiting, so a slow sample still ends up cached.
    fn spawn_load(&self, path: SamplePath, generation: u64) -> SharedLoad {
        let fetcher = self.fetcher.clone();
        let decoder = self.decoder.clone();
        let state = self.state.clone();
        let key = path.key().to_string();
        let asset_path = path.asset_path().to_string();

        let handle = tokio::spawn(async move {
            let result = fetch_and_decode(fetcher.as_ref(), decoder.as_ref(), &path).await;

            if let Err(e) = &result {
                warn!(path = %path, err = %e, "Failed to load sample");
            }

            let mut state = state.lock();
            if state.generation != generation {
                debug!(path = %path, "Cache was cleared during load, dropping result");
                return result;
            }
            state.in_flight.remove(path.key());
            if let Ok(sample) = &result {
                state.cache.insert(path.key().to_string(), sample.clone());
            }
            result
        });

        let state = self.state.clone();
        async move {
            match handle.await {
                Ok(result) => result,
                Err(e) => {
                    let mut state = state.lock();
                    if state.generation == generation {
                        state.in_flight.remove(&key);
                    }
                    Err(LoadError::Aborted {
                        path: asset_path,
                        reason: e.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// Loads every distinct path concurrently. Results are keyed by sample key.
    pub async fn preload(
        &self,
        paths: &[SamplePath],
    ) -> HashMap<String, Result<LoadedSample, LoadError>> {
        let mut distinct: Vec<&SamplePath> = Vec::with_capacity(paths.len());
        for path in paths {
            if !distinct.iter().any(|p| p.key() == path.key()) {
                distinct.push(path);
            }
        }

        let results = join_all(distinct.iter().map(|path| self.load(path))).await;
        distinct
            .into_iter()
            .map(|path| path.key().to_string())
            .zip(results)
            .collect()
    }

    pub fn is_cached(&self, path: &SamplePath) -> bool {
        self.state.lock().cache.contains_key(path.key())
    }

    pub fn cached_count(&self) -> usize {
        self.state.lock().cache.len()
    }

    /// Number of loads currently in progress.
    pub fn in_flight_count(&self) -> usize {
        self.state.lock().in_flight.len()
    }

    /// Returns the total memory used by cached samples.
    pub fn total_memory_usage(&self) -> usize {
        self.state
            .lock()
            .cache
            .values()
            .map(|s| s.memory_size())
            .sum()
    }

    /// Drops every cached sample and forgets loads in progress. Their waiters
    /// still get a result, but it isn't cached.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        info!(
            samples = state.cache.len(),
            in_flight = state.in_flight.len(),
            "Clearing sample cache"
        );
        state.cache.clear();
        state.in_flight.clear();
        state.generation += 1;
    }
}

async fn fetch_and_decode(
    fetcher: &dyn SampleFetcher,
    decoder: &dyn SampleDecoder,
    path: &SamplePath,
) -> Result<LoadedSample, LoadError> {
    info!(path = %path, "Loading sample into memory");

    let bytes = fetcher
        .fetch(path.asset_path())
        .await
        .map_err(|e| LoadError::Fetch {
            path: path.asset_path().to_string(),
            reason: e.to_string(),
        })?;

    let sample = decoder
        .decode(bytes, path.extension())
        .await
        .map_err(|e| LoadError::Decode {
            path: path.asset_path().to_string(),
            reason: e.to_string(),
        })?;

    info!(
        path = %path,
        channels = sample.channel_count(),
        sample_rate = sample.sample_rate(),
        duration_ms = sample.duration().as_millis(),
        memory_kb = sample.memory_size() / 1024,
        "Sample loaded"
    );

    Ok(sample)
}

impl std::fmt::Debug for SampleLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SampleLoader")
            .field("cached_samples", &state.cache.len())
            .field("in_flight", &state.in_flight.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::instrument::{DurationClass, Instrument, InstrumentTable, Note, PitchClass};
    use crate::samples::resolver::Resolver;
    use crate::testutil::{MemoryDecoder, MemoryFetcher};

    fn path_for(pitch: PitchClass) -> SamplePath {
        let table = InstrumentTable::default();
        Resolver::default().resolve(
            table.profile(Instrument::Violin),
            &Note::new(pitch, 4, DurationClass::Quarter).unwrap().into(),
        )
    }

    fn loader_with(fetcher: &Arc<MemoryFetcher>) -> SampleLoader {
        SampleLoader::new(fetcher.clone(), Arc::new(MemoryDecoder::default()))
    }

    #[tokio::test]
    async fn test_load_caches() {
        let path = path_for(PitchClass::C);
        let fetcher = Arc::new(MemoryFetcher::default());
        fetcher.insert(path.asset_path(), vec![1, 2, 3, 4]);
        let loader = loader_with(&fetcher);

        let first = loader.load(&path).await.unwrap();
        let second = loader.load(&path).await.unwrap();

        assert_eq!(first.frames(), 4);
        assert!(Arc::ptr_eq(first.data(), second.data()));
        assert_eq!(fetcher.fetch_count(path.asset_path()), 1);
        assert!(loader.is_cached(&path));
        assert_eq!(loader.cached_count(), 1);
        assert_eq!(loader.total_memory_usage(), 4 * std::mem::size_of::<f32>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_loads_share_one_fetch() {
        let path = path_for(PitchClass::E);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(50)));
        fetcher.insert(path.asset_path(), vec![9; 16]);
        let loader = loader_with(&fetcher);

        let (a, b, c) = tokio::join!(loader.load(&path), loader.load(&path), loader.load(&path));

        let a = a.unwrap();
        assert!(Arc::ptr_eq(a.data(), b.unwrap().data()));
        assert!(Arc::ptr_eq(a.data(), c.unwrap().data()));
        assert_eq!(fetcher.fetch_count(path.asset_path()), 1);
        assert_eq!(loader.in_flight_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_different_keys_load_in_parallel() {
        let c = path_for(PitchClass::C);
        let g = path_for(PitchClass::G);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(100)));
        fetcher.insert(c.asset_path(), vec![1; 8]);
        fetcher.insert(g.asset_path(), vec![2; 8]);
        let loader = loader_with(&fetcher);

        let start = tokio::time::Instant::now();
        let (rc, rg) = tokio::join!(loader.load(&c), loader.load(&g));
        assert!(rc.is_ok());
        assert!(rg.is_ok());
        // Sequential loads would take twice the fetch delay.
        assert!(start.elapsed() < Duration::from_millis(150));
        assert_eq!(loader.cached_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_load_is_not_cached_and_retries() {
        let path = path_for(PitchClass::A);
        let fetcher = Arc::new(MemoryFetcher::default());
        let loader = loader_with(&fetcher);

        let err = loader.load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Fetch { .. }));
        assert_eq!(err.path(), path.asset_path());
        assert!(!loader.is_cached(&path));
        assert_eq!(loader.in_flight_count(), 0);

        // Once the asset shows up, the next request fetches again.
        fetcher.insert(path.asset_path(), vec![1, 2]);
        assert!(loader.load(&path).await.is_ok());
        assert_eq!(fetcher.fetch_count(path.asset_path()), 2);
    }

    #[tokio::test]
    async fn test_decode_failure() {
        let path = path_for(PitchClass::B);
        let fetcher = Arc::new(MemoryFetcher::default());
        fetcher.insert(path.asset_path(), MemoryDecoder::CORRUPT.to_vec());
        let loader = loader_with(&fetcher);

        let err = loader.load(&path).await.unwrap_err();
        assert!(matches!(err, LoadError::Decode { .. }));
        assert_eq!(loader.cached_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_waiters_see_failure() {
        let path = path_for(PitchClass::D);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(20)));
        let loader = loader_with(&fetcher);

        let (a, b) = tokio::join!(loader.load(&path), loader.load(&path));
        assert_eq!(a.unwrap_err(), b.unwrap_err());
        assert_eq!(fetcher.fetch_count(path.asset_path()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_waiter_still_caches() {
        let path = path_for(PitchClass::F);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(200)));
        fetcher.insert(path.asset_path(), vec![3; 4]);
        let loader = loader_with(&fetcher);

        let timed_out = tokio::time::timeout(Duration::from_millis(10), loader.load(&path)).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(loader.is_cached(&path));
        assert_eq!(fetcher.fetch_count(path.asset_path()), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_discards_loads_in_flight() {
        let path = path_for(PitchClass::Gs);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(200)));
        fetcher.insert(path.asset_path(), vec![5; 4]);
        let loader = loader_with(&fetcher);

        let timed_out = tokio::time::timeout(Duration::from_millis(10), loader.load(&path)).await;
        assert!(timed_out.is_err());
        assert_eq!(loader.in_flight_count(), 1);

        loader.clear();
        assert_eq!(loader.in_flight_count(), 0);

        // The old load finishes after the clear and must not repopulate the cache.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!loader.is_cached(&path));
        assert_eq!(loader.cached_count(), 0);

        // A fresh request starts a new load, which is cached as usual.
        assert!(loader.load(&path).await.is_ok());
        assert!(loader.is_cached(&path));
        assert_eq!(fetcher.fetch_count(path.asset_path()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_across_clear_gets_result() {
        let path = path_for(PitchClass::As);
        let fetcher = Arc::new(MemoryFetcher::default().with_delay(Duration::from_millis(100)));
        fetcher.insert(path.asset_path(), vec![7; 6]);
        let loader = loader_with(&fetcher);

        let (result, ()) = tokio::join!(loader.load(&path), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            loader.clear();
        });
        assert_eq!(result.unwrap().frames(), 6);
        assert_eq!(loader.cached_count(), 0);
    }

    #[tokio::test]
    async fn test_preload_dedups_and_clear() {
        let c = path_for(PitchClass::C);
        let e = path_for(PitchClass::E);
        let fetcher = Arc::new(MemoryFetcher::default());
        fetcher.insert(c.asset_path(), vec![1; 2]);
        let loader = loader_with(&fetcher);

        let results = loader.preload(&[c.clone(), e.clone(), c.clone()]).await;
        assert_eq!(results.len(), 2);
        assert!(results[c.key()].is_ok());
        assert!(results[e.key()].is_err());
        assert_eq!(fetcher.fetch_count(c.asset_path()), 1);

        loader.clear();
        assert_eq!(loader.cached_count(), 0);
        assert!(!loader.is_cached(&c));
    }
}
