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

//! Bulk preloading in fixed-size batches with a per-sample timeout.

use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use super::error::LoadError;
use super::loader::SampleLoader;
use super::resolver::SamplePath;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SAMPLE_TIMEOUT: Duration = Duration::from_millis(800);

/// Outcome of a batch preload. Entries hold sample keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub loaded: Vec<String>,
    pub failed: Vec<String>,
    pub timed_out: Vec<String>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.loaded.len() + self.failed.len() + self.timed_out.len()
    }

    /// True if every requested sample made it into the cache.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.timed_out.is_empty()
    }
}

/// Preloads samples a batch at a time so a large request doesn't open every
/// fetch at once.
#[derive(Debug, Clone)]
pub struct BatchLoader {
    batch_size: usize,
    sample_timeout: Duration,
}

impl BatchLoader {
    pub fn new(batch_size: usize, sample_timeout: Duration) -> Self {
        Self {
            batch_size: batch_size.max(1),
            sample_timeout,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn sample_timeout(&self) -> Duration {
        self.sample_timeout
    }

    /// Loads every path, one batch after the other. A sample that misses the
    /// timeout is reported as timed out but its load keeps going in the
    /// background. `progress` is called with `(completed, total)` after each batch.
    pub async fn load_all<F>(
        &self,
        loader: &SampleLoader,
        paths: &[SamplePath],
        mut progress: F,
    ) -> BatchReport
    where
        F: FnMut(usize, usize),
    {
        let mut report = BatchReport::default();
        let total = paths.len();
        if total == 0 {
            return report;
        }

        info!(
            total,
            batch_size = self.batch_size,
            timeout_ms = self.sample_timeout.as_millis(),
            "Preloading samples"
        );

        let mut completed = 0;
        for batch in paths.chunks(self.batch_size) {
            let results = join_all(batch.iter().map(|path| async move {
                match tokio::time::timeout(self.sample_timeout, loader.load(path)).await {
                    Ok(result) => result.map(|_| ()),
                    Err(_) => Err(LoadError::Timeout {
                        path: path.asset_path().to_string(),
                        timeout: self.sample_timeout,
                    }),
                }
            }))
            .await;

            for (path, result) in batch.iter().zip(results) {
                let key = path.key().to_string();
                match result {
                    Ok(()) => report.loaded.push(key),
                    Err(LoadError::Timeout { .. }) => {
                        warn!(path = %path, "Sample load timed out");
                        report.timed_out.push(key);
                    }
                    Err(e) => {
                        warn!(path = %path, err = %e, "Sample failed to load");
                        report.failed.push(key);
                    }
                }
            }

            completed += batch.len();
            progress(completed, total);
        }

        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            timed_out = report.timed_out.len(),
            "Preload finished"
        );
        report
    }
}

impl Default for BatchLoader {
    fn default() -> Self {
        BatchLoader::new(DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_TIMEOUT)
    }
}
