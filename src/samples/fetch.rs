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
use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tracing::debug;

use super::error::FetchError;

/// Retrieves the raw bytes of a sample asset.
pub trait SampleFetcher: Send + Sync + 'static {
    /// Fetches the asset at the given path, relative to wherever this fetcher reads from.
    fn fetch(&self, asset_path: &str) -> BoxFuture<'static, Result<Vec<u8>, FetchError>>;
}

/// Reads sample assets from a directory on disk.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// The on-disk location of an asset path.
    pub fn full_path(&self, asset_path: &str) -> PathBuf {
        self.root.join(asset_path.trim_start_matches('/'))
    }
}

impl SampleFetcher for FileFetcher {
    fn fetch(&self, asset_path: &str) -> BoxFuture<'static, Result<Vec<u8>, FetchError>> {
        let path = self.full_path(asset_path);
        async move {
            debug!(path = ?path, "Reading sample file");
            tokio::fs::read(&path).await.map_err(|e| {
                FetchError::Io(std::io::Error::new(
                    e.kind(),
                    format!("{}: {}", path.display(), e),
                ))
            })
        }
        .boxed()
    }
}
