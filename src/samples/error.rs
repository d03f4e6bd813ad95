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
use std::time::Duration;

/// Error types for sample loading.
///
/// One load result is shared by every caller waiting on it, so this is `Clone`
/// and carries messages rather than source errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to fetch {path}: {reason}")]
    Fetch { path: String, reason: String },

    #[error("failed to decode {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("timed out after {timeout:?} loading {path}")]
    Timeout { path: String, timeout: Duration },

    #[error("load of {path} was aborted: {reason}")]
    Aborted { path: String, reason: String },
}

impl LoadError {
    /// The asset path the error refers to.
    pub fn path(&self) -> &str {
        match self {
            LoadError::Fetch { path, .. }
            | LoadError::Decode { path, .. }
            | LoadError::Timeout { path, .. }
            | LoadError::Aborted { path, .. } => path,
        }
    }
}

/// Failure reported by a fetcher, before it's tied to a sample path.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Failure reported by a decoder, before it's tied to a sample path.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("{0}")]
    Unsupported(String),

    #[error("decoder task failed: {0}")]
    Task(String),
}
