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

//! Sample playback.
//!
//! This module provides:
//! - Event to sample filename resolution
//! - Sample fetching, decoding and caching (in-memory, de-duplicated loads)
//! - Batched preloading with timeouts
//! - A synthesized fallback for samples that can't be loaded
//! - Voice management so playback can be stopped globally

pub mod batch;
pub mod decode;
mod error;
pub mod fetch;
mod loader;
pub mod resolver;
pub mod synth;
mod voice;

pub use batch::{BatchLoader, BatchReport};
pub use decode::{SampleDecoder, SymphoniaDecoder};
pub use error::{DecodeError, FetchError, LoadError};
pub use fetch::{FileFetcher, SampleFetcher};
pub use loader::{LoadedSample, SampleLoader};
pub use resolver::{Resolver, SamplePath};
pub use voice::{Voice, VoiceId, VoiceManager, VoiceSource};
