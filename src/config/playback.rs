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
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a sequence does with an event whose sample couldn't be loaded.
#[derive(Deserialize, Clone, Copy, Serialize, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MissingSamplePolicy {
    /// Fail the whole sequence before anything plays.
    Abort,
    /// Leave the event's time slot silent.
    #[default]
    Skip,
    /// Play a synthesized approximation in the event's time slot.
    Synthesize,
}

impl FromStr for MissingSamplePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "abort" => Ok(MissingSamplePolicy::Abort),
            "skip" => Ok(MissingSamplePolicy::Skip),
            "synthesize" => Ok(MissingSamplePolicy::Synthesize),
            _ => Err(format!("unknown missing sample policy '{}'", s)),
        }
    }
}

impl fmt::Display for MissingSamplePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MissingSamplePolicy::Abort => "abort",
            MissingSamplePolicy::Skip => "skip",
            MissingSamplePolicy::Synthesize => "synthesize",
        })
    }
}
