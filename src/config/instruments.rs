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
use serde::Deserialize;

use crate::instrument::Dynamic;

/// Per-instrument changes to the built-in profile. Unset fields keep the default.
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct InstrumentOverride {
    /// Asset directory, relative to the asset root.
    path: Option<String>,

    /// Default technique suffix.
    technique: Option<String>,

    /// Dynamic used when an event doesn't specify one.
    default_dynamic: Option<Dynamic>,
}

impl InstrumentOverride {
    pub fn new(
        path: Option<String>,
        technique: Option<String>,
        default_dynamic: Option<Dynamic>,
    ) -> InstrumentOverride {
        InstrumentOverride {
            path,
            technique,
            default_dynamic,
        }
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn technique(&self) -> Option<&str> {
        self.technique.as_deref()
    }

    pub fn default_dynamic(&self) -> Option<Dynamic> {
        self.default_dynamic
    }
}
