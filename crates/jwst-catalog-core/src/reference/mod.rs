//! Suffix reference tables.
//!
//! The [`SuffixReference`] trait is the read-only lookup the resolver
//! queries: `(stage table, suffix) -> entry`. How the tables are stored is
//! the caller's business; [`memory::MemoryReference`] is the in-memory
//! implementation the application loads SQLite or TOML tables into.
//!
//! Implementations must be `Send + Sync` so a single loaded reference can
//! be shared read-only between workers.

pub mod memory;

use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// One named stage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageTable {
    /// Stage 1 detector processing.
    Detector1,
    /// Stage 2 imaging.
    Image2,
    /// Stage 2 spectroscopy.
    Spec2,
    /// Stage 3 imaging.
    Image3,
    /// Stage 3 spectroscopy.
    Spec3,
    /// Stage 3 time series.
    Tso3,
    /// Stage 3 aperture-masking interferometry.
    Ami3,
    /// Stage 3 coronagraphy.
    Coron3,
}

impl StageTable {
    pub const ALL: [StageTable; 8] = [
        StageTable::Detector1,
        StageTable::Image2,
        StageTable::Spec2,
        StageTable::Image3,
        StageTable::Spec3,
        StageTable::Tso3,
        StageTable::Ami3,
        StageTable::Coron3,
    ];

    /// Table name as used in reference databases.
    pub fn name(self) -> &'static str {
        match self {
            StageTable::Detector1 => "detector1",
            StageTable::Image2 => "image2",
            StageTable::Spec2 => "spec2",
            StageTable::Image3 => "image3",
            StageTable::Spec3 => "spec3",
            StageTable::Tso3 => "tso3",
            StageTable::Ami3 => "ami3",
            StageTable::Coron3 => "coron3",
        }
    }
}

impl fmt::Display for StageTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StageTable {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match StageTable::ALL.iter().find(|t| t.name() == s) {
            Some(table) => Ok(*table),
            None => bail!(
                "Unknown stage table: '{}'. Must be one of detector1, image2, spec2, image3, spec3, tso3, ami3, coron3.",
                s
            ),
        }
    }
}

/// One reference row: `(suffix, description, units, level)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixEntry {
    pub suffix: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
}

/// Read-only `(stage table, suffix)` lookup.
pub trait SuffixReference: Send + Sync {
    /// The row for `suffix` in `table`, if any. When a table holds several
    /// rows for one suffix, the first is returned.
    fn lookup(&self, table: StageTable, suffix: &str) -> Option<&SuffixEntry>;
}
