// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ParallelAlgorithmParseError;
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// How test collections are admitted when running in parallel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParallelAlgorithm {
    /// Each running collection holds one of a fixed number of slots for its entire lifetime.
    ///
    /// Wall-clock occupancy of each collection is directly observable, so timeouts and
    /// long-running detection are accurate.
    #[default]
    Conservative,

    /// Collections are started eagerly and share a fixed number of worker threads.
    ///
    /// This maximizes throughput, but collections interleave on the workers, so the wall-clock
    /// time of an individual test includes time spent waiting for other tests. Timeouts and
    /// long-running detection are unreliable under this algorithm.
    Aggressive,
}

impl ParallelAlgorithm {
    /// Returns string representations of all known variants.
    pub fn variants() -> &'static [&'static str] {
        &["conservative", "aggressive"]
    }

    fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Aggressive => "aggressive",
        }
    }
}

impl FromStr for ParallelAlgorithm {
    type Err = ParallelAlgorithmParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "conservative" => Ok(Self::Conservative),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(ParallelAlgorithmParseError::new(other)),
        }
    }
}

impl fmt::Display for ParallelAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
