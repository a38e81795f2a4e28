// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decides which test collections may run at the same time.

use crate::config::{AdmissionLimit, MaxParallelThreads, ParallelAlgorithm, RunOptions};
use std::{fmt, num::NonZeroUsize};
use verdict_metadata::NodeId;

/// A test collection: the unit of parallel dispatch.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ScheduleUnit {
    /// The collection's identifier.
    pub collection_id: NodeId,

    /// If true, this collection never runs at the same time as any other collection.
    pub disable_parallelization: bool,
}

impl ScheduleUnit {
    /// Creates a new unit that may run in parallel with others.
    pub fn new(collection_id: impl Into<NodeId>) -> Self {
        Self {
            collection_id: collection_id.into(),
            disable_parallelization: false,
        }
    }

    /// Creates a new unit that must run on its own.
    pub fn sequential(collection_id: impl Into<NodeId>) -> Self {
        Self {
            collection_id: collection_id.into(),
            disable_parallelization: true,
        }
    }
}

/// Units partitioned by how they will run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchedulePlan {
    /// Units that may run concurrently with each other. Run first.
    pub parallel: Vec<ScheduleUnit>,

    /// Units that run one at a time, in submission order, after every parallel unit has finished.
    pub sequential: Vec<ScheduleUnit>,
}

/// Parallel scheduling policy for a run.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParallelScheduler {
    disable_parallelization: bool,
    max_parallel_threads: MaxParallelThreads,
    algorithm: ParallelAlgorithm,
}

impl ParallelScheduler {
    /// Creates a new scheduler.
    pub fn new(
        disable_parallelization: bool,
        max_parallel_threads: MaxParallelThreads,
        algorithm: ParallelAlgorithm,
    ) -> Self {
        Self {
            disable_parallelization,
            max_parallel_threads,
            algorithm,
        }
    }

    /// Creates a scheduler from run options.
    pub fn from_options(options: &RunOptions) -> Self {
        Self::new(
            options.disable_parallelization(),
            options.max_parallel_threads(),
            options.parallel_algorithm(),
        )
    }

    /// Returns true if the two units may run at the same time.
    ///
    /// A unit never runs concurrently with itself.
    pub fn can_run_concurrently(&self, a: &ScheduleUnit, b: &ScheduleUnit) -> bool {
        !self.disable_parallelization
            && !a.disable_parallelization
            && !b.disable_parallelization
            && a.collection_id != b.collection_id
    }

    /// Returns the configured admission limit: 0 means the number of logical CPUs, negative
    /// means unbounded.
    pub fn admission_limit(&self) -> isize {
        self.max_parallel_threads.admission_limit()
    }

    /// Returns the number of units that may actually run at once, taking run-level
    /// `disable_parallelization` into account.
    pub fn effective_limit(&self) -> AdmissionLimit {
        if self.disable_parallelization {
            AdmissionLimit::Bounded(NonZeroUsize::MIN)
        } else {
            self.max_parallel_threads.compute()
        }
    }

    /// Returns the parallel algorithm.
    pub fn algorithm(&self) -> ParallelAlgorithm {
        self.algorithm
    }

    /// Returns true if parallelization is disabled for the whole run.
    pub fn is_sequential(&self) -> bool {
        self.disable_parallelization
    }

    /// Partitions units into a parallel phase and a trailing sequential phase.
    pub fn plan(&self, units: impl IntoIterator<Item = ScheduleUnit>) -> SchedulePlan {
        let (sequential, parallel): (Vec<_>, Vec<_>) = units
            .into_iter()
            .partition(|unit| self.disable_parallelization || unit.disable_parallelization);
        SchedulePlan {
            parallel,
            sequential,
        }
    }
}

impl fmt::Display for ParallelScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.disable_parallelization {
            return write!(f, "non-parallel");
        }
        match (self.effective_limit(), self.algorithm) {
            (limit @ AdmissionLimit::Bounded(_), ParallelAlgorithm::Aggressive) => {
                write!(f, "parallel ({limit}/aggressive)")
            }
            (limit, _) => write!(f, "parallel ({limit})"),
        }
    }
}
