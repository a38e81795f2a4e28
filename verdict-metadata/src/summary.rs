// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{NodeId, VerdictExitCode};
use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{
    ops::{Add, AddAssign},
    time::Duration,
};

/// Test counts carried by a `*Finished` event, at any level of the hierarchy.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
#[cfg_attr(
    any(test, feature = "proptest1"),
    derive(test_strategy::Arbitrary)
)]
pub struct RunSummary {
    /// The number of tests that were part of this node.
    #[cfg_attr(any(test, feature = "proptest1"), strategy(0..1000usize))]
    pub total: usize,

    /// The number of tests that failed.
    #[cfg_attr(any(test, feature = "proptest1"), strategy(0..1000usize))]
    pub failed: usize,

    /// The number of tests that were skipped.
    #[cfg_attr(any(test, feature = "proptest1"), strategy(0..1000usize))]
    pub skipped: usize,

    /// The number of tests that were not run, for example because of an explicit filter.
    #[cfg_attr(any(test, feature = "proptest1"), strategy(0..1000usize))]
    pub not_run: usize,

    /// The time spent executing this node, in seconds.
    #[cfg_attr(any(test, feature = "proptest1"), strategy(0.0..3600.0f64))]
    pub time_seconds: f64,
}

impl RunSummary {
    /// Creates a new summary with the given counts and no execution time.
    pub fn new(total: usize, failed: usize, skipped: usize, not_run: usize) -> Self {
        Self {
            total,
            failed,
            skipped,
            not_run,
            time_seconds: 0.0,
        }
    }

    /// Sets the execution time, in seconds.
    pub fn with_time(mut self, time_seconds: f64) -> Self {
        self.time_seconds = time_seconds;
        self
    }

    /// Returns the number of tests that passed.
    pub fn passed(&self) -> usize {
        self.total.saturating_sub(self.outcomes())
    }

    // Saturates rather than overflowing for counts read off the wire.
    fn outcomes(&self) -> usize {
        self.failed
            .saturating_add(self.skipped)
            .saturating_add(self.not_run)
    }

    /// Returns true if `failed + skipped + not_run <= total`.
    pub fn is_consistent(&self) -> bool {
        self.failed
            .checked_add(self.skipped)
            .and_then(|sum| sum.checked_add(self.not_run))
            .is_some_and(|sum| sum <= self.total)
    }

    /// Returns true if the counts (ignoring execution time) are the same.
    pub fn same_counts(&self, other: &Self) -> bool {
        self.total == other.total
            && self.failed == other.failed
            && self.skipped == other.skipped
            && self.not_run == other.not_run
    }

    /// Returns a consistent version of this summary.
    ///
    /// Excess counts are taken away from `not_run` first, then `skipped`, then `failed`. A
    /// negative or non-finite execution time becomes zero.
    pub fn clamped(self) -> Self {
        // Same as taking the excess from not_run, then skipped, then failed.
        let mut remaining = self.total;
        let mut give = |count: usize| {
            let given = count.min(remaining);
            remaining -= given;
            given
        };
        let failed = give(self.failed);
        let skipped = give(self.skipped);
        let not_run = give(self.not_run);

        Self {
            total: self.total,
            failed,
            skipped,
            not_run,
            time_seconds: if self.time_seconds.is_finite() && self.time_seconds > 0.0 {
                self.time_seconds
            } else {
                0.0
            },
        }
    }
}

impl Add for RunSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            total: self.total.saturating_add(rhs.total),
            failed: self.failed.saturating_add(rhs.failed),
            skipped: self.skipped.saturating_add(rhs.skipped),
            not_run: self.not_run.saturating_add(rhs.not_run),
            time_seconds: self.time_seconds + rhs.time_seconds,
        }
    }
}

impl AddAssign for RunSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// The final summary of a test assembly, or of a whole run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExecutionSummary {
    /// The number of tests that were part of the assembly.
    pub total: usize,

    /// The number of tests that failed, after fail-skip and fail-warn conversion.
    pub failed: usize,

    /// The number of tests that were skipped.
    pub skipped: usize,

    /// The number of tests that were not run.
    pub not_run: usize,

    /// The time spent executing the assembly, in seconds.
    pub time_seconds: f64,

    /// The number of catastrophic errors (errors not tied to a test) observed.
    pub errors: usize,
}

impl ExecutionSummary {
    /// Creates a new execution summary from test counts and an error count.
    pub fn new(summary: RunSummary, errors: usize) -> Self {
        Self {
            total: summary.total,
            failed: summary.failed,
            skipped: summary.skipped,
            not_run: summary.not_run,
            time_seconds: summary.time_seconds,
            errors,
        }
    }

    /// Returns the number of tests that passed.
    pub fn passed(&self) -> usize {
        self.run_summary().passed()
    }

    /// Returns the test counts without the error count.
    pub fn run_summary(&self) -> RunSummary {
        RunSummary {
            total: self.total,
            failed: self.failed,
            skipped: self.skipped,
            not_run: self.not_run,
            time_seconds: self.time_seconds,
        }
    }
}

impl AddAssign for ExecutionSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.total = self.total.saturating_add(rhs.total);
        self.failed = self.failed.saturating_add(rhs.failed);
        self.skipped = self.skipped.saturating_add(rhs.skipped);
        self.not_run = self.not_run.saturating_add(rhs.not_run);
        self.time_seconds += rhs.time_seconds;
        self.errors = self.errors.saturating_add(rhs.errors);
    }
}

/// The totals for an entire run, across all assemblies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunTotals {
    /// Per-assembly summaries, in the order the assemblies finished.
    pub assemblies: IndexMap<NodeId, ExecutionSummary>,

    /// The sum of all assembly summaries, plus errors that were not attributed to an assembly.
    ///
    /// `time_seconds` is the sum of per-assembly execution times. For the wall-clock duration of
    /// the run, use [`Self::elapsed`].
    pub aggregate: ExecutionSummary,

    /// The time at which the run started.
    pub start_time: DateTime<FixedOffset>,

    /// The wall-clock time the whole run took.
    pub elapsed: Duration,

    /// True if the run was cancelled before every assembly finished.
    pub cancelled: bool,
}

impl RunTotals {
    /// Computes run totals from per-assembly summaries.
    pub fn new(
        assemblies: IndexMap<NodeId, ExecutionSummary>,
        unattributed_errors: usize,
        start_time: DateTime<FixedOffset>,
        elapsed: Duration,
        cancelled: bool,
    ) -> Self {
        let mut aggregate = ExecutionSummary {
            errors: unattributed_errors,
            ..Default::default()
        };
        for summary in assemblies.values() {
            aggregate += *summary;
        }

        Self {
            assemblies,
            aggregate,
            start_time,
            elapsed,
            cancelled,
        }
    }

    /// Returns the exit code a driver should use for this run.
    pub fn exit_code(&self) -> i32 {
        if self.cancelled {
            VerdictExitCode::RUN_CANCELLED
        } else if self.aggregate.failed > 0 || self.aggregate.errors > 0 {
            VerdictExitCode::TEST_RUN_FAILED
        } else if self.aggregate.total == 0 {
            VerdictExitCode::NO_TESTS_RUN
        } else {
            VerdictExitCode::OK
        }
    }

    /// Returns true if the run completed, ran at least one test, and had no failures or errors.
    pub fn is_success(&self) -> bool {
        self.exit_code() == VerdictExitCode::OK
    }
}

/// A report of tests that have been running for longer than a threshold.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LongRunningTestsSummary {
    /// The configured threshold.
    pub threshold: Duration,

    /// The tests that have been running for at least `threshold`.
    pub tests: Vec<LongRunningTest>,
}

/// A single entry in a [`LongRunningTestsSummary`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LongRunningTest {
    /// The test's identifier.
    pub test_id: NodeId,

    /// The test's display name.
    pub display_name: String,

    /// How long the test has been running for.
    pub elapsed: Duration,
}
