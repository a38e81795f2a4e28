// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::clock::Clock;
use indexmap::IndexMap;
use std::{
    sync::{Arc, Mutex, PoisonError},
    time::{Duration, Instant},
};
use verdict_metadata::{LongRunningTest, NodeId, NodePath};

/// A test that has started but not yet finished.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunningTestRecord {
    /// The test's identifier.
    pub test_id: NodeId,

    /// The test's display name.
    pub display_name: String,

    /// When the test started, according to the set's clock.
    pub started_at: Instant,
}

/// The set of tests currently in flight.
///
/// Written by the execution sink as it observes `TestStarting` and `TestFinished` events, and read
/// concurrently by the long-running monitor. Entries are keyed by the test's full path.
#[derive(Debug)]
pub struct RunningTests {
    clock: Arc<dyn Clock>,
    tests: Mutex<IndexMap<NodePath, RunningTestRecord>>,
}

impl RunningTests {
    /// Creates a new, empty set that timestamps entries with the given clock.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tests: Mutex::new(IndexMap::new()),
        }
    }

    /// Returns the clock used to timestamp entries.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Records a test as started now.
    pub(crate) fn insert(&self, path: &NodePath, display_name: &str) {
        let Some(test_id) = path.test.clone() else {
            return;
        };
        let record = RunningTestRecord {
            test_id,
            display_name: display_name.to_owned(),
            started_at: self.clock.now(),
        };
        self.lock().insert(path.clone(), record);
    }

    /// Removes a test, returning its record if it was running.
    pub(crate) fn remove(&self, path: &NodePath) -> Option<RunningTestRecord> {
        self.lock().shift_remove(path)
    }

    /// Returns the number of tests currently running.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if no tests are running.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a copy of the currently running tests, in the order they started.
    pub fn snapshot(&self) -> Vec<RunningTestRecord> {
        self.lock().values().cloned().collect()
    }

    /// Returns every test that has been running for at least `threshold` as of `now`.
    pub fn exceeding(&self, now: Instant, threshold: Duration) -> Vec<LongRunningTest> {
        self.lock()
            .values()
            .filter_map(|record| {
                let elapsed = now.saturating_duration_since(record.started_at);
                (elapsed >= threshold).then(|| LongRunningTest {
                    test_id: record.test_id.clone(),
                    display_name: record.display_name.clone(),
                    elapsed,
                })
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, IndexMap<NodePath, RunningTestRecord>> {
        self.tests.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
