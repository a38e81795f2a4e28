// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use verdict_metadata::{ExecutionSummary, NodeId, RunTotals};

/// Finalized assembly summaries, shared between an execution sink and its owner.
///
/// Clones share the same storage.
#[derive(Clone, Debug, Default)]
pub struct SummaryStore {
    inner: Arc<Mutex<SummaryStoreInner>>,
}

#[derive(Debug, Default)]
struct SummaryStoreInner {
    assemblies: IndexMap<NodeId, ExecutionSummary>,
    unattributed_errors: usize,
}

impl SummaryStore {
    /// Creates a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the finalized summary for an assembly.
    pub fn get(&self, assembly: &NodeId) -> Option<ExecutionSummary> {
        self.lock().assemblies.get(assembly).copied()
    }

    /// Returns every finalized summary, in the order the assemblies finished.
    pub fn assemblies(&self) -> IndexMap<NodeId, ExecutionSummary> {
        self.lock().assemblies.clone()
    }

    /// Returns the number of errors that weren't attributed to any assembly.
    pub fn unattributed_errors(&self) -> usize {
        self.lock().unattributed_errors
    }

    /// Computes run totals from the summaries stored so far.
    pub fn to_totals(
        &self,
        start_time: DateTime<FixedOffset>,
        elapsed: Duration,
        cancelled: bool,
    ) -> RunTotals {
        let inner = self.lock();
        RunTotals::new(
            inner.assemblies.clone(),
            inner.unattributed_errors,
            start_time,
            elapsed,
            cancelled,
        )
    }

    pub(super) fn insert(&self, assembly: NodeId, summary: ExecutionSummary) {
        self.lock().assemblies.insert(assembly, summary);
    }

    /// Adds an error to an already-finalized assembly. Returns false if the assembly hasn't been
    /// finalized.
    pub(super) fn add_late_error(&self, assembly: &NodeId) -> bool {
        match self.lock().assemblies.get_mut(assembly) {
            Some(summary) => {
                summary.errors += 1;
                true
            }
            None => false,
        }
    }

    pub(super) fn add_unattributed_error(&self) {
        self.lock().unattributed_errors += 1;
    }

    fn lock(&self) -> MutexGuard<'_, SummaryStoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
