// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{policy, store::SummaryStore};
use crate::{errors::MalformedEventError, monitor::RunningTests, sink::EventSink};
use debug_ignore::DebugIgnore;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};
use verdict_metadata::{
    Event, ExecutionSummary, NodeId, NodeKey, NodeLevel, NodePath, RunSummary,
};

/// Called with an assembly's final summary, after its `AssemblyFinished` event has been forwarded.
pub type FinishedCallback = Box<dyn FnMut(&NodeId, &ExecutionSummary) + Send>;

/// Options for an [`ExecutionSink`].
#[derive(Debug, Default)]
pub struct ExecutionSinkBuilder {
    fail_skips: bool,
    fail_warns: bool,
    on_finished: Option<DebugIgnore<FinishedCallback>>,
    running: Option<Arc<RunningTests>>,
    summaries: Option<SummaryStore>,
}

impl ExecutionSinkBuilder {
    /// Reports skipped tests as failures.
    pub fn set_fail_skips(&mut self, fail_skips: bool) -> &mut Self {
        self.fail_skips = fail_skips;
        self
    }

    /// Reports passing tests that raised warnings as failures.
    pub fn set_fail_warns(&mut self, fail_warns: bool) -> &mut Self {
        self.fail_warns = fail_warns;
        self
    }

    /// Sets a callback invoked with each assembly's final summary.
    pub fn set_on_finished(
        &mut self,
        callback: impl FnMut(&NodeId, &ExecutionSummary) + Send + 'static,
    ) -> &mut Self {
        self.on_finished = Some(DebugIgnore(Box::new(callback)));
        self
    }

    /// Sets the in-flight test set to keep up to date.
    pub fn set_running_tests(&mut self, running: Arc<RunningTests>) -> &mut Self {
        self.running = Some(running);
        self
    }

    /// Sets the store that final summaries are written to.
    pub fn set_summary_store(&mut self, summaries: SummaryStore) -> &mut Self {
        self.summaries = Some(summaries);
        self
    }

    /// Creates the sink, forwarding to `downstream`.
    pub fn build<S: EventSink>(self, downstream: S) -> ExecutionSink<S> {
        ExecutionSink {
            downstream: DebugIgnore(downstream),
            fail_skips: self.fail_skips,
            fail_warns: self.fail_warns,
            on_finished: self.on_finished,
            running: self.running,
            summaries: self.summaries.unwrap_or_default(),
            nodes: HashMap::new(),
            assembly_errors: HashMap::new(),
        }
    }
}

/// Aggregates raw events into per-node rollups and per-assembly summaries.
///
/// The sink sits between a message bus and downstream reporters. It:
///
/// * applies the fail-skip and fail-warn policies to test results, forwarding one replacement
///   event per converted result;
/// * adjusts the counts on every `*Finished` event to match those conversions, clamping
///   impossible counts;
/// * checks each node's counts against the sum of its observed children, preferring the
///   children's sum when they disagree;
/// * counts catastrophic errors per assembly;
/// * finalizes each assembly's [`ExecutionSummary`] once its `AssemblyFinished` event has been
///   forwarded downstream.
///
/// Malformed events are dropped with a forwarded diagnostic.
#[derive_where::derive_where(Debug)]
pub struct ExecutionSink<S> {
    downstream: DebugIgnore<S>,
    fail_skips: bool,
    fail_warns: bool,
    on_finished: Option<DebugIgnore<FinishedCallback>>,
    running: Option<Arc<RunningTests>>,
    summaries: SummaryStore,
    nodes: HashMap<NodeKey, NodeState>,
    assembly_errors: HashMap<NodeId, usize>,
}

#[derive(Debug, Default)]
struct NodeState {
    // Sum of the emitted summaries of direct children that have finished.
    child_sum: Option<RunSummary>,
    // Passes under this node turned into failures by fail-warn.
    warn_converted: usize,
}

impl<S: EventSink> ExecutionSink<S> {
    /// Returns the store that final summaries are written to.
    pub fn summaries(&self) -> &SummaryStore {
        &self.summaries
    }

    /// Returns the downstream sink.
    pub fn downstream(&self) -> &S {
        &self.downstream
    }

    fn forward(&mut self, event: &Event) -> bool {
        self.downstream.on_event(event)
    }

    fn reject(&mut self, error: MalformedEventError) -> bool {
        warn!("{error}");
        self.forward(&Event::Diagnostic {
            message: format!("rejected event: {error}"),
        })
    }

    fn count_error(&mut self, assembly: Option<&NodeId>) {
        match assembly {
            Some(assembly) => {
                if !self.summaries.add_late_error(assembly) {
                    *self.assembly_errors.entry(assembly.clone()).or_default() += 1;
                }
            }
            None => self.summaries.add_unattributed_error(),
        }
    }

    fn on_finished(
        &mut self,
        event: &Event,
        level: NodeLevel,
        path: &NodePath,
        producer: RunSummary,
    ) -> bool {
        let Some(key) = path.key_at(level) else {
            // Unreachable for validated events.
            return self.forward(event);
        };
        let state = self.nodes.remove(&key).unwrap_or_default();

        let adjusted = policy::adjust(producer, self.fail_skips, state.warn_converted);
        let mut emitted = adjusted.clamped();
        if !emitted.same_counts(&adjusted) {
            warn!(
                %level,
                id = %key.id,
                ?adjusted,
                "clamping inconsistent counts on finished event",
            );
        }

        if let Some(child_sum) = state.child_sum {
            if !child_sum.same_counts(&emitted) {
                warn!(
                    %level,
                    id = %key.id,
                    reported = ?emitted,
                    children = ?child_sum,
                    "finished event disagrees with the sum of its children, using the children's counts",
                );
            }
            emitted = RunSummary {
                time_seconds: emitted.time_seconds,
                ..child_sum
            };
        }

        if let Some(parent) = level.parent().and_then(|parent| path.key_at(parent)) {
            let parent_state = self.nodes.entry(parent).or_default();
            parent_state.child_sum = Some(parent_state.child_sum.unwrap_or_default() + emitted);
        }

        if level == NodeLevel::Test {
            if let Some(running) = &self.running {
                running.remove(path);
            }
        }

        let keep_going = self.forward(&Event::finished(level, path.clone(), emitted));

        if level == NodeLevel::Assembly {
            self.finalize(path.assembly.clone(), emitted);
        }
        keep_going
    }

    fn finalize(&mut self, assembly: NodeId, summary: RunSummary) {
        let errors = self.assembly_errors.remove(&assembly).unwrap_or(0);
        let summary = ExecutionSummary::new(summary, errors);
        debug!(%assembly, ?summary, "assembly finished");

        self.summaries.insert(assembly.clone(), summary);
        if let Some(callback) = &mut self.on_finished {
            (callback.0)(&assembly, &summary);
        }
    }
}

impl<S: EventSink> EventSink for ExecutionSink<S> {
    fn on_event(&mut self, event: &Event) -> bool {
        if let Err(problem) = event.validate() {
            return self.reject(MalformedEventError::Invalid {
                kind: event.kind(),
                problem,
            });
        }

        if let Some((level, path, summary)) = event.as_finished() {
            return self.on_finished(event, level, path, *summary);
        }

        match event {
            Event::TestStarting { path, display_name } => {
                if let Some(running) = &self.running {
                    running.insert(path, display_name);
                }
                self.forward(event)
            }
            Event::TestSkipped {
                path,
                reason,
                warnings,
            } if self.fail_skips => {
                let failed = policy::fail_skip(path, reason, warnings.as_ref());
                self.forward(&failed)
            }
            Event::TestPassed {
                path,
                time_seconds,
                output,
                warnings: Some(warnings),
            } if self.fail_warns && !warnings.is_empty() => {
                for key in path.keys() {
                    self.nodes.entry(key).or_default().warn_converted += 1;
                }
                let failed = policy::fail_warn(path, *time_seconds, output, warnings);
                self.forward(&failed)
            }
            Event::Error { assembly, .. } => {
                self.count_error(assembly.as_ref());
                self.forward(event)
            }
            Event::CleanupFailure { path, .. } => {
                self.count_error(Some(&path.assembly));
                self.forward(event)
            }
            _ => self.forward(event),
        }
    }
}
