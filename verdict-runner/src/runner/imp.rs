// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{AssemblyPlan, CollectionExecutor, UnitContext};
use crate::{
    aggregator::{ExecutionSinkBuilder, SummaryStore},
    bus::MessageBus,
    cancel::CancellationToken,
    config::{AdmissionLimit, ParallelAlgorithm, RunOptions},
    errors::{RunExecuteError, RunnerBuildError},
    monitor::{
        Clock, LongRunningCallback, LongRunningMonitor, RunningTests, SystemClock,
        long_running_message,
    },
    scheduler::{ParallelScheduler, ScheduleUnit},
    sink::EventSink,
    time::stopwatch,
};
use async_scoped::TokioScope;
use debug_ignore::DebugIgnore;
use std::sync::Arc;
use tokio::{runtime::Runtime, sync::Semaphore, task::JoinError};
use tracing::debug;
use verdict_metadata::{Event, LongRunningTestsSummary, NodePath, RunSummary, RunTotals};

/// Runner options.
#[derive(Debug, Default)]
pub struct RunnerBuilder {
    options: RunOptions,
    long_running: Option<DebugIgnore<LongRunningCallback>>,
    clock: Option<Arc<dyn Clock>>,
}

impl RunnerBuilder {
    /// Sets the run options.
    pub fn set_options(&mut self, options: RunOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Sets a callback invoked with each long-running test report.
    ///
    /// Reports are also published to the run's reporter as diagnostics, whether or not a callback
    /// is set. Nothing is reported unless the options set a long-running threshold.
    pub fn set_long_running_callback(
        &mut self,
        callback: impl FnMut(&LongRunningTestsSummary) + Send + 'static,
    ) -> &mut Self {
        self.long_running = Some(DebugIgnore(Box::new(callback)));
        self
    }

    /// Sets the clock used to time running tests. Defaults to the system clock.
    pub fn set_clock(&mut self, clock: Arc<dyn Clock>) -> &mut Self {
        self.clock = Some(clock);
        self
    }

    /// Creates a new runner.
    pub fn build(self) -> Result<Runner, RunnerBuildError> {
        let scheduler = ParallelScheduler::from_options(&self.options);

        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.enable_all().thread_name("verdict-runner-worker");
        // Aggressive scheduling admits everything and lets the worker count bound concurrency.
        if let (ParallelAlgorithm::Aggressive, AdmissionLimit::Bounded(limit)) =
            (scheduler.algorithm(), scheduler.effective_limit())
        {
            builder.worker_threads(limit.get());
        }
        let runtime = builder
            .build()
            .map_err(RunnerBuildError::TokioRuntimeCreate)?;
        debug!(%scheduler, "runner built");

        Ok(Runner {
            options: self.options,
            scheduler,
            long_running: self.long_running,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            cancel: CancellationToken::new(),
            runtime,
        })
    }
}

/// Context for a single run.
///
/// Created using [`RunnerBuilder::build`].
#[derive(Debug)]
pub struct Runner {
    options: RunOptions,
    scheduler: ParallelScheduler,
    long_running: Option<DebugIgnore<LongRunningCallback>>,
    clock: Arc<dyn Clock>,
    cancel: CancellationToken,
    runtime: Runtime,
}

impl Runner {
    /// Returns the scheduler derived from the run options.
    pub fn scheduler(&self) -> &ParallelScheduler {
        &self.scheduler
    }

    /// Returns the run's cancellation token.
    ///
    /// Cancelling it stops the runner from admitting collections. Collections that are already
    /// running are expected to wind down on their own.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns the number of worker threads in the runner's runtime.
    pub fn worker_threads(&self) -> usize {
        self.runtime.metrics().num_workers()
    }

    /// Runs each assembly in turn, sending aggregated events to `reporter`.
    ///
    /// Returns the run's totals. A cancelled run still returns the totals of the assemblies that
    /// finished. Returns an error if any collection task panicked, or if the long-running monitor
    /// failed to start or to shut down.
    pub fn execute<E, S>(
        self,
        assemblies: &[AssemblyPlan],
        executor: &E,
        reporter: S,
    ) -> Result<RunTotals, RunExecuteError>
    where
        E: CollectionExecutor + ?Sized,
        S: EventSink + 'static,
    {
        let Runner {
            options,
            scheduler,
            long_running,
            clock,
            cancel,
            runtime,
        } = self;
        let run_stopwatch = stopwatch();

        let summaries = SummaryStore::new();
        let threshold = options.long_running_threshold();
        let running = threshold.map(|_| Arc::new(RunningTests::new(clock)));

        let mut sink_builder = ExecutionSinkBuilder::default();
        sink_builder
            .set_fail_skips(options.fail_skips())
            .set_fail_warns(options.fail_warns())
            .set_summary_store(summaries.clone());
        if let Some(running) = &running {
            sink_builder.set_running_tests(running.clone());
        }
        let sink = sink_builder.build(reporter);

        let expected = assemblies.len();
        let mut finished = 0;
        let bus = Arc::new(MessageBus::with_terminal(
            sink,
            cancel.clone(),
            Box::new(move |event| {
                if let Event::AssemblyFinished { .. } = event {
                    finished += 1;
                    finished == expected
                } else {
                    false
                }
            }),
        ));

        let monitor = match (threshold, running) {
            (Some(threshold), Some(running)) => {
                if scheduler.algorithm() == ParallelAlgorithm::Aggressive {
                    debug!("long-running detection is approximate under aggressive scheduling");
                }
                let callback = long_running_callback(bus.clone(), long_running);
                Some(LongRunningMonitor::start(
                    threshold,
                    running,
                    cancel.clone(),
                    callback,
                )?)
            }
            _ => None,
        };

        let mut join_errors = Vec::new();
        {
            let _guard = runtime.enter();
            let admission = match (scheduler.algorithm(), scheduler.effective_limit()) {
                (ParallelAlgorithm::Conservative, AdmissionLimit::Bounded(limit)) => {
                    Some(Semaphore::new(limit.get()))
                }
                _ => None,
            };
            let cx = RunContext {
                scheduler: &scheduler,
                executor,
                bus: &bus,
                admission: admission.as_ref(),
            };

            for assembly in assemblies {
                if cancel.is_cancelled() {
                    debug!(assembly = %assembly.id, "run cancelled, not starting assembly");
                    break;
                }
                cx.run_assembly(assembly, &mut join_errors);
            }
        }

        if !bus.is_finished() {
            debug!("not every assembly finished, disposing message bus");
            bus.dispose();
        }
        bus.gate().wait();

        let shutdown = match monitor {
            Some(monitor) => monitor.shutdown(),
            None => Ok(()),
        };
        runtime.shutdown_background();
        shutdown?;

        if !join_errors.is_empty() {
            return Err(RunExecuteError::Join(join_errors));
        }

        let snapshot = run_stopwatch.snapshot();
        let totals = summaries.to_totals(
            snapshot.start_time,
            snapshot.duration,
            cancel.is_cancelled(),
        );
        debug!(
            exit_code = totals.exit_code(),
            elapsed = ?snapshot.duration,
            "run finished",
        );
        Ok(totals)
    }
}

fn long_running_callback(
    bus: Arc<MessageBus>,
    mut user_callback: Option<DebugIgnore<LongRunningCallback>>,
) -> LongRunningCallback {
    Box::new(move |summary| {
        for test in &summary.tests {
            bus.publish(Event::Diagnostic {
                message: long_running_message(test),
            });
        }
        if let Some(callback) = &mut user_callback {
            (callback.0)(summary);
        }
    })
}

struct RunContext<'a, E: ?Sized> {
    scheduler: &'a ParallelScheduler,
    executor: &'a E,
    bus: &'a MessageBus,
    // Set for the conservative algorithm with a bounded limit.
    admission: Option<&'a Semaphore>,
}

impl<E: CollectionExecutor + ?Sized> RunContext<'_, E> {
    fn run_assembly(&self, assembly: &AssemblyPlan, join_errors: &mut Vec<JoinError>) {
        let assembly_stopwatch = stopwatch();
        let path = NodePath::assembly(assembly.id.clone());
        self.bus.publish(Event::AssemblyStarting {
            path: path.clone(),
            name: assembly.name.clone(),
        });

        let plan = self.scheduler.plan(assembly.units.iter().cloned());
        debug!(
            assembly = %assembly.id,
            parallel = plan.parallel.len(),
            sequential = plan.sequential.len(),
            "running assembly",
        );

        let mut summary = self.run_units(assembly, &plan.parallel, join_errors);
        for unit in &plan.sequential {
            if self.bus.cancellation().is_cancelled() {
                break;
            }
            summary += self.run_units(assembly, std::slice::from_ref(unit), join_errors);
        }

        let elapsed = assembly_stopwatch.snapshot().duration;
        self.bus.publish(Event::AssemblyFinished {
            path,
            summary: summary.with_time(elapsed.as_secs_f64()),
        });
    }

    /// Runs units concurrently, subject to the admission limit, and sums their counts.
    fn run_units(
        &self,
        assembly: &AssemblyPlan,
        units: &[ScheduleUnit],
        join_errors: &mut Vec<JoinError>,
    ) -> RunSummary {
        if units.is_empty() {
            return RunSummary::default();
        }

        let ((), results) = TokioScope::scope_and_block(|scope| {
            for unit in units {
                let cx = UnitContext::new(assembly, unit, self.bus);
                let executor = self.executor;
                let admission = self.admission;

                scope.spawn(async move {
                    let cancel = cx.cancellation();
                    let _permit = match admission {
                        Some(semaphore) => tokio::select! {
                            permit = semaphore.acquire() => match permit {
                                Ok(permit) => Some(permit),
                                // The semaphore is never closed.
                                Err(_) => return RunSummary::default(),
                            },
                            () = cancel.cancelled() => return RunSummary::default(),
                        },
                        None => None,
                    };
                    if cancel.is_cancelled() {
                        debug!(
                            collection = %unit.collection_id,
                            "run cancelled, not starting collection",
                        );
                        return RunSummary::default();
                    }

                    debug!(collection = %unit.collection_id, "running collection");
                    executor.execute(cx).await
                });
            }
        });

        let mut summary = RunSummary::default();
        for result in results {
            match result {
                Ok(unit_summary) => summary += unit_summary,
                Err(error) => join_errors.push(error),
            }
        }
        summary
    }
}
