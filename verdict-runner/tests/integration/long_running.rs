// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use futures::{FutureExt, future::BoxFuture};
use pretty_assertions::assert_eq;
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use verdict_metadata::{Event, LongRunningTestsSummary, NodeId, RunSummary};
use verdict_runner::{
    config::RunOptions,
    monitor::ManualClock,
    runner::{CollectionExecutor, RunnerBuilder, UnitContext},
    scheduler::ScheduleUnit,
    sink::CollectingSink,
};

/// Runs one slow test: the clock jumps ahead while the test runs, then the test waits long enough
/// in real time for the monitor to wake up at least once.
#[derive(Debug)]
struct SlowExecutor {
    clock: Arc<ManualClock>,
    clock_jump: Duration,
    real_wait: Duration,
}

impl CollectionExecutor for SlowExecutor {
    fn execute<'a>(&'a self, cx: UnitContext<'a>) -> BoxFuture<'a, RunSummary> {
        async move {
            let class = cx.path().class("Class");
            let (before, after, summary) = test_events(&class, "slow", Outcome::Pass);
            for event in before {
                cx.publish(event);
            }
            self.clock.advance(self.clock_jump);
            tokio::time::sleep(self.real_wait).await;
            for event in after {
                cx.publish(event);
            }
            summary
        }
        .boxed()
    }
}

fn run_slow_test(
    threshold_seconds: f64,
    clock_jump: Duration,
) -> Result<(Vec<Event>, Vec<LongRunningTestsSummary>)> {
    let clock = Arc::new(ManualClock::new());
    let executor = SlowExecutor {
        clock: clock.clone(),
        clock_jump,
        real_wait: Duration::from_millis(2500),
    };
    let plan = assembly_plan("asm", [ScheduleUnit::new("coll")]);

    let mut options = RunOptions::default();
    options.set_long_running_seconds(threshold_seconds);
    let reports = Arc::new(Mutex::new(Vec::new()));
    let mut builder = RunnerBuilder::default();
    builder
        .set_options(options)
        .set_clock(clock)
        .set_long_running_callback({
            let reports = reports.clone();
            move |summary| reports.lock().unwrap().push(summary.clone())
        });

    let reporter = CollectingSink::new();
    builder
        .build()?
        .execute(&[plan], &executor, reporter.clone())?;
    let reports = reports.lock().unwrap().clone();
    Ok((reporter.events(), reports))
}

fn long_running_diagnostics(events: &[Event]) -> Vec<&str> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Diagnostic { message } if message.starts_with("Long running test") => {
                Some(message.as_str())
            }
            _ => None,
        })
        .collect()
}

#[test]
fn slow_test_is_reported() -> Result<()> {
    test_init();

    let (events, reports) = run_slow_test(5.0, Duration::from_secs(10))?;

    let report = reports.first().expect("at least one report");
    assert_eq!(report.threshold, Duration::from_secs(5));
    assert_eq!(report.tests.len(), 1);
    assert_eq!(report.tests[0].test_id, NodeId::from("slow"));
    assert_eq!(report.tests[0].elapsed, Duration::from_secs(10));

    let diagnostics = long_running_diagnostics(&events);
    assert_eq!(diagnostics.len(), reports.len());
    assert_eq!(
        diagnostics[0],
        "Long running test: 'Test slow' (elapsed: 00:00:10)"
    );
    Ok(())
}

#[test]
fn fast_test_is_not_reported() -> Result<()> {
    test_init();

    let (events, reports) = run_slow_test(5.0, Duration::from_secs(4))?;
    assert!(reports.is_empty(), "unexpected reports: {reports:?}");
    assert!(long_running_diagnostics(&events).is_empty());
    Ok(())
}
