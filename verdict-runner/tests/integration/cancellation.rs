// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use pretty_assertions::assert_eq;
use std::{num::NonZeroUsize, thread, time::Duration};
use verdict_metadata::{Event, NodeId, VerdictExitCode};
use verdict_runner::{
    config::{MaxParallelThreads, RunOptions},
    runner::RunnerBuilder,
    scheduler::ScheduleUnit,
    sink::{CollectingSink, EventSink},
};

fn single_slot() -> RunOptions {
    let mut options = RunOptions::default();
    options.set_max_parallel_threads(MaxParallelThreads::Count(NonZeroUsize::MIN));
    options
}

#[test]
fn reporter_can_stop_the_run() -> Result<()> {
    test_init();

    let mut executor = ScriptedExecutor::new(Duration::from_millis(10));
    executor
        .add("a", [("fails", Outcome::Fail), ("after", Outcome::Pass)])
        .add("b", [("one", Outcome::Pass)])
        .add("c", [("one", Outcome::Pass)]);
    let plans = [
        assembly_plan(
            "first",
            [
                ScheduleUnit::new("a"),
                ScheduleUnit::sequential("b"),
                ScheduleUnit::sequential("c"),
            ],
        ),
        assembly_plan("second", [ScheduleUnit::new("b")]),
    ];

    let collected = CollectingSink::new();
    let reporter = {
        let mut collected = collected.clone();
        move |event: &Event| {
            collected.on_event(event);
            !matches!(event, Event::TestFailed { .. })
        }
    };

    let mut builder = RunnerBuilder::default();
    builder.set_options(single_slot());
    let totals = builder.build()?.execute(&plans, &executor, reporter)?;

    assert!(totals.cancelled);
    assert_eq!(totals.exit_code(), VerdictExitCode::RUN_CANCELLED);

    // The collection that was running winds down and its assembly still finishes.
    let first = totals.assemblies[&NodeId::from("first")];
    assert_eq!((first.total, first.failed, first.not_run), (2, 1, 1));
    assert!(!totals.assemblies.contains_key(&NodeId::from("second")));

    let ran: Vec<NodeId> = executor
        .activity
        .windows()
        .into_iter()
        .map(|window| window.collection)
        .collect();
    assert_eq!(ran, [NodeId::from("a")]);

    let events = collected.events();
    assert_eq!(
        count_where(&events, |event| matches!(event, Event::AssemblyStarting { .. })),
        1
    );
    assert!(matches!(
        events.last(),
        Some(Event::AssemblyFinished { .. })
    ));
    Ok(())
}

#[test]
fn cancelled_before_start() -> Result<()> {
    test_init();

    let mut executor = ScriptedExecutor::new(Duration::ZERO);
    executor.add("a", [("one", Outcome::Pass)]);
    let plan = assembly_plan("asm", [ScheduleUnit::new("a")]);

    let runner = RunnerBuilder::default().build()?;
    assert!(runner.cancellation().cancel());
    let reporter = CollectingSink::new();
    let totals = runner.execute(&[plan], &executor, reporter.clone())?;

    assert!(reporter.is_empty());
    assert!(totals.assemblies.is_empty());
    assert_eq!(totals.exit_code(), VerdictExitCode::RUN_CANCELLED);
    Ok(())
}

#[test]
fn cancellation_stops_admission() -> Result<()> {
    test_init();

    let tests = [
        ("one", Outcome::Pass),
        ("two", Outcome::Pass),
        ("three", Outcome::Pass),
    ];
    let mut executor = ScriptedExecutor::new(Duration::from_millis(50));
    executor
        .add("a", tests)
        .add("b", tests)
        .add("c", tests);
    let plan = assembly_plan("asm", ["a", "b", "c"].into_iter().map(ScheduleUnit::new));

    let mut builder = RunnerBuilder::default();
    builder.set_options(single_slot());
    let runner = builder.build()?;

    let cancel = runner.cancellation().clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        cancel.cancel();
    });
    let totals = runner.execute(&[plan], &executor, CollectingSink::new())?;
    canceller.join().expect("canceller thread panicked");

    assert_eq!(
        executor.activity.windows().len(),
        1,
        "only the admitted collection ran"
    );
    assert!(totals.cancelled);
    let summary = totals.assemblies[0];
    assert_eq!(summary.total, 3);
    assert!(summary.not_run >= 1, "tests after cancellation are not run");
    Ok(())
}
