// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use std::{num::NonZeroUsize, time::Duration};
use verdict_metadata::{Event, NodeId, VerdictExitCode};
use verdict_runner::{
    config::{MaxParallelThreads, ParallelAlgorithm, RunOptions},
    runner::RunnerBuilder,
    scheduler::ScheduleUnit,
    sink::CollectingSink,
};

const TEST_DELAY: Duration = Duration::from_millis(40);

fn options(algorithm: ParallelAlgorithm, threads: usize) -> RunOptions {
    let mut options = RunOptions::default();
    options
        .set_parallel_algorithm(algorithm)
        .set_max_parallel_threads(MaxParallelThreads::Count(
            NonZeroUsize::new(threads).expect("threads is non-zero"),
        ));
    options
}

fn passing_executor(collections: &[&str]) -> ScriptedExecutor {
    let mut executor = ScriptedExecutor::new(TEST_DELAY);
    for collection in collections {
        executor.add(collection, [("one", Outcome::Pass), ("two", Outcome::Pass)]);
    }
    executor
}

#[test]
fn conservative_honors_limit_and_flags() -> Result<()> {
    test_init();

    let executor = passing_executor(&["a", "b", "c", "d", "e"]);
    let plan = assembly_plan(
        "asm",
        [
            ScheduleUnit::new("a"),
            ScheduleUnit::sequential("b"),
            ScheduleUnit::new("c"),
            ScheduleUnit::sequential("d"),
            ScheduleUnit::sequential("e"),
        ],
    );

    let mut builder = RunnerBuilder::default();
    builder.set_options(options(ParallelAlgorithm::Conservative, 2));
    let runner = builder.build()?;
    let reporter = CollectingSink::new();
    let totals = runner.execute(&[plan], &executor, reporter.clone())?;

    ensure!(
        executor.activity.max_active() <= 2,
        "at most 2 collections active at once (actual: {})",
        executor.activity.max_active()
    );

    let windows = executor.activity.windows();
    assert_eq!(windows.len(), 5);
    let flagged: Vec<NodeId> = ["b", "d", "e"].into_iter().map(NodeId::from).collect();
    for window in windows.iter().filter(|w| flagged.contains(&w.collection)) {
        for other in windows.iter().filter(|w| w.collection != window.collection) {
            ensure!(
                !window.overlaps(other),
                "flagged collection {} overlapped with {}",
                window.collection,
                other.collection
            );
        }
    }

    // Flagged collections run after the others, in submission order.
    let order: Vec<String> = reporter
        .events()
        .iter()
        .filter_map(|event| match event {
            Event::CollectionStarting { name, .. } => Some(name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(&order[2..], ["b", "d", "e"]);

    assert_eq!(totals.aggregate.total, 10);
    assert_eq!(totals.aggregate.failed, 0);
    assert_eq!(totals.exit_code(), VerdictExitCode::OK);
    Ok(())
}

#[test]
fn conservative_single_slot_is_sequential() -> Result<()> {
    test_init();

    let executor = passing_executor(&["a", "b", "c"]);
    let plan = assembly_plan(
        "asm",
        ["a", "b", "c"].into_iter().map(ScheduleUnit::new),
    );

    let mut builder = RunnerBuilder::default();
    builder.set_options(options(ParallelAlgorithm::Conservative, 1));
    let totals = builder
        .build()?
        .execute(&[plan], &executor, CollectingSink::new())?;

    assert_eq!(executor.activity.max_active(), 1);
    assert_eq!(totals.aggregate.total, 6);
    Ok(())
}

#[test]
fn aggressive_interleaves_on_one_worker() -> Result<()> {
    test_init();

    let executor = passing_executor(&["a", "b", "c"]);
    let plan = assembly_plan(
        "asm",
        ["a", "b", "c"].into_iter().map(ScheduleUnit::new),
    );

    let mut builder = RunnerBuilder::default();
    builder.set_options(options(ParallelAlgorithm::Aggressive, 1));
    let runner = builder.build()?;
    assert_eq!(runner.worker_threads(), 1);
    let totals = runner.execute(&[plan], &executor, CollectingSink::new())?;

    ensure!(
        executor.activity.max_active() > 1,
        "collections interleave at await points (max active: {})",
        executor.activity.max_active()
    );
    assert_eq!(totals.aggregate.total, 6);
    Ok(())
}

#[test]
fn run_level_disable_runs_in_order() -> Result<()> {
    test_init();

    let executor = passing_executor(&["a", "b", "c"]);
    let plan = assembly_plan(
        "asm",
        ["a", "b", "c"].into_iter().map(ScheduleUnit::new),
    );

    let mut options = options(ParallelAlgorithm::Conservative, 8);
    options.set_disable_parallelization(true);
    let mut builder = RunnerBuilder::default();
    builder.set_options(options);
    let runner = builder.build()?;
    assert_eq!(runner.scheduler().to_string(), "non-parallel");
    runner.execute(&[plan], &executor, CollectingSink::new())?;

    assert_eq!(executor.activity.max_active(), 1);
    let order: Vec<NodeId> = executor
        .activity
        .windows()
        .into_iter()
        .map(|window| window.collection)
        .collect();
    assert_eq!(order, ["a", "b", "c"].map(NodeId::from));
    Ok(())
}

#[test]
fn assemblies_are_summarized_separately() -> Result<()> {
    test_init();

    let mut executor = ScriptedExecutor::new(Duration::ZERO);
    executor
        .add("a", [("one", Outcome::Pass), ("two", Outcome::Fail)])
        .add("b", [("one", Outcome::Skip)]);
    let plans = [
        assembly_plan("first", [ScheduleUnit::new("a")]),
        assembly_plan("second", [ScheduleUnit::new("b")]),
    ];

    let reporter = CollectingSink::new();
    let totals = RunnerBuilder::default()
        .build()?
        .execute(&plans, &executor, reporter.clone())?;

    let first = totals.assemblies[&NodeId::from("first")];
    assert_eq!((first.total, first.failed, first.skipped), (2, 1, 0));
    let second = totals.assemblies[&NodeId::from("second")];
    assert_eq!((second.total, second.failed, second.skipped), (1, 0, 1));
    assert_eq!(totals.aggregate.total, 3);
    assert_eq!(totals.exit_code(), VerdictExitCode::TEST_RUN_FAILED);
    assert!(!totals.cancelled);

    let events = reporter.events();
    assert_eq!(
        count_where(&events, |event| matches!(event, Event::AssemblyFinished { .. })),
        2
    );
    assert!(
        matches!(events.last(), Some(Event::AssemblyFinished { path, .. }) if path.assembly.as_str() == "second"),
        "the last event is the last assembly finishing"
    );
    Ok(())
}
