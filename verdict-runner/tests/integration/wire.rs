// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use futures::{FutureExt, future::BoxFuture};
use maplit::hashmap;
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use verdict_metadata::{Event, NodeId, RunSummary, VerdictExitCode};
use verdict_runner::{
    config::RunOptions,
    runner::{CollectionExecutor, RunnerBuilder, UnitContext},
    scheduler::ScheduleUnit,
    sink::CollectingSink,
    wire::{EventReader, EventWriter},
};

/// An executor whose collections run "out of process": each collection's events are written to a
/// byte stream, then read back into the run's bus.
#[derive(Debug)]
struct StreamingExecutor {
    scripts: HashMap<NodeId, Vec<(&'static str, Outcome)>>,
}

impl CollectionExecutor for StreamingExecutor {
    fn execute<'a>(&'a self, cx: UnitContext<'a>) -> BoxFuture<'a, RunSummary> {
        async move {
            let script = self
                .scripts
                .get(&cx.unit().collection_id)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let (events, summary) = collection_events(&cx.path(), script);

            let mut writer = EventWriter::new(Vec::new());
            for event in &events {
                writer.write_event(event).expect("writing to a Vec succeeds");
            }
            let mut bytes = writer.into_inner();
            bytes.extend_from_slice(b"this line is not an event\n");

            let read = EventReader::new(bytes.as_slice())
                .publish_to(cx.bus())
                .expect("reading from a slice succeeds");
            assert_eq!(read.accepted, events.len());
            assert_eq!(read.rejected, 1);
            summary
        }
        .boxed()
    }
}

#[test]
fn events_survive_the_stream() -> Result<()> {
    test_init();

    let executor = StreamingExecutor {
        scripts: hashmap! {
            "a".into() => vec![("one", Outcome::Pass), ("two", Outcome::Skip)],
            "b".into() => vec![("one", Outcome::PassWithWarning)],
        },
    };
    let plan = assembly_plan("asm", [ScheduleUnit::new("a"), ScheduleUnit::new("b")]);

    let mut builder = RunnerBuilder::default();
    builder.set_options(RunOptions::from_toml_str("fail-warns = true")?);
    let reporter = CollectingSink::new();
    let totals = builder.build()?.execute(&[plan], &executor, reporter.clone())?;

    let summary = totals.assemblies[&NodeId::from("asm")];
    assert_eq!(
        (summary.total, summary.failed, summary.skipped, summary.errors),
        (3, 1, 1, 0)
    );
    assert_eq!(totals.exit_code(), VerdictExitCode::TEST_RUN_FAILED);

    let events = reporter.events();
    assert_eq!(
        count_where(&events, |event| matches!(event, Event::Diagnostic { message } if message.contains("line"))),
        2,
        "one rejected line per collection"
    );
    assert_eq!(
        count_where(&events, |event| matches!(event, Event::TestFailed { .. })),
        1
    );
    Ok(())
}
