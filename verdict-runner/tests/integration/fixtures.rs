// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use futures::{FutureExt, future::BoxFuture};
use std::{
    collections::HashMap,
    sync::{
        Mutex, Once,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, Instant},
};
use tracing::Level;
use verdict_metadata::{Event, ExceptionInfo, FailureCause, NodeId, NodePath, RunSummary};
use verdict_runner::{
    runner::{AssemblyPlan, CollectionExecutor, UnitContext},
    scheduler::ScheduleUnit,
};

pub(crate) fn test_init() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = color_eyre::install();
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(Level::DEBUG)
            .try_init();
    });
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Outcome {
    Pass,
    Fail,
    Skip,
    PassWithWarning,
}

impl Outcome {
    fn raw_summary(self) -> RunSummary {
        match self {
            Outcome::Pass | Outcome::PassWithWarning => RunSummary::new(1, 0, 0, 0),
            Outcome::Fail => RunSummary::new(1, 1, 0, 0),
            Outcome::Skip => RunSummary::new(1, 0, 1, 0),
        }
    }

    fn result_event(self, path: NodePath) -> Event {
        match self {
            Outcome::Pass => Event::TestPassed {
                path,
                time_seconds: 0.01,
                output: String::new(),
                warnings: None,
            },
            Outcome::PassWithWarning => Event::TestPassed {
                path,
                time_seconds: 0.01,
                output: String::new(),
                warnings: Some(vec!["obsolete api".to_owned()]),
            },
            Outcome::Fail => Event::TestFailed {
                path,
                time_seconds: 0.01,
                output: "assertion output".to_owned(),
                exception: ExceptionInfo::new("AssertionError", "expected 1, got 2"),
                cause: FailureCause::Assertion,
                warnings: None,
            },
            Outcome::Skip => Event::TestSkipped {
                path,
                reason: "not on this platform".to_owned(),
                warnings: None,
            },
        }
    }
}

/// The events for one test, each in its own method: everything up to and including the start,
/// then everything after.
pub(crate) fn test_events(
    class: &NodePath,
    name: &str,
    outcome: Outcome,
) -> (Vec<Event>, Vec<Event>, RunSummary) {
    let method = class.method(name);
    let test = method.test(name);
    let summary = outcome.raw_summary();
    let before = vec![
        Event::MethodStarting {
            path: method.clone(),
        },
        Event::TestStarting {
            path: test.clone(),
            display_name: format!("Test {name}"),
        },
    ];
    let after = vec![
        outcome.result_event(test.clone()),
        Event::TestFinished {
            path: test,
            summary,
        },
        Event::MethodFinished {
            path: method,
            summary,
        },
    ];
    (before, after, summary)
}

/// Every event for a collection with a single class.
pub(crate) fn collection_events(
    collection: &NodePath,
    tests: &[(&str, Outcome)],
) -> (Vec<Event>, RunSummary) {
    let class = collection.class("Class");
    let mut events = vec![
        Event::CollectionStarting {
            path: collection.clone(),
            name: collection.collection.as_ref().map(NodeId::to_string).unwrap_or_default(),
        },
        Event::ClassStarting {
            path: class.clone(),
        },
    ];
    let mut summary = RunSummary::default();
    for (name, outcome) in tests {
        let (before, after, test_summary) = test_events(&class, name, *outcome);
        events.extend(before);
        events.extend(after);
        summary += test_summary;
    }
    events.push(Event::ClassFinished {
        path: class,
        summary,
    });
    events.push(Event::CollectionFinished {
        path: collection.clone(),
        summary,
    });
    (events, summary)
}

/// The window of time during which a collection ran.
#[derive(Clone, Debug)]
pub(crate) struct Window {
    pub(crate) collection: NodeId,
    pub(crate) start: Instant,
    pub(crate) end: Instant,
}

impl Window {
    pub(crate) fn overlaps(&self, other: &Window) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Records how many collections are active at once, and when each one ran.
#[derive(Debug, Default)]
pub(crate) struct ActivityLog {
    active: AtomicUsize,
    max_active: AtomicUsize,
    windows: Mutex<Vec<Window>>,
}

impl ActivityLog {
    fn enter(&self, collection: NodeId) -> ActivityGuard<'_> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        ActivityGuard {
            log: self,
            collection,
            start: Instant::now(),
        }
    }

    pub(crate) fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub(crate) fn windows(&self) -> Vec<Window> {
        self.windows.lock().unwrap().clone()
    }
}

struct ActivityGuard<'a> {
    log: &'a ActivityLog,
    collection: NodeId,
    start: Instant,
}

impl Drop for ActivityGuard<'_> {
    fn drop(&mut self) {
        self.log.windows.lock().unwrap().push(Window {
            collection: self.collection.clone(),
            start: self.start,
            end: Instant::now(),
        });
        self.log.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// An executor that plays back a fixed script of outcomes per collection, sleeping while each test
/// "runs".
#[derive(Debug, Default)]
pub(crate) struct ScriptedExecutor {
    scripts: HashMap<NodeId, Vec<(&'static str, Outcome)>>,
    test_delay: Duration,
    pub(crate) activity: ActivityLog,
}

impl ScriptedExecutor {
    pub(crate) fn new(test_delay: Duration) -> Self {
        Self {
            test_delay,
            ..Default::default()
        }
    }

    pub(crate) fn add(
        &mut self,
        collection: &str,
        tests: impl IntoIterator<Item = (&'static str, Outcome)>,
    ) -> &mut Self {
        self.scripts
            .insert(collection.into(), tests.into_iter().collect());
        self
    }
}

impl CollectionExecutor for ScriptedExecutor {
    fn execute<'a>(&'a self, cx: UnitContext<'a>) -> BoxFuture<'a, RunSummary> {
        async move {
            let collection_id = cx.unit().collection_id.clone();
            let _guard = self.activity.enter(collection_id.clone());
            let script = self
                .scripts
                .get(&collection_id)
                .map(Vec::as_slice)
                .unwrap_or_default();

            let collection = cx.path();
            let class = collection.class("Class");
            cx.publish(Event::CollectionStarting {
                path: collection.clone(),
                name: collection_id.to_string(),
            });
            cx.publish(Event::ClassStarting {
                path: class.clone(),
            });

            let mut summary = RunSummary::default();
            for (name, outcome) in script {
                if cx.is_cancelled() {
                    summary += RunSummary::new(1, 0, 0, 1);
                    continue;
                }
                let (before, after, test_summary) = test_events(&class, name, *outcome);
                for event in before {
                    cx.publish(event);
                }
                tokio::time::sleep(self.test_delay).await;
                for event in after {
                    cx.publish(event);
                }
                summary += test_summary;
            }

            cx.publish(Event::ClassFinished {
                path: class,
                summary,
            });
            cx.publish(Event::CollectionFinished {
                path: collection,
                summary,
            });
            summary
        }
        .boxed()
    }
}

pub(crate) fn assembly_plan(
    assembly: &str,
    units: impl IntoIterator<Item = ScheduleUnit>,
) -> AssemblyPlan {
    AssemblyPlan::new(assembly, format!("{assembly}.dll"), units)
}

pub(crate) fn count_where(events: &[Event], f: impl Fn(&Event) -> bool) -> usize {
    events.iter().filter(|event| f(event)).count()
}
