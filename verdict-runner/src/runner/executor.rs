// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{bus::MessageBus, cancel::CancellationToken, scheduler::ScheduleUnit};
use futures::future::BoxFuture;
use verdict_metadata::{Event, NodeId, NodePath, RunSummary};

/// A test assembly to run: an identifier plus its collections, in submission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyPlan {
    /// The assembly's identifier.
    pub id: NodeId,

    /// The assembly's display name.
    pub name: String,

    /// The collections in this assembly.
    pub units: Vec<ScheduleUnit>,
}

impl AssemblyPlan {
    /// Creates a new assembly plan.
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        units: impl IntoIterator<Item = ScheduleUnit>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            units: units.into_iter().collect(),
        }
    }
}

/// Runs the tests in a single collection.
///
/// The runner calls [`execute`](Self::execute) once per admitted collection, possibly from several
/// tasks at once. Implementations publish the collection's events (everything from
/// `CollectionStarting` through `CollectionFinished`) to the bus in the context, and return the
/// collection's raw counts.
///
/// Cancellation is cooperative: implementations should stop starting tests once
/// [`UnitContext::publish`] returns false or [`UnitContext::is_cancelled`] returns true.
pub trait CollectionExecutor: Sync {
    /// Runs one collection.
    fn execute<'a>(&'a self, cx: UnitContext<'a>) -> BoxFuture<'a, RunSummary>;
}

/// Everything a [`CollectionExecutor`] gets to see about the collection it is running.
#[derive(Clone, Copy, Debug)]
pub struct UnitContext<'a> {
    assembly: &'a AssemblyPlan,
    unit: &'a ScheduleUnit,
    bus: &'a MessageBus,
}

impl<'a> UnitContext<'a> {
    pub(super) fn new(
        assembly: &'a AssemblyPlan,
        unit: &'a ScheduleUnit,
        bus: &'a MessageBus,
    ) -> Self {
        Self {
            assembly,
            unit,
            bus,
        }
    }

    /// Returns the assembly this collection belongs to.
    pub fn assembly(&self) -> &'a AssemblyPlan {
        self.assembly
    }

    /// Returns the collection being run.
    pub fn unit(&self) -> &'a ScheduleUnit {
        self.unit
    }

    /// Returns the path of the collection.
    pub fn path(&self) -> NodePath {
        NodePath::assembly(self.assembly.id.clone()).collection(self.unit.collection_id.clone())
    }

    /// Publishes an event. Returns false if the collection should stop starting tests.
    pub fn publish(&self, event: Event) -> bool {
        self.bus.publish(event)
    }

    /// Returns the run's message bus, for example to feed it from an
    /// [`EventReader`](crate::wire::EventReader).
    pub fn bus(&self) -> &'a MessageBus {
        self.bus
    }

    /// Returns the run's cancellation token.
    pub fn cancellation(&self) -> &'a CancellationToken {
        self.bus.cancellation()
    }

    /// Returns true if the run has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.bus.cancellation().is_cancelled()
    }
}
