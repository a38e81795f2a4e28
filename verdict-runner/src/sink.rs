// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Subscribers for event streams.

use std::sync::{Arc, Mutex, PoisonError};
use verdict_metadata::Event;

/// A subscriber to a stream of events.
///
/// Events are delivered one at a time, never concurrently. Returning `false` asks producers to
/// stop generating further work.
pub trait EventSink: Send {
    /// Called for every event delivered to this sink.
    fn on_event(&mut self, event: &Event) -> bool;
}

impl<F> EventSink for F
where
    F: FnMut(&Event) -> bool + Send,
{
    fn on_event(&mut self, event: &Event) -> bool {
        self(event)
    }
}

/// Forwards every event to several sinks, in order.
///
/// Returns `false` if any of the sinks did. Every sink sees every event regardless.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn EventSink>>,
}

impl FanoutSink {
    /// Creates a new, empty fanout sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink to the end of the list.
    pub fn push(&mut self, sink: impl EventSink + 'static) -> &mut Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Returns the number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns true if there are no sinks.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl EventSink for FanoutSink {
    fn on_event(&mut self, event: &Event) -> bool {
        self.sinks
            .iter_mut()
            .fold(true, |keep_going, sink| sink.on_event(event) && keep_going)
    }
}

/// A sink that stores a copy of every event it sees.
///
/// Clones share the same storage, so one clone can be handed to a bus while another is used to
/// inspect the events.
#[derive(Clone, Debug, Default)]
pub struct CollectingSink {
    events: Arc<Mutex<Vec<Event>>>,
}

impl CollectingSink {
    /// Creates a new, empty collecting sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the events seen so far.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the number of events seen so far.
    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns true if no events have been seen.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectingSink {
    fn on_event(&mut self, event: &Event) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
        true
    }
}
