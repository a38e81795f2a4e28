// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message bus that serializes events from concurrent producers.
//!
//! The main structure in this module is [`MessageBus`]. Any number of producers may call
//! [`MessageBus::publish`] concurrently; the bus delivers events to its single subscriber one at a
//! time, in the order the `publish` calls acquired the delivery lock. Events published by one
//! producer are therefore always delivered in the order that producer published them.

use crate::{cancel::CancellationToken, sink::EventSink};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use debug_ignore::DebugIgnore;
use std::{
    convert::Infallible,
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::debug;
use verdict_metadata::Event;

/// A predicate that identifies the event ending a bus's useful life.
///
/// The predicate is evaluated under the delivery lock, once per event and in delivery order, so it
/// may keep state (for example, to count events).
pub type TerminalPredicate = Box<dyn FnMut(&Event) -> bool + Send>;

/// A thread-safe, multi-producer event channel with a single subscriber.
#[derive(Debug)]
pub struct MessageBus {
    state: DebugIgnore<Mutex<BusState>>,
    cancel: CancellationToken,
    finished: AtomicBool,
    disposed: AtomicBool,
    gate: CompletionGate,
}

struct BusState {
    subscriber: Box<dyn EventSink>,
    is_terminal: TerminalPredicate,
}

impl MessageBus {
    /// Creates a bus with no terminal event.
    pub fn new(subscriber: impl EventSink + 'static, cancel: CancellationToken) -> Self {
        Self::with_terminal(subscriber, cancel, Box::new(|_| false))
    }

    /// Creates a bus that latches its finished state on the first event matching `is_terminal`.
    pub fn with_terminal(
        subscriber: impl EventSink + 'static,
        cancel: CancellationToken,
        is_terminal: TerminalPredicate,
    ) -> Self {
        Self {
            state: DebugIgnore(Mutex::new(BusState {
                subscriber: Box::new(subscriber),
                is_terminal,
            })),
            cancel,
            finished: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            gate: CompletionGate::new(),
        }
    }

    /// Delivers an event to the subscriber.
    ///
    /// The event is always delivered. Returns false if producers should stop generating work:
    /// the subscriber asked to stop, the run was cancelled, the terminal event has been seen, or
    /// the bus was disposed.
    pub fn publish(&self, event: Event) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let is_terminal = (state.is_terminal)(&event);
        let keep_going = state.subscriber.on_event(&event);
        if !keep_going && self.cancel.cancel() {
            debug!(kind = event.kind(), "subscriber requested cancellation");
        }

        // The subscriber must have fully processed the terminal event before the latch is set.
        if is_terminal
            && self
                .finished
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            debug!(kind = event.kind(), "terminal event delivered");
            self.gate.release();
        }
        drop(state);

        keep_going
            && !self.cancel.is_cancelled()
            && !self.finished.load(Ordering::Acquire)
            && !self.disposed.load(Ordering::Acquire)
    }

    /// Returns true once the terminal event has been delivered.
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Returns the gate released when the terminal event is delivered or the bus is disposed.
    pub fn gate(&self) -> &CompletionGate {
        &self.gate
    }

    /// Returns the cancellation token shared with producers.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Releases the completion gate and makes further `publish` calls return false.
    ///
    /// Idempotent, and never blocks.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            debug!("message bus disposed");
        }
        self.gate.release();
    }
}

/// A single-use, thread-safe completion signal.
///
/// Implemented as a channel that never carries a message: releasing the gate closes the channel,
/// which wakes every waiter at once.
#[derive(Debug)]
pub struct CompletionGate {
    sender: Mutex<Option<Sender<Infallible>>>,
    receiver: Receiver<Infallible>,
}

impl CompletionGate {
    /// Creates a new, unreleased gate.
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::bounded(0);
        Self {
            sender: Mutex::new(Some(sender)),
            receiver,
        }
    }

    /// Releases the gate. Returns true if this call released it.
    pub fn release(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
    }

    /// Returns true if the gate has been released.
    pub fn is_released(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Blocks until the gate is released.
    pub fn wait(&self) {
        match self.receiver.recv() {
            Ok(never) => match never {},
            Err(_) => {}
        }
    }

    /// Blocks until the gate is released or the timeout expires. Returns true if released.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(never) => match never {},
            Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}
