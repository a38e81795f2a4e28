// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Events as newline-delimited JSON.
//!
//! Producers running in another process (or behind any other byte stream) write events with an
//! [`EventWriter`]; the receiving side feeds them into a [`MessageBus`] with an [`EventReader`].
//! Each line holds exactly one event.

use crate::{
    bus::MessageBus,
    errors::{MalformedEventError, WireError},
    sink::EventSink,
};
use std::io::{BufRead, Write};
use tracing::warn;
use verdict_metadata::Event;

/// An [`EventSink`] that writes each event as a line of JSON.
#[derive(Debug)]
pub struct EventWriter<W> {
    writer: W,
}

impl<W: Write> EventWriter<W> {
    /// Creates a new writer.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a single event and flushes the underlying writer.
    pub fn write_event(&mut self, event: &Event) -> Result<(), WireError> {
        let mut line = serde_json::to_vec(event).map_err(WireError::Serialize)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> EventSink for EventWriter<W> {
    fn on_event(&mut self, event: &Event) -> bool {
        match self.write_event(event) {
            Ok(()) => true,
            Err(error) => {
                warn!(kind = event.kind(), "failed to write event: {error}");
                false
            }
        }
    }
}

/// The outcome of [`EventReader::publish_to`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReadSummary {
    /// Lines decoded and published as events.
    pub accepted: usize,

    /// Lines that could not be decoded.
    pub rejected: usize,

    /// True if reading stopped because the bus asked producers to stop.
    pub stopped: bool,
}

/// Reads events written by an [`EventWriter`].
#[derive(Debug)]
pub struct EventReader<R> {
    reader: R,
}

impl<R: BufRead> EventReader<R> {
    /// Creates a new reader.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decodes every line and publishes the events to `bus`, in order.
    ///
    /// Blank lines are skipped. A line that doesn't decode is rejected with a diagnostic event and
    /// reading continues. Returns early if the bus asks producers to stop.
    pub fn publish_to(mut self, bus: &MessageBus) -> Result<ReadSummary, WireError> {
        let mut summary = ReadSummary::default();
        let mut buf = Vec::new();
        let mut line = 0;
        loop {
            buf.clear();
            if self.reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            line += 1;
            if buf.trim_ascii().is_empty() {
                continue;
            }

            let keep_going = match decode_line(line, &buf) {
                Ok(event) => {
                    summary.accepted += 1;
                    bus.publish(event)
                }
                Err(error) => {
                    warn!("{error}");
                    summary.rejected += 1;
                    bus.publish(Event::Diagnostic {
                        message: format!("rejected event: {error}"),
                    })
                }
            };
            if !keep_going {
                summary.stopped = true;
                break;
            }
        }
        Ok(summary)
    }
}

fn decode_line(line: usize, contents: &[u8]) -> Result<Event, MalformedEventError> {
    serde_json::from_slice(contents).map_err(|err| MalformedEventError::Decode { line, err })
}
