// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by verdict.

use crate::config::ParallelAlgorithm;
use config::ConfigError;
use std::{borrow::Cow, time::Duration};
use thiserror::Error;
use verdict_metadata::EventProblem;

/// An event was rejected because it could not be processed.
///
/// Malformed events are never fatal: the event is dropped, a diagnostic is emitted, and
/// processing continues.
#[derive(Debug, Error)]
pub enum MalformedEventError {
    /// The event is missing a required identifier, or names a node at the wrong level.
    #[error("malformed `{kind}` event: {problem}")]
    Invalid {
        /// The kind of the event.
        kind: &'static str,

        /// The problem with the event.
        problem: EventProblem,
    },

    /// A line could not be decoded into an event.
    #[error("failed to decode event on line {line}: {err}")]
    Decode {
        /// The 1-based line number.
        line: usize,

        /// The underlying error.
        err: serde_json::Error,
    },
}

/// The long-running test monitor could not be started.
#[derive(Debug, Error)]
#[error("failed to spawn long-running test monitor thread")]
pub struct MonitorStartError {
    #[source]
    err: std::io::Error,
}

impl MonitorStartError {
    pub(crate) fn new(err: std::io::Error) -> Self {
        Self { err }
    }
}

/// The long-running test monitor did not confirm exit in time.
///
/// A leaked monitor thread can keep a process alive, so this is always reported to the caller.
#[derive(Clone, Debug, Error)]
#[error("long-running test monitor did not exit within {timeout:?}")]
pub struct MonitorShutdownError {
    timeout: Duration,
}

impl MonitorShutdownError {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Returns the amount of time that was waited for.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// An error that occurred while parsing run options.
#[derive(Debug, Error)]
#[error("failed to parse run options")]
#[non_exhaustive]
pub struct RunOptionsParseError {
    #[source]
    err: ConfigError,
}

impl RunOptionsParseError {
    pub(crate) fn new(err: ConfigError) -> Self {
        Self { err }
    }
}

/// Error returned while parsing a
/// [`MaxParallelThreads`](crate::config::MaxParallelThreads) value from a string.
#[derive(Clone, Debug, Error)]
#[error("invalid value for max-parallel-threads: `{input}` ({message})")]
pub struct MaxParallelThreadsParseError {
    input: String,
    message: Cow<'static, str>,
}

impl MaxParallelThreadsParseError {
    pub(crate) fn new(input: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// Error returned while parsing a [`ParallelAlgorithm`] value from a string.
#[derive(Clone, Debug, Error)]
#[error(
    "unrecognized value for parallel-algorithm: {input}\n(known values: {})",
    ParallelAlgorithm::variants().join(", "),
)]
pub struct ParallelAlgorithmParseError {
    input: String,
}

impl ParallelAlgorithmParseError {
    pub(crate) fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
        }
    }
}

/// An error that occurred while building a [`Runner`](crate::runner::Runner).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerBuildError {
    /// An error occurred while creating the Tokio runtime.
    #[error("error creating Tokio runtime")]
    TokioRuntimeCreate(#[source] std::io::Error),
}

/// An error that occurred while executing a run.
#[derive(Debug, Error)]
pub enum RunExecuteError {
    /// One or more unit tasks panicked or were cancelled.
    #[error("{} unit task(s) panicked or were cancelled", .0.len())]
    Join(Vec<tokio::task::JoinError>),

    /// The long-running test monitor could not be started.
    #[error("error starting the long-running test monitor")]
    MonitorStart(#[from] MonitorStartError),

    /// The long-running test monitor did not shut down in time.
    #[error("error shutting down the long-running test monitor")]
    MonitorShutdown(#[from] MonitorShutdownError),
}

/// An error that occurred while reading or writing events on the wire.
#[derive(Debug, Error)]
pub enum WireError {
    /// An I/O error occurred.
    #[error("I/O error on event stream")]
    Io(#[from] std::io::Error),

    /// An event could not be serialized.
    #[error("error serializing event to JSON")]
    Serialize(#[source] serde_json::Error),
}
