// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Event bus, result aggregation and parallel scheduling for verdict test runs.
//!
//! Test executors publish lifecycle events into a [`MessageBus`](bus::MessageBus). The bus
//! delivers them one at a time to an [`ExecutionSink`](aggregator::ExecutionSink), which applies
//! result policies, rolls counts up from tests to assemblies, and forwards the results to
//! reporters. A [`LongRunningMonitor`](monitor::LongRunningMonitor) watches the tests in flight,
//! and a [`ParallelScheduler`](scheduler::ParallelScheduler) decides which collections may run at
//! once. The [`Runner`](runner::Runner) ties these together for a whole run.

pub mod aggregator;
pub mod bus;
pub mod cancel;
pub mod config;
pub mod errors;
pub mod monitor;
pub mod runner;
pub mod scheduler;
pub mod sink;
mod time;
pub mod wire;
