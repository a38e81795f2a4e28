// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The run orchestrator.
//!
//! The main structure in this module is [`Runner`]. It wires together a
//! [`MessageBus`](crate::bus::MessageBus), an [`ExecutionSink`](crate::aggregator::ExecutionSink)
//! and, if configured, a [`LongRunningMonitor`](crate::monitor::LongRunningMonitor), and drives
//! collections through a [`CollectionExecutor`] according to the run's scheduling options.

mod executor;
mod imp;

pub use executor::*;
pub use imp::*;
