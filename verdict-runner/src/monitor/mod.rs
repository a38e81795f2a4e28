// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of tests that run for longer than a configured threshold.
//!
//! The main structure in this module is [`LongRunningMonitor`].

mod clock;
mod imp;
mod running;

pub use clock::*;
pub use imp::*;
pub use running::*;
