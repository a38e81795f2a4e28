// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run configuration.
//!
//! The main structure in this module is [`RunOptions`].

mod max_parallel_threads;
mod parallel_algorithm;
mod run_options;

pub use max_parallel_threads::*;
pub use parallel_algorithm::*;
pub use run_options::*;
