// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Plain data types shared by [verdict](https://crates.io/crates/verdict-runner) producers and
//! consumers.
//!
//! Everything in this crate is `serde`-serializable: test executors running in another process
//! (or another isolation context) describe their progress as [`Event`]s, send them across a pipe,
//! socket or in-process channel, and the runner turns them back into values on the other side.
//! Nothing here depends on how the events are transported.

mod events;
mod exit_codes;
mod ids;
mod summary;

pub use events::*;
pub use exit_codes::*;
pub use ids::*;
pub use summary::*;
