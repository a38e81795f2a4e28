// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result aggregation.
//!
//! The main structure in this module is [`ExecutionSink`].

mod imp;
mod policy;
mod store;

pub use imp::*;
pub use policy::{FAIL_SKIP_KIND, FAIL_WARN_KIND, FAIL_WARN_MESSAGE};
pub use store::*;
