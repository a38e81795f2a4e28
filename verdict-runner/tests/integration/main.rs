// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for verdict-runner.

mod cancellation;
mod fixtures;
mod long_running;
mod scheduling;
mod wire;
