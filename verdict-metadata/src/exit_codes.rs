// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for verdict runs.
///
/// A run may fail for a variety of reasons. This structure documents the exit codes a driver
/// should use for expected outcomes; see [`RunTotals::exit_code`](crate::RunTotals::exit_code).
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum VerdictExitCode {}

impl VerdictExitCode {
    /// No errors occurred and every test passed.
    pub const OK: i32 = 0;

    /// No tests were run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a run, for example invalid run options.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more tests failed, or one or more catastrophic errors were reported.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// The run was cancelled before every assembly finished.
    pub const RUN_CANCELLED: i32 = 101;
}
