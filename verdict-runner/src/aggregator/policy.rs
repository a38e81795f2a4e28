// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Result policies that turn non-failing results into failures.

use verdict_metadata::{Event, ExceptionInfo, FailureCause, NodePath, RunSummary};

/// The exception kind of a skipped test reported as a failure.
pub const FAIL_SKIP_KIND: &str = "FAIL_SKIP";

/// The exception kind of a passing test with warnings reported as a failure.
pub const FAIL_WARN_KIND: &str = "FAIL_WARN";

/// The message of a passing test with warnings reported as a failure.
pub const FAIL_WARN_MESSAGE: &str = "this test failed due to one or more warnings";

/// Rewrites a skip as a failure. The skip reason becomes the failure message.
pub(super) fn fail_skip(path: &NodePath, reason: &str, warnings: Option<&Vec<String>>) -> Event {
    Event::TestFailed {
        path: path.clone(),
        time_seconds: 0.0,
        output: String::new(),
        exception: ExceptionInfo::new(FAIL_SKIP_KIND, reason),
        cause: FailureCause::Other,
        warnings: warnings.cloned(),
    }
}

/// Rewrites a pass with warnings as a failure, keeping its time, output and warnings.
pub(super) fn fail_warn(
    path: &NodePath,
    time_seconds: f64,
    output: &str,
    warnings: &[String],
) -> Event {
    Event::TestFailed {
        path: path.clone(),
        time_seconds,
        output: output.to_owned(),
        exception: ExceptionInfo::new(FAIL_WARN_KIND, FAIL_WARN_MESSAGE),
        cause: FailureCause::Other,
        warnings: Some(warnings.to_vec()),
    }
}

/// Adjusts a producer's counts for the conversions made below a node.
///
/// With fail-skip enabled, every skip is a failure. `warn_converted` passes that were turned into
/// failures are moved over as well.
pub(super) fn adjust(summary: RunSummary, fail_skips: bool, warn_converted: usize) -> RunSummary {
    let mut adjusted = summary;
    if fail_skips {
        adjusted.failed = adjusted.failed.saturating_add(adjusted.skipped);
        adjusted.skipped = 0;
    }
    adjusted.failed = adjusted.failed.saturating_add(warn_converted);
    adjusted
}
