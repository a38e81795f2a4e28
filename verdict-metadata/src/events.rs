// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{NodeId, NodeLevel, NodePath, PathProblem, RunSummary};
use serde::{Deserialize, Serialize};
use std::{error, fmt};

/// Information about an exception or assertion failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExceptionInfo {
    /// The kind of the exception, for example a type name.
    pub kind: String,

    /// The exception message.
    pub message: String,

    /// The stack trace, if one is available. May be empty.
    #[serde(default)]
    pub stack_trace: String,
}

impl ExceptionInfo {
    /// Creates a new `ExceptionInfo` with an empty stack trace.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            stack_trace: String::new(),
        }
    }
}

/// Why a test failed.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureCause {
    /// An assertion in the test failed.
    Assertion,

    /// The test raised an exception that wasn't an assertion.
    Exception,

    /// The test timed out.
    Timeout,

    /// Any other reason, including policy conversions.
    #[default]
    Other,
}

/// An immutable fact about the lifecycle of a node in the test hierarchy.
///
/// Events are produced by test executors and published into a message bus. Every event that
/// belongs to a node carries a [`NodePath`] naming the node and all of its ancestors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Event {
    /// A diagnostic message meant for humans.
    Diagnostic {
        /// The message.
        message: String,
    },

    /// A catastrophic error that isn't tied to a specific test.
    Error {
        /// The assembly the error was observed in, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        assembly: Option<NodeId>,

        /// Information about the error.
        exception: ExceptionInfo,
    },

    /// Cleanup failed for a node at some level. Counted like [`Event::Error`].
    CleanupFailure {
        /// The level of the node whose cleanup failed.
        level: NodeLevel,

        /// The path to the node.
        path: NodePath,

        /// Information about the failure.
        exception: ExceptionInfo,
    },

    /// An assembly started.
    AssemblyStarting {
        /// The path to the assembly.
        path: NodePath,

        /// The assembly's name.
        name: String,
    },

    /// A test collection started.
    CollectionStarting {
        /// The path to the collection.
        path: NodePath,

        /// The collection's display name.
        name: String,
    },

    /// A test class started.
    ClassStarting {
        /// The path to the class.
        path: NodePath,
    },

    /// A test method started.
    MethodStarting {
        /// The path to the method.
        path: NodePath,
    },

    /// A test started.
    TestStarting {
        /// The path to the test.
        path: NodePath,

        /// The test's display name.
        display_name: String,
    },

    /// A test produced output while running.
    TestOutput {
        /// The path to the test.
        path: NodePath,

        /// The output produced.
        output: String,
    },

    /// A test passed.
    TestPassed {
        /// The path to the test.
        path: NodePath,

        /// The time the test took, in seconds.
        time_seconds: f64,

        /// The test's captured output.
        #[serde(default)]
        output: String,

        /// Warnings the test raised, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warnings: Option<Vec<String>>,
    },

    /// A test failed.
    TestFailed {
        /// The path to the test.
        path: NodePath,

        /// The time the test took, in seconds.
        time_seconds: f64,

        /// The test's captured output.
        #[serde(default)]
        output: String,

        /// Information about the failure.
        exception: ExceptionInfo,

        /// Why the test failed.
        #[serde(default)]
        cause: FailureCause,

        /// Warnings the test raised, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warnings: Option<Vec<String>>,
    },

    /// A test was skipped.
    TestSkipped {
        /// The path to the test.
        path: NodePath,

        /// Why the test was skipped.
        reason: String,

        /// Warnings the test raised, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        warnings: Option<Vec<String>>,
    },

    /// A test was not run.
    TestNotRun {
        /// The path to the test.
        path: NodePath,
    },

    /// A test finished.
    TestFinished {
        /// The path to the test.
        path: NodePath,

        /// The test's counts.
        summary: RunSummary,
    },

    /// A test method finished.
    MethodFinished {
        /// The path to the method.
        path: NodePath,

        /// Counts for all tests in the method.
        summary: RunSummary,
    },

    /// A test class finished.
    ClassFinished {
        /// The path to the class.
        path: NodePath,

        /// Counts for all tests in the class.
        summary: RunSummary,
    },

    /// A test collection finished.
    CollectionFinished {
        /// The path to the collection.
        path: NodePath,

        /// Counts for all tests in the collection.
        summary: RunSummary,
    },

    /// An assembly finished.
    AssemblyFinished {
        /// The path to the assembly.
        path: NodePath,

        /// Counts for all tests in the assembly.
        summary: RunSummary,
    },
}

impl Event {
    /// Creates a `*Finished` event for the given level.
    pub fn finished(level: NodeLevel, path: NodePath, summary: RunSummary) -> Self {
        match level {
            NodeLevel::Assembly => Self::AssemblyFinished { path, summary },
            NodeLevel::Collection => Self::CollectionFinished { path, summary },
            NodeLevel::Class => Self::ClassFinished { path, summary },
            NodeLevel::Method => Self::MethodFinished { path, summary },
            NodeLevel::Test => Self::TestFinished { path, summary },
        }
    }

    /// If this is a `*Finished` event, returns its level, path and summary.
    pub fn as_finished(&self) -> Option<(NodeLevel, &NodePath, &RunSummary)> {
        match self {
            Self::AssemblyFinished { path, summary } => Some((NodeLevel::Assembly, path, summary)),
            Self::CollectionFinished { path, summary } => {
                Some((NodeLevel::Collection, path, summary))
            }
            Self::ClassFinished { path, summary } => Some((NodeLevel::Class, path, summary)),
            Self::MethodFinished { path, summary } => Some((NodeLevel::Method, path, summary)),
            Self::TestFinished { path, summary } => Some((NodeLevel::Test, path, summary)),
            _ => None,
        }
    }

    /// Returns a short kebab-case name for this event's variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Diagnostic { .. } => "diagnostic",
            Self::Error { .. } => "error",
            Self::CleanupFailure { .. } => "cleanup-failure",
            Self::AssemblyStarting { .. } => "assembly-starting",
            Self::CollectionStarting { .. } => "collection-starting",
            Self::ClassStarting { .. } => "class-starting",
            Self::MethodStarting { .. } => "method-starting",
            Self::TestStarting { .. } => "test-starting",
            Self::TestOutput { .. } => "test-output",
            Self::TestPassed { .. } => "test-passed",
            Self::TestFailed { .. } => "test-failed",
            Self::TestSkipped { .. } => "test-skipped",
            Self::TestNotRun { .. } => "test-not-run",
            Self::TestFinished { .. } => "test-finished",
            Self::MethodFinished { .. } => "method-finished",
            Self::ClassFinished { .. } => "class-finished",
            Self::CollectionFinished { .. } => "collection-finished",
            Self::AssemblyFinished { .. } => "assembly-finished",
        }
    }

    /// Returns the path and the level this event's path must have, for events tied to a node.
    pub fn node(&self) -> Option<(NodeLevel, &NodePath)> {
        match self {
            Self::Diagnostic { .. } | Self::Error { .. } => None,
            Self::CleanupFailure { level, path, .. } => Some((*level, path)),
            Self::AssemblyStarting { path, .. } => Some((NodeLevel::Assembly, path)),
            Self::CollectionStarting { path, .. } => Some((NodeLevel::Collection, path)),
            Self::ClassStarting { path } => Some((NodeLevel::Class, path)),
            Self::MethodStarting { path } => Some((NodeLevel::Method, path)),
            Self::TestStarting { path, .. }
            | Self::TestOutput { path, .. }
            | Self::TestPassed { path, .. }
            | Self::TestFailed { path, .. }
            | Self::TestSkipped { path, .. }
            | Self::TestNotRun { path } => Some((NodeLevel::Test, path)),
            Self::TestFinished { .. }
            | Self::MethodFinished { .. }
            | Self::ClassFinished { .. }
            | Self::CollectionFinished { .. }
            | Self::AssemblyFinished { .. } => self.as_finished().map(|(level, path, _)| (level, path)),
        }
    }

    /// Returns the identifier of the assembly this event belongs to, if any.
    pub fn assembly(&self) -> Option<&NodeId> {
        match self {
            Self::Error { assembly, .. } => assembly.as_ref(),
            _ => self.node().map(|(_, path)| &path.assembly),
        }
    }

    /// Checks that this event carries every identifier it requires.
    pub fn validate(&self) -> Result<(), EventProblem> {
        if let Self::Error {
            assembly: Some(assembly),
            ..
        } = self
        {
            if assembly.is_empty() {
                return Err(EventProblem::Path(PathProblem::Empty(NodeLevel::Assembly)));
            }
        }

        if let Some((expected, path)) = self.node() {
            path.check().map_err(EventProblem::Path)?;
            let actual = path.depth();
            if actual != expected {
                return Err(EventProblem::WrongLevel { expected, actual });
            }
        }

        Ok(())
    }
}

/// A problem with an [`Event`], as returned by [`Event::validate`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EventProblem {
    /// The event's path is not well-formed.
    Path(PathProblem),

    /// The event's path names a node at a different level than the event requires.
    WrongLevel {
        /// The level the event requires.
        expected: NodeLevel,

        /// The level of the deepest identifier in the path.
        actual: NodeLevel,
    },
}

impl fmt::Display for EventProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(problem) => write!(f, "{problem}"),
            Self::WrongLevel { expected, actual } => {
                write!(f, "expected a path to a {expected}, found a path to a {actual}")
            }
        }
    }
}

impl error::Error for EventProblem {}
