// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{MaxParallelThreads, ParallelAlgorithm};
use crate::errors::RunOptionsParseError;
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::{collections::BTreeSet, time::Duration};
use tracing::warn;

/// Options for a single run.
///
/// Built programmatically through the setters, or parsed from TOML with
/// [`from_toml_str`](Self::from_toml_str).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RunOptions {
    disable_parallelization: bool,
    max_parallel_threads: MaxParallelThreads,
    parallel_algorithm: ParallelAlgorithm,
    long_running_seconds: f64,
    fail_skips: bool,
    fail_warns: bool,
}

impl RunOptions {
    /// The default options, as TOML.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../../default-config.toml");

    /// Parses options from TOML text, layered over [`Self::DEFAULT_CONFIG`].
    ///
    /// Unknown keys are ignored with a warning.
    pub fn from_toml_str(contents: &str) -> Result<Self, RunOptionsParseError> {
        let mut unknown = BTreeSet::new();
        let options = Self::from_toml_str_impl(contents, |key| {
            unknown.insert(key);
        })?;
        for key in unknown {
            warn!("ignoring unknown run option `{key}`");
        }
        Ok(options)
    }

    fn from_toml_str_impl(
        contents: &str,
        mut unknown_callback: impl FnMut(String),
    ) -> Result<Self, RunOptionsParseError> {
        let config = Self::make_default_config()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()
            .map_err(RunOptionsParseError::new)?;
        serde_ignored::deserialize(config, |path: serde_ignored::Path| {
            unknown_callback(path.to_string());
        })
        .map_err(RunOptionsParseError::new)
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// Returns true if every collection runs sequentially.
    pub fn disable_parallelization(&self) -> bool {
        self.disable_parallelization
    }

    /// Sets whether every collection runs sequentially.
    pub fn set_disable_parallelization(&mut self, disable: bool) -> &mut Self {
        self.disable_parallelization = disable;
        self
    }

    /// Returns the maximum number of collections to run at once.
    pub fn max_parallel_threads(&self) -> MaxParallelThreads {
        self.max_parallel_threads
    }

    /// Sets the maximum number of collections to run at once.
    pub fn set_max_parallel_threads(&mut self, threads: MaxParallelThreads) -> &mut Self {
        self.max_parallel_threads = threads;
        self
    }

    /// Returns the parallel algorithm.
    pub fn parallel_algorithm(&self) -> ParallelAlgorithm {
        self.parallel_algorithm
    }

    /// Sets the parallel algorithm.
    pub fn set_parallel_algorithm(&mut self, algorithm: ParallelAlgorithm) -> &mut Self {
        self.parallel_algorithm = algorithm;
        self
    }

    /// Returns the long-running threshold, or `None` if long-running detection is disabled.
    pub fn long_running_threshold(&self) -> Option<Duration> {
        (self.long_running_seconds.is_finite() && self.long_running_seconds > 0.0)
            .then(|| Duration::from_secs_f64(self.long_running_seconds))
    }

    /// Sets the long-running threshold in seconds. 0 disables long-running detection.
    pub fn set_long_running_seconds(&mut self, seconds: f64) -> &mut Self {
        self.long_running_seconds = seconds;
        self
    }

    /// Returns true if skipped tests are reported as failures.
    pub fn fail_skips(&self) -> bool {
        self.fail_skips
    }

    /// Sets whether skipped tests are reported as failures.
    pub fn set_fail_skips(&mut self, fail_skips: bool) -> &mut Self {
        self.fail_skips = fail_skips;
        self
    }

    /// Returns true if passing tests with warnings are reported as failures.
    pub fn fail_warns(&self) -> bool {
        self.fail_warns
    }

    /// Sets whether passing tests with warnings are reported as failures.
    pub fn set_fail_warns(&mut self, fail_warns: bool) -> &mut Self {
        self.fail_warns = fail_warns;
        self
    }
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            disable_parallelization: false,
            max_parallel_threads: MaxParallelThreads::Default,
            parallel_algorithm: ParallelAlgorithm::Conservative,
            long_running_seconds: 0.0,
            fail_skips: false,
            fail_warns: false,
        }
    }
}
