// Copyright (c) The verdict Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::MaxParallelThreadsParseError;
use serde::Deserialize;
use std::{cmp::Ordering, fmt, num::NonZeroUsize, str::FromStr, sync::LazyLock};
use tracing::warn;

/// Returns the number of logical CPUs, computed once per process.
pub fn get_num_cpus() -> usize {
    static NUM_CPUS: LazyLock<usize> =
        LazyLock::new(|| match std::thread::available_parallelism() {
            Ok(count) => count.into(),
            Err(err) => {
                warn!("unable to determine num-cpus ({err}), assuming 1 logical CPU");
                1
            }
        });

    *NUM_CPUS
}

/// Type for the max-parallel-threads config key.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum MaxParallelThreads {
    /// Use as many threads as there are logical CPUs. Written as `0` or `"default"`.
    #[default]
    Default,

    /// Don't limit the number of collections running at once. Written as a negative number or
    /// `"unlimited"`.
    Unlimited,

    /// Run up to this many collections at once.
    Count(NonZeroUsize),

    /// A multiple of the logical CPU count, for example `"2x"` or `"0.5x"`. The result is never
    /// less than 1.
    Multiplier(f64),
}

impl MaxParallelThreads {
    /// Converts a raw integer: 0 is the default, negative numbers are unlimited.
    pub fn from_raw(threads: i64) -> Self {
        match threads.cmp(&0) {
            Ordering::Equal => Self::Default,
            Ordering::Less => Self::Unlimited,
            Ordering::Greater => {
                NonZeroUsize::new(usize::try_from(threads).unwrap_or(usize::MAX))
                    .map_or(Self::Default, Self::Count)
            }
        }
    }

    /// Returns the raw admission limit: 0 for the default, negative for unlimited, or the
    /// computed thread count.
    pub fn admission_limit(self) -> isize {
        match self {
            Self::Default => 0,
            Self::Unlimited => -1,
            Self::Count(_) | Self::Multiplier(_) => match self.compute() {
                AdmissionLimit::Bounded(count) => isize::try_from(count.get()).unwrap_or(isize::MAX),
                AdmissionLimit::Unbounded => -1,
            },
        }
    }

    /// Computes the actual limit at runtime.
    pub fn compute(self) -> AdmissionLimit {
        match self {
            Self::Default => AdmissionLimit::Bounded(num_cpus_nonzero()),
            Self::Unlimited => AdmissionLimit::Unbounded,
            Self::Count(count) => AdmissionLimit::Bounded(count),
            Self::Multiplier(multiplier) => {
                let threads = (get_num_cpus() as f64 * multiplier).floor();
                // NaN and values below 1 fall back to the minimum of 1.
                let threads = if threads >= 1.0 { threads as usize } else { 1 };
                AdmissionLimit::Bounded(NonZeroUsize::new(threads).unwrap_or(NonZeroUsize::MIN))
            }
        }
    }
}

fn num_cpus_nonzero() -> NonZeroUsize {
    NonZeroUsize::new(get_num_cpus()).unwrap_or(NonZeroUsize::MIN)
}

/// The computed number of units that may run at once.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionLimit {
    /// At most this many units may run at once.
    Bounded(NonZeroUsize),

    /// Any number of units may run at once.
    Unbounded,
}

impl fmt::Display for AdmissionLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(count) => write!(f, "{count} threads"),
            Self::Unbounded => write!(f, "unlimited threads"),
        }
    }
}

impl FromStr for MaxParallelThreads {
    type Err = MaxParallelThreadsParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "default" => return Ok(Self::Default),
            "unlimited" => return Ok(Self::Unlimited),
            _ => {}
        }

        if let Some(multiplier) = s.strip_suffix('x') {
            return match multiplier.parse::<f64>() {
                Ok(m) if m.is_finite() && m > 0.0 => Ok(Self::Multiplier(m)),
                Ok(_) => Err(MaxParallelThreadsParseError::new(
                    s,
                    "multiplier must be a positive number",
                )),
                Err(err) => Err(MaxParallelThreadsParseError::new(s, err.to_string())),
            };
        }

        s.parse::<i64>()
            .map(Self::from_raw)
            .map_err(|err| MaxParallelThreadsParseError::new(s, err.to_string()))
    }
}

impl fmt::Display for MaxParallelThreads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::Unlimited => write!(f, "unlimited"),
            Self::Count(count) => write!(f, "{count}"),
            Self::Multiplier(multiplier) => write!(f, "{multiplier}x"),
        }
    }
}

impl<'de> Deserialize<'de> for MaxParallelThreads {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = MaxParallelThreads;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "an integer, \"default\", \"unlimited\" or a multiplier like \"2x\""
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse().map_err(|_| {
                    serde::de::Error::invalid_value(serde::de::Unexpected::Str(v), &self)
                })
            }

            // Note that TOML uses i64, not u64.
            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(MaxParallelThreads::from_raw(v))
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(MaxParallelThreads::from_raw(
                    i64::try_from(v).unwrap_or(i64::MAX),
                ))
            }
        }

        deserializer.deserialize_any(V)
    }
}
