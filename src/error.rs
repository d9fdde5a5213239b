// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Errors raised while configuring a probe-aware sampler.
///
/// All of these are construction-time failures. Sampling itself is total
/// and has no error channel.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The keep percentage must lie in `[1, 100]`.
    #[error("keep percentage must be between 1 and 100 inclusive, got {0}")]
    KeepPercentageOutOfRange(i64),

    /// The probe path must be a non-empty absolute request path.
    #[error("probe path must be a non-empty path starting with '/', got {0:?}")]
    InvalidProbePath(String),

    #[error("an inner sampler is required for requests outside the probe path")]
    MissingInnerSampler,

    /// Trace-id ratios must be finite and within `[0, 1]`.
    #[error("trace id ratio must be within [0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("failed to read sampler configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse sampler configuration: {0}")]
    Parse(#[from] toml::de::Error),
}
