// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Declarative sampler configuration.
//!
//! ```toml
//! probe_path = "/health"
//! keep_percentage = 10
//!
//! [inner]
//! type = "parent_based"
//!
//! [inner.root]
//! type = "trace_id_ratio"
//! ratio = 0.25
//! ```

use std::path::Path;

use opentelemetry_sdk::trace::Sampler;
use serde::Deserialize;

use crate::{
    error::ConfigError,
    request_context::RequestContextSource,
    sampler::{validate_probe_path, KeepPercentage, ProbeAwareSampler, ProbeAwareSamplerBuilder},
    DEFAULT_KEEP_PERCENTAGE, DEFAULT_PROBE_PATH,
};

/// Configuration of a [`ProbeAwareSampler`].
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProbeSamplerConfig {
    /// Request path sampled with `keep_percentage`.
    pub probe_path: String,

    /// Share of probe requests to sample, in `[1, 100]`.
    pub keep_percentage: i64,

    /// Fixed generator seed; OS entropy when absent.
    pub seed: Option<u64>,

    /// Sampler for every request outside the probe path.
    pub inner: InnerSamplerConfig,
}

impl Default for ProbeSamplerConfig {
    fn default() -> Self {
        ProbeSamplerConfig {
            probe_path: DEFAULT_PROBE_PATH.to_string(),
            keep_percentage: DEFAULT_KEEP_PERCENTAGE,
            seed: None,
            inner: InnerSamplerConfig::default(),
        }
    }
}

/// The built-in SDK samplers usable as the inner sampler.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InnerSamplerConfig {
    #[default]
    AlwaysOn,
    AlwaysOff,
    TraceIdRatio {
        ratio: f64,
    },
    ParentBased {
        root: Box<InnerSamplerConfig>,
    },
}

impl InnerSamplerConfig {
    pub fn to_sampler(&self) -> Result<Sampler, ConfigError> {
        Ok(match self {
            InnerSamplerConfig::AlwaysOn => Sampler::AlwaysOn,
            InnerSamplerConfig::AlwaysOff => Sampler::AlwaysOff,
            InnerSamplerConfig::TraceIdRatio { ratio } => {
                if !ratio.is_finite() || !(0.0..=1.0).contains(ratio) {
                    return Err(ConfigError::InvalidRatio(*ratio));
                }
                Sampler::TraceIdRatioBased(*ratio)
            }
            InnerSamplerConfig::ParentBased { root } => {
                Sampler::ParentBased(Box::new(root.to_sampler()?))
            }
        })
    }
}

impl ProbeSamplerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: ProbeSamplerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_probe_path(&self.probe_path)?;
        KeepPercentage::try_from(self.keep_percentage)?;
        self.inner.to_sampler()?;
        Ok(())
    }

    /// Builds a sampler reading request paths from the OpenTelemetry context.
    pub fn build_sampler(&self) -> Result<ProbeAwareSampler, ConfigError> {
        self.builder()?.build()
    }

    /// Builds a sampler reading request paths from `source`.
    pub fn build_sampler_with<S>(&self, source: S) -> Result<ProbeAwareSampler, ConfigError>
    where
        S: RequestContextSource + 'static,
    {
        self.builder()?.request_context(source).build()
    }

    fn builder(&self) -> Result<ProbeAwareSamplerBuilder, ConfigError> {
        let builder = ProbeAwareSampler::builder()
            .probe_path(self.probe_path.as_str())
            .keep_percentage(self.keep_percentage)
            .inner(self.inner.to_sampler()?);

        Ok(match self.seed {
            Some(seed) => builder.seed(seed),
            None => builder,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request_context::FixedRequestPath;
    use opentelemetry::trace::{SamplingDecision, SpanKind, TraceId};
    use opentelemetry_sdk::trace::ShouldSample;

    #[test]
    fn empty_document_uses_defaults() {
        let config = ProbeSamplerConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProbeSamplerConfig::default());
        assert_eq!(config.probe_path, "/health");
        assert_eq!(config.keep_percentage, 100);
        assert_eq!(config.inner, InnerSamplerConfig::AlwaysOn);
    }

    #[test]
    fn parses_nested_inner_sampler() {
        let config = ProbeSamplerConfig::from_toml_str(
            r#"
            probe_path = "/livez"
            keep_percentage = 5
            seed = 42

            [inner]
            type = "parent_based"

            [inner.root]
            type = "trace_id_ratio"
            ratio = 0.25
            "#,
        )
        .unwrap();

        assert_eq!(config.probe_path, "/livez");
        assert_eq!(config.keep_percentage, 5);
        assert_eq!(config.seed, Some(42));
        assert_eq!(
            config.inner,
            InnerSamplerConfig::ParentBased {
                root: Box::new(InnerSamplerConfig::TraceIdRatio { ratio: 0.25 }),
            }
        );
        assert!(matches!(
            config.inner.to_sampler().unwrap(),
            Sampler::ParentBased(_)
        ));
    }

    #[test]
    fn rejects_out_of_range_keep_percentage() {
        for bad in [0, 101, -5] {
            let err = ProbeSamplerConfig::from_toml_str(&format!("keep_percentage = {bad}"))
                .unwrap_err();
            assert!(matches!(err, ConfigError::KeepPercentageOutOfRange(v) if v == bad));
            assert!(err.to_string().contains(&bad.to_string()));
        }
    }

    #[test]
    fn rejects_bad_ratio() {
        let err = ProbeSamplerConfig::from_toml_str(
            r#"
            [inner]
            type = "trace_id_ratio"
            ratio = 1.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRatio(r) if r == 1.5));

        assert!(matches!(
            InnerSamplerConfig::TraceIdRatio { ratio: f64::NAN }.to_sampler(),
            Err(ConfigError::InvalidRatio(_))
        ));
    }

    #[test]
    fn rejects_unknown_sampler_and_fields() {
        let err = ProbeSamplerConfig::from_toml_str(
            r#"
            [inner]
            type = "sometimes"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = ProbeSamplerConfig::from_toml_str("keep = 10").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_relative_probe_path() {
        let err = ProbeSamplerConfig::from_toml_str(r#"probe_path = "health""#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProbePath(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ProbeSamplerConfig::from_file("/nonexistent/probe-sampler.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn builds_working_sampler() {
        let config = ProbeSamplerConfig {
            keep_percentage: 1,
            inner: InnerSamplerConfig::AlwaysOn,
            ..Default::default()
        };
        let sampler = config
            .build_sampler_with(FixedRequestPath::new("/health"))
            .unwrap();
        assert_eq!(sampler.keep_percentage().get(), 1);

        let result = sampler.should_sample(
            None,
            TraceId::from_u128(1),
            "GET /health",
            &SpanKind::Server,
            &[],
            &[],
        );
        assert_eq!(result.decision, SamplingDecision::Drop);

        let sampler = config.build_sampler().unwrap();
        assert_eq!(sampler.probe_path(), "/health");
    }
}
