// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Registers a probe-aware sampler with an SDK tracer provider.

use opentelemetry::global;
use opentelemetry_sdk::{
    trace::{SdkTracerProvider, ShouldSample},
    Resource,
};
use serde::Deserialize;

use crate::{config::ProbeSamplerConfig, error::ConfigError};

pub const DEFAULT_SERVICE_NAME: &str = "otel-sampler-test";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub sampler: ProbeSamplerConfig,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        TelemetryConfig {
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            sampler: ProbeSamplerConfig::default(),
        }
    }
}

impl TelemetryConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: TelemetryConfig = toml::from_str(s)?;
        config.sampler.validate()?;
        Ok(config)
    }
}

/// Builds a tracer provider that samples with `sampler` and writes spans
/// to stdout.
pub fn tracer_provider<S>(service_name: impl Into<String>, sampler: S) -> SdkTracerProvider
where
    S: ShouldSample + 'static,
{
    SdkTracerProvider::builder()
        .with_resource(
            Resource::builder()
                .with_service_name(service_name.into())
                .build(),
        )
        .with_sampler(sampler)
        .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
        .build()
}

/// Builds the configured sampler and installs a provider using it as the
/// global tracer provider. Configuration errors are returned before
/// anything is installed.
pub fn init_tracer_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, ConfigError> {
    let sampler = config.sampler.build_sampler()?;

    tracing::info!(
        service_name = %config.service_name,
        probe_path = sampler.probe_path(),
        keep_percentage = sampler.keep_percentage().get(),
        "installing tracer provider with probe-aware sampler"
    );

    let provider = tracer_provider(config.service_name.clone(), sampler);
    global::set_tracer_provider(provider.clone());
    Ok(provider)
}
