// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! A sampler decorator that treats one high-volume probe endpoint (a
//! liveness or health check) differently from all other traffic.
//!
//! Spans started while serving the probe path are kept with a fixed
//! percentage and tagged with the rate that kept them. Every other
//! decision is forwarded untouched to an inner sampler of the caller's
//! choosing.
//!
//! ```no_run
//! use opentelemetry_sdk::trace::Sampler;
//! use probe_sampler::{enter_request, ProbeAwareSampler};
//!
//! let sampler = ProbeAwareSampler::builder()
//!     .probe_path("/health")
//!     .keep_percentage(10)
//!     .inner(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
//!     .build()?;
//! let provider = probe_sampler::tracer_provider("checkout", sampler);
//!
//! // In the HTTP layer, for the duration of each request:
//! let _guard = enter_request("/health");
//! # let _ = provider;
//! # Ok::<(), probe_sampler::ConfigError>(())
//! ```

mod config;
mod error;
mod request_context;
mod sampler;
mod telemetry;

pub use config::{InnerSamplerConfig, ProbeSamplerConfig};
pub use error::ConfigError;
pub use request_context::{
    enter_request, request_context, FixedRequestPath, FnRequestSource, NoRequestContext,
    OtelContextRequestSource, RequestContextSource, RequestPath,
};
pub use sampler::{KeepPercentage, ProbeAwareSampler, ProbeAwareSamplerBuilder};
pub use telemetry::{init_tracer_provider, tracer_provider, TelemetryConfig, DEFAULT_SERVICE_NAME};

/// Attribute attached to kept probe spans, holding the keep percentage.
pub const SAMPLE_RATE_ATTRIBUTE: &str = "SampleRate";

/// The probe path used when none is configured.
pub const DEFAULT_PROBE_PATH: &str = "/health";

/// The keep percentage used when none is configured.
pub const DEFAULT_KEEP_PERCENTAGE: i64 = 100;
