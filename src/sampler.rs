// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use opentelemetry::{
    trace::{
        Link, SamplingDecision, SamplingResult, SpanKind, TraceContextExt, TraceId, TraceState,
    },
    Context, KeyValue,
};
use opentelemetry_sdk::trace::ShouldSample;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    error::ConfigError,
    request_context::{OtelContextRequestSource, RequestContextSource, RequestPath},
    DEFAULT_KEEP_PERCENTAGE, DEFAULT_PROBE_PATH, SAMPLE_RATE_ATTRIBUTE,
};

/// Draws are taken uniformly from MIN_DRAW..=MAX_DRAW.
const MIN_DRAW: u8 = 1;
const MAX_DRAW: u8 = 100;

/// KeepPercentage is the share of probe requests to sample, in `[1, 100]`.
///
/// A request is kept when its draw is strictly less than the percentage,
/// so a percentage of `p` keeps `(p - 1)` out of every 100 draws on
/// average. In particular 100 keeps 99%, not every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeepPercentage(u8);

impl KeepPercentage {
    pub fn get(self) -> u8 {
        self.0
    }

    /// Reports whether a draw in `[1, 100]` falls within the kept share.
    pub fn keeps(self, draw: u8) -> bool {
        draw < self.0
    }
}

impl TryFrom<i64> for KeepPercentage {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(MIN_DRAW)..=i64::from(MAX_DRAW)).contains(&value) {
            Ok(KeepPercentage(value as u8))
        } else {
            Err(ConfigError::KeepPercentageOutOfRange(value))
        }
    }
}

impl From<KeepPercentage> for i64 {
    fn from(p: KeepPercentage) -> i64 {
        i64::from(p.0)
    }
}

impl fmt::Display for KeepPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

pub(crate) fn validate_probe_path(path: &str) -> Result<(), ConfigError> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(ConfigError::InvalidProbePath(path.to_string()))
    }
}

/// The random source shared by every clone of a sampler.
#[derive(Clone)]
struct SharedRng(Arc<Mutex<StdRng>>);

impl SharedRng {
    fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        SharedRng(Arc::new(Mutex::new(rng)))
    }

    fn draw(&self) -> u8 {
        // A panic elsewhere cannot leave the generator half-updated, so a
        // poisoned lock is still usable.
        let mut rng = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        rng.gen_range(MIN_DRAW..=MAX_DRAW)
    }
}

/// ProbeAwareSampler applies its own keep percentage to spans created
/// while serving the probe path, and forwards every other decision to an
/// inner sampler untouched.
///
/// Spans kept on the probe path carry a `SampleRate` attribute equal to
/// the keep percentage. The inner sampler is never consulted for probe
/// requests, so even an always-off inner sampler lets them through.
#[derive(Clone)]
pub struct ProbeAwareSampler {
    probe_path: Arc<str>,
    keep_percentage: KeepPercentage,
    request_context: Arc<dyn RequestContextSource>,
    inner: Box<dyn ShouldSample>,
    rng: SharedRng,
}

impl fmt::Debug for ProbeAwareSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeAwareSampler")
            .field("probe_path", &self.probe_path)
            .field("keep_percentage", &self.keep_percentage.get())
            .field("request_context", &self.request_context)
            .field("inner", &self.inner)
            .finish()
    }
}

impl ProbeAwareSampler {
    /// Creates a sampler, validating its configuration.
    ///
    /// # Arguments
    ///
    /// * `probe_path` - The request path to sample with `keep_percentage`
    /// * `keep_percentage` - Share of probe requests to sample, in `[1, 100]`
    /// * `request_context` - Reports the path of the request being traced
    /// * `inner` - The sampler used for every other request
    pub fn new(
        probe_path: impl Into<String>,
        keep_percentage: i64,
        request_context: Arc<dyn RequestContextSource>,
        inner: Box<dyn ShouldSample>,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .probe_path(probe_path)
            .keep_percentage(keep_percentage)
            .shared_request_context(request_context)
            .boxed_inner(inner)
            .build()
    }

    pub fn builder() -> ProbeAwareSamplerBuilder {
        ProbeAwareSamplerBuilder::default()
    }

    pub fn probe_path(&self) -> &str {
        &self.probe_path
    }

    pub fn keep_percentage(&self) -> KeepPercentage {
        self.keep_percentage
    }

    /// The request path carried by the context the span is started in
    /// takes precedence over the configured source.
    fn is_probe_request(&self, parent_context: Option<&Context>) -> bool {
        parent_context
            .and_then(|cx| cx.get::<RequestPath>().cloned())
            .or_else(|| self.request_context.current_path())
            .is_some_and(|path| path.as_str() == &*self.probe_path)
    }

    fn sample_probe(&self, parent_context: Option<&Context>) -> SamplingResult {
        let trace_state = parent_context
            .filter(|cx| cx.has_active_span())
            .map(|cx| cx.span().span_context().trace_state().clone())
            .unwrap_or_else(TraceState::default);

        if self.keep_percentage.keeps(self.rng.draw()) {
            SamplingResult {
                decision: SamplingDecision::RecordAndSample,
                attributes: vec![KeyValue::new(
                    SAMPLE_RATE_ATTRIBUTE,
                    i64::from(self.keep_percentage),
                )],
                trace_state,
            }
        } else {
            SamplingResult {
                decision: SamplingDecision::Drop,
                attributes: Vec::new(),
                trace_state,
            }
        }
    }
}

impl ShouldSample for ProbeAwareSampler {
    fn should_sample(
        &self,
        parent_context: Option<&Context>,
        trace_id: TraceId,
        name: &str,
        span_kind: &SpanKind,
        attributes: &[KeyValue],
        links: &[Link],
    ) -> SamplingResult {
        if self.is_probe_request(parent_context) {
            return self.sample_probe(parent_context);
        }

        self.inner
            .should_sample(parent_context, trace_id, name, span_kind, attributes, links)
    }
}

/// Collects the configuration of a [`ProbeAwareSampler`].
///
/// Defaults: probe path `/health`, keep percentage 100, request paths read
/// from the OpenTelemetry context, generator seeded from OS entropy. The
/// inner sampler has no default.
#[derive(Debug, Default)]
pub struct ProbeAwareSamplerBuilder {
    probe_path: Option<String>,
    keep_percentage: Option<i64>,
    request_context: Option<Arc<dyn RequestContextSource>>,
    inner: Option<Box<dyn ShouldSample>>,
    seed: Option<u64>,
}

impl ProbeAwareSamplerBuilder {
    pub fn probe_path(mut self, path: impl Into<String>) -> Self {
        self.probe_path = Some(path.into());
        self
    }

    pub fn keep_percentage(mut self, keep_percentage: i64) -> Self {
        self.keep_percentage = Some(keep_percentage);
        self
    }

    pub fn request_context<S>(self, source: S) -> Self
    where
        S: RequestContextSource + 'static,
    {
        self.shared_request_context(Arc::new(source))
    }

    pub fn shared_request_context(mut self, source: Arc<dyn RequestContextSource>) -> Self {
        self.request_context = Some(source);
        self
    }

    pub fn inner<S>(self, sampler: S) -> Self
    where
        S: ShouldSample + 'static,
    {
        self.boxed_inner(Box::new(sampler))
    }

    pub fn boxed_inner(mut self, sampler: Box<dyn ShouldSample>) -> Self {
        self.inner = Some(sampler);
        self
    }

    /// Seeds the generator for reproducible decisions.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn build(self) -> Result<ProbeAwareSampler, ConfigError> {
        let probe_path = self
            .probe_path
            .unwrap_or_else(|| DEFAULT_PROBE_PATH.to_string());
        validate_probe_path(&probe_path)?;

        let keep_percentage =
            KeepPercentage::try_from(self.keep_percentage.unwrap_or(DEFAULT_KEEP_PERCENTAGE))?;
        let inner = self.inner.ok_or(ConfigError::MissingInnerSampler)?;
        let request_context = self
            .request_context
            .unwrap_or_else(|| Arc::new(OtelContextRequestSource));

        tracing::debug!(
            probe_path = %probe_path,
            keep_percentage = keep_percentage.get(),
            inner = ?inner,
            "configured probe-aware sampler"
        );

        Ok(ProbeAwareSampler {
            probe_path: probe_path.into(),
            keep_percentage,
            request_context,
            inner,
            rng: SharedRng::new(self.seed),
        })
    }
}
