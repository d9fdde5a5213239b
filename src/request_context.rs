// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! Access to the path of the inbound request currently being traced.
//!
//! Sampling happens deep inside the tracing SDK, where the HTTP request is
//! not naturally visible. The hosting layer publishes the request path by
//! attaching it to the OpenTelemetry [`Context`] for the lifetime of the
//! request, and a [`RequestContextSource`] reads it back at sampling time.

use std::fmt;
use std::sync::Arc;

use opentelemetry::{Context, ContextGuard};

/// Path of an inbound request, cheap to clone.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RequestPath(Arc<str>);

impl RequestPath {
    pub fn new(path: impl Into<Arc<str>>) -> Self {
        RequestPath(path.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RequestPath {
    fn from(path: &str) -> Self {
        RequestPath::new(path)
    }
}

impl From<String> for RequestPath {
    fn from(path: String) -> Self {
        RequestPath::new(path)
    }
}

impl fmt::Display for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RequestPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// RequestContextSource reports the path of the active inbound request.
///
/// `None` means no request is active (startup, background jobs). That is
/// an ordinary state, not a failure.
pub trait RequestContextSource: Send + Sync + fmt::Debug {
    fn current_path(&self) -> Option<RequestPath>;
}

/// Reads the request path attached to the current OpenTelemetry context.
#[derive(Debug, Clone, Copy, Default)]
pub struct OtelContextRequestSource;

impl RequestContextSource for OtelContextRequestSource {
    fn current_path(&self) -> Option<RequestPath> {
        Context::current().get::<RequestPath>().cloned()
    }
}

/// A source for processes that never serve requests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRequestContext;

impl RequestContextSource for NoRequestContext {
    fn current_path(&self) -> Option<RequestPath> {
        None
    }
}

/// Always reports the same path.
#[derive(Debug, Clone)]
pub struct FixedRequestPath {
    path: RequestPath,
}

impl FixedRequestPath {
    pub fn new(path: impl Into<RequestPath>) -> Self {
        FixedRequestPath { path: path.into() }
    }
}

impl RequestContextSource for FixedRequestPath {
    fn current_path(&self) -> Option<RequestPath> {
        Some(self.path.clone())
    }
}

/// Adapts a closure into a [`RequestContextSource`].
pub struct FnRequestSource<F>(F);

impl<F> FnRequestSource<F>
where
    F: Fn() -> Option<RequestPath> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        FnRequestSource(f)
    }
}

impl<F> fmt::Debug for FnRequestSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnRequestSource")
    }
}

impl<F> RequestContextSource for FnRequestSource<F>
where
    F: Fn() -> Option<RequestPath> + Send + Sync,
{
    fn current_path(&self) -> Option<RequestPath> {
        (self.0)()
    }
}

/// Returns the current context extended with `path` as the active request.
///
/// Async hosts attach this to the request future; synchronous hosts use
/// [`enter_request`].
pub fn request_context(path: impl Into<RequestPath>) -> Context {
    Context::current_with_value(path.into())
}

/// Marks `path` as the active request until the returned guard is dropped.
pub fn enter_request(path: impl Into<RequestPath>) -> ContextGuard {
    request_context(path).attach()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn otel_source_outside_request_is_none() {
        assert_eq!(OtelContextRequestSource.current_path(), None);
    }

    #[test]
    fn otel_source_sees_entered_request() {
        let source = OtelContextRequestSource;
        {
            let _guard = enter_request("/health");
            assert_eq!(source.current_path(), Some(RequestPath::from("/health")));

            {
                let _inner = enter_request("/orders");
                assert_eq!(source.current_path().unwrap().as_str(), "/orders");
            }

            assert_eq!(source.current_path().unwrap().as_str(), "/health");
        }
        assert_eq!(source.current_path(), None);
    }

    #[test]
    fn request_scope_is_per_thread() {
        let _guard = enter_request("/health");

        let seen = std::thread::spawn(|| OtelContextRequestSource.current_path())
            .join()
            .unwrap();

        assert_eq!(seen, None);
    }

    #[test]
    fn fixed_and_empty_sources() {
        assert_eq!(NoRequestContext.current_path(), None);
        assert_eq!(
            FixedRequestPath::new("/health").current_path(),
            Some(RequestPath::from("/health"))
        );
    }

    #[test]
    fn fn_source_delegates_to_closure() {
        let source = FnRequestSource::new(|| Some(RequestPath::from(String::from("/ready"))));
        assert_eq!(source.current_path().unwrap().to_string(), "/ready");
        assert_eq!(format!("{:?}", source), "FnRequestSource");
    }
}
