//! Security Headers Middleware
//!
//! Adds the standard hardening headers to every HTTP response.
//! `Strict-Transport-Security` is only sent when cookies are `secure`,
//! i.e. outside local and development environments.

use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Request, Response},
};
use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};

/// Security headers configuration
#[derive(Clone, Debug)]
pub struct SecurityHeadersConfig {
    /// `max-age` for HSTS; `None` disables the header
    pub hsts_max_age: Option<u64>,
    pub content_security_policy: &'static str,
    pub referrer_policy: &'static str,
    pub permissions_policy: &'static str,
}

impl SecurityHeadersConfig {
    pub fn for_environment(secure: bool) -> Self {
        Self {
            hsts_max_age: secure.then_some(15_552_000), // 180 days
            content_security_policy: "default-src 'self'",
            referrer_policy: "no-referrer",
            permissions_policy: "geolocation=(), microphone=(), camera=()",
        }
    }

    fn headers(&self) -> Vec<(HeaderName, HeaderValue)> {
        let mut headers = vec![
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN")),
            (header::X_DNS_PREFETCH_CONTROL, HeaderValue::from_static("off")),
            (
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            ),
            (
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(self.content_security_policy),
            ),
            (header::REFERRER_POLICY, HeaderValue::from_static(self.referrer_policy)),
            (
                HeaderName::from_static("permissions-policy"),
                HeaderValue::from_static(self.permissions_policy),
            ),
        ];

        if let Some(max_age) = self.hsts_max_age {
            if let Ok(value) = HeaderValue::from_str(&format!("max-age={max_age}; includeSubDomains")) {
                headers.push((header::STRICT_TRANSPORT_SECURITY, value));
            }
        }
        headers
    }
}

/// Layer that adds security headers to responses
#[derive(Clone)]
pub struct SecurityHeadersLayer {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl SecurityHeadersLayer {
    pub fn new(config: &SecurityHeadersConfig) -> Self {
        Self {
            headers: Arc::new(config.headers()),
        }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeadersMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeadersMiddleware {
            inner,
            headers: Arc::clone(&self.headers),
        }
    }
}

#[derive(Clone)]
pub struct SecurityHeadersMiddleware<S> {
    inner: S,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S> Service<Request<Body>> for SecurityHeadersMiddleware<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let headers = Arc::clone(&self.headers);

        Box::pin(async move {
            let mut response = inner.call(request).await?;
            let target = response.headers_mut();
            for (name, value) in headers.iter() {
                // Handlers may set a stricter value themselves
                if !target.contains_key(name) {
                    target.insert(name.clone(), value.clone());
                }
            }
            Ok(response)
        })
    }
}

pub fn create_security_headers_layer(secure: bool) -> SecurityHeadersLayer {
    SecurityHeadersLayer::new(&SecurityHeadersConfig::for_environment(secure))
}
