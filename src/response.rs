//! Response building for matched stubs.
//!
//! A [`StubResponse`] carries the status, headers and body of a stub
//! together with the delay to apply before the body is written. When it is
//! turned into an HTTP response the status line and headers go out at once
//! and only the body is held back. The wait is a timer inside the body
//! stream, so it never occupies a worker thread.

use crate::stub::StubDefinition;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::time::Duration;
use tracing::warn;

/// Body type produced for the transport.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Outgoing response description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
    /// Time to wait before the body is written.
    pub delay: Duration,
}

impl StubResponse {
    /// The response for a request no stub accepts: 501, no headers, no body.
    pub fn not_implemented() -> Self {
        Self::bare(501)
    }

    /// The response used when dispatch itself fails unexpectedly.
    pub fn internal_error() -> Self {
        Self::bare(500)
    }

    fn bare(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: None,
            delay: Duration::ZERO,
        }
    }

    /// Convert into an HTTP response. A non-zero delay defers the body only.
    pub fn into_http(self) -> Response<ResponseBody> {
        let body = match self.body {
            None => Empty::<Bytes>::new().boxed_unsync(),
            Some(bytes) if self.delay.is_zero() => Full::new(bytes).boxed_unsync(),
            Some(bytes) => deferred_body(bytes, self.delay),
        };

        let mut response = Response::new(body);
        *response.status_mut() =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        for (name, value) in &self.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => warn!(header = %name, "Skipping invalid response header"),
            }
        }

        response
    }
}

fn deferred_body(bytes: Bytes, delay: Duration) -> ResponseBody {
    let frames = futures::stream::once(async move {
        tokio::time::sleep(delay).await;
        Ok::<_, Infallible>(Frame::data(bytes))
    });
    StreamBody::new(frames).boxed_unsync()
}

/// Builds responses for winning stubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseBuilder {
    default_delay: Duration,
}

impl ResponseBuilder {
    /// `default_delay` applies to stubs without a `stub-delay` header.
    pub fn new(default_delay: Duration) -> Self {
        Self { default_delay }
    }

    pub fn default_delay(&self) -> Duration {
        self.default_delay
    }

    pub fn build(&self, stub: &StubDefinition) -> StubResponse {
        StubResponse {
            status: stub.response_status(),
            headers: stub.response_headers().clone(),
            body: stub.response_body().cloned(),
            delay: stub.delay().unwrap_or(self.default_delay),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::Method;
    use tokio::time::Instant;

    const BODY: &str = "{\n\"asdf\" : \"adsfasd\"\n}\n";

    fn stub_with(headers: &[(&str, &str)]) -> StubDefinition {
        let mut builder = StubDefinition::builder(Method::parse("GET").unwrap(), "test/path/expres")
            .status(200)
            .body(BODY);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_build_copies_stub_response() {
        let stub = stub_with(&[("Content-Type", "application/json")]);
        let response = ResponseBuilder::new(Duration::from_millis(500)).build(&stub);

        assert_eq!(response.status, 200);
        assert_eq!(response.headers["Content-Type"], "application/json");
        assert_eq!(response.body.as_deref(), Some(BODY.as_bytes()));
        assert_eq!(response.delay, Duration::from_millis(500));
    }

    #[test]
    fn test_directive_headers_never_emitted() {
        let stub = stub_with(&[
            ("Content-Type", "application/json"),
            ("stub-only-if", "variable1=value1"),
            ("stub-set", "variable2=value2"),
            ("stub-delay", "0"),
        ]);
        let response = ResponseBuilder::default().build(&stub);

        assert_eq!(response.headers.len(), 1);
        assert!(!response.headers.contains_key("stub-only-if"));
        assert!(!response.headers.contains_key("stub-set"));
        assert!(!response.headers.contains_key("stub-delay"));

        let http = response.into_http();
        assert!(http.headers().get("stub-only-if").is_none());
        assert!(http.headers().get("stub-set").is_none());
        assert!(http.headers().get("stub-delay").is_none());
    }

    #[test]
    fn test_stub_delay_overrides_default() {
        let stub = stub_with(&[("stub-delay", "0")]);
        let response = ResponseBuilder::new(Duration::from_secs(5)).build(&stub);
        assert_eq!(response.delay, Duration::ZERO);
    }

    #[test]
    fn test_not_implemented() {
        let response = StubResponse::not_implemented();
        assert_eq!(response.status, 501);
        assert!(response.headers.is_empty());
        assert!(response.body.is_none());

        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::NOT_IMPLEMENTED);
        assert!(http.headers().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_body() {
        let response = ResponseBuilder::default().build(&stub_with(&[]));
        let http = response.into_http();

        let body = http.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_delayed_body_written_after_delay() {
        let delay = Duration::from_millis(200);
        let response = ResponseBuilder::new(delay).build(&stub_with(&[
            ("Content-Type", "application/json"),
        ]));

        let started = Instant::now();
        let http = response.into_http();
        assert_eq!(http.status(), StatusCode::OK);
        assert_eq!(http.headers()["content-type"], "application/json");
        assert!(started.elapsed() < delay);

        let body = http.into_body().collect().await.unwrap().to_bytes();
        assert!(started.elapsed() >= delay);
        assert_eq!(body, BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_absent_body_ignores_delay() {
        let stub = StubDefinition::builder(Method::Any, "empty")
            .status(204)
            .header("stub-delay", "10")
            .build()
            .unwrap();
        let http = ResponseBuilder::default().build(&stub).into_http();

        let body = http.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
