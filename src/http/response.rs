//! Response handling and transformation.
//!
//! # Responsibilities
//! - Hand instance responses back to the client, streaming the body
//! - Strip hop-by-hop headers from instance responses
//! - Map proxy errors to HTTP status codes with a JSON body
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - The instance stays counted as in flight until its body is done
//! - Error responses carry a machine-readable `X-Proxy-Error` header

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response as HttpResponse};
use axum::response::{IntoResponse, Response};
use axum::{BoxError, Json};
use hyper::body::{Body as HttpBody, Bytes, Frame, Incoming, SizeHint};
use serde::Serialize;
use tokio::time::{Instant, Sleep};

use crate::error::ProxyError;
use crate::http::headers::strip_hop_by_hop;
use crate::load_balancer::RequestGuard;

pub const X_PROXY_ERROR: HeaderName = HeaderName::from_static("x-proxy-error");

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();
        response
            .headers_mut()
            .insert(X_PROXY_ERROR, HeaderValue::from_static(code));
        response
    }
}

/// Instance response body streamed to the client.
///
/// Holds the instance's request guard until the body is dropped, and fails
/// the stream when the instance sends nothing for `idle_timeout`.
pub struct UpstreamBody<B> {
    inner: Pin<Box<B>>,
    idle_timeout: Duration,
    deadline: Pin<Box<Sleep>>,
    _in_flight: RequestGuard,
}

impl<B> UpstreamBody<B> {
    pub fn new(inner: B, in_flight: RequestGuard, idle_timeout: Duration) -> Self {
        Self {
            inner: Box::pin(inner),
            idle_timeout,
            deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            _in_flight: in_flight,
        }
    }
}

impl<B> HttpBody for UpstreamBody<B>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, BoxError>>> {
        let this = self.get_mut();
        match this.inner.as_mut().poll_frame(cx) {
            Poll::Ready(frame) => {
                let next = Instant::now() + this.idle_timeout;
                this.deadline.as_mut().reset(next);
                Poll::Ready(frame.map(|result| result.map_err(Into::into)))
            }
            Poll::Pending => match this.deadline.as_mut().poll(cx) {
                Poll::Ready(()) => {
                    let error = io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("upstream body idle for {:?}", this.idle_timeout),
                    );
                    Poll::Ready(Some(Err(error.into())))
                }
                Poll::Pending => Poll::Pending,
            },
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// Convert an instance response into the client response.
///
/// `in_flight` is released once the client response body finishes or is
/// dropped.
pub fn from_upstream(
    response: HttpResponse<Incoming>,
    in_flight: RequestGuard,
    idle_timeout: Duration,
) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    let body = UpstreamBody::new(body, in_flight, idle_timeout);
    Response::from_parts(parts, Body::new(body))
}
