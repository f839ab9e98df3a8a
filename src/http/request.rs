//! Request handling and transformation.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) unless the client sent one
//! - Extract routing-relevant information (host, path)
//! - Prepare request for forwarding to an instance
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - Body is streamed through, never buffered
//! - Original request preserved for logging; modified copy forwarded

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::header::{self, HeaderName, HeaderValue};
use axum::http::uri::{PathAndQuery, Uri};
use axum::http::Request;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::config::Entrypoint;
use crate::http::headers::{apply_forwarded_headers, strip_hop_by_hop};

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Generates UUID v4 request IDs for `SetRequestIdLayer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

pub fn request_id<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

/// Host used for routing: the Host header, falling back to the URI authority.
pub fn request_host<B>(request: &Request<B>) -> String {
    request
        .headers()
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| request.uri().authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Rewrite a client request so it targets `address`.
pub fn upstream_request(
    request: Request<Body>,
    address: &str,
    peer: SocketAddr,
    entrypoint: Entrypoint,
) -> Result<Request<Body>, axum::http::Error> {
    let (mut parts, body) = request.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));
    parts.uri = Uri::builder()
        .scheme("http")
        .authority(address)
        .path_and_query(path_and_query)
        .build()?;

    strip_hop_by_hop(&mut parts.headers);
    apply_forwarded_headers(&mut parts.headers, peer.ip(), entrypoint);

    Ok(Request::from_parts(parts, body))
}
