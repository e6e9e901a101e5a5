//! Response handling.
//!
//! Backend responses are streamed back with their status and headers intact,
//! minus hop-by-hop headers.

use axum::{body::Body, http::Response as HttpResponse, response::Response};
use hyper::body::Incoming;

use crate::http::request::strip_hop_by_hop;

/// Convert a backend response into a gateway response without buffering.
pub fn from_upstream(response: HttpResponse<Incoming>) -> Response {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
