//! Upstream request construction.
//!
//! # Responsibilities
//! - Strip the `/v1/proxy/{service}` prefix to find the forwarded path
//! - Join the forwarded path and query onto a backend base URL
//! - Copy inbound headers except `host` and hop-by-hop headers
//! - Buffer the inbound body within a size limit and a deadline
//!
//! # Design Decisions
//! - The forwarded path is taken from the raw URI so percent-encoding survives
//! - `host` is dropped; the client derives it from the upstream URI

use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderName, Uri};
use http_body_util::LengthLimitError;
use url::Url;

use crate::http::error::GatewayError;

/// Route prefix under which services are exposed.
pub const PROXY_PREFIX: &str = "/v1/proxy/";

/// Headers meaningful only for a single connection.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Remove hop-by-hop headers in place.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Path remaining after `/v1/proxy/{service}/`, without a leading slash.
///
/// `/v1/proxy/orders/items/7` → `items/7`; `/v1/proxy/orders` → ``.
pub fn forward_path(raw_path: &str) -> &str {
    raw_path
        .strip_prefix(PROXY_PREFIX)
        .and_then(|rest| rest.split_once('/'))
        .map(|(_, remainder)| remainder)
        .unwrap_or("")
}

/// Build the upstream URI: `{base}/{path}` (or `{base}`) plus the query.
pub fn upstream_uri(base: &Url, path: &str, query: Option<&str>) -> Result<Uri, axum::http::Error> {
    let mut target = if path.is_empty() {
        base.as_str().to_string()
    } else {
        format!("{}/{}", base.as_str().trim_end_matches('/'), path)
    };
    if let Some(query) = query.filter(|q| !q.is_empty()) {
        target.push('?');
        target.push_str(query);
    }
    Ok(Uri::try_from(target)?)
}

/// Headers to send upstream.
pub fn upstream_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len());
    for (name, value) in inbound.iter() {
        if *name == header::HOST || is_hop_by_hop(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}

/// Buffer the inbound body before a backend is selected.
///
/// Over `limit` bytes is 413, slower than `deadline` is 408, any other read
/// failure is 400.
pub async fn read_body(body: Body, limit: usize, deadline: Duration) -> Result<Bytes, GatewayError> {
    match tokio::time::timeout(deadline, axum::body::to_bytes(body, limit)).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(e)) if exceeds_limit(&e) => Err(GatewayError::PayloadTooLarge(limit)),
        Ok(Err(e)) => Err(GatewayError::Body(e.to_string())),
        Err(_) => Err(GatewayError::BodyTimeout(deadline.as_secs())),
    }
}

fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_forward_path() {
        assert_eq!(forward_path("/v1/proxy/orders/items/7"), "items/7");
        assert_eq!(forward_path("/v1/proxy/orders/test"), "test");
        assert_eq!(forward_path("/v1/proxy/orders"), "");
        assert_eq!(forward_path("/v1/proxy/orders/"), "");
        assert_eq!(forward_path("/v1/proxy/orders/a%20b"), "a%20b");
        assert_eq!(forward_path("/elsewhere"), "");
    }

    #[test]
    fn test_upstream_uri() {
        let base = Url::parse("http://127.0.0.1:8001").unwrap();
        assert_eq!(
            upstream_uri(&base, "test", None).unwrap().to_string(),
            "http://127.0.0.1:8001/test"
        );
        assert_eq!(upstream_uri(&base, "", None).unwrap().to_string(), "http://127.0.0.1:8001/");
        assert_eq!(
            upstream_uri(&base, "items", Some("page=2&size=10")).unwrap().to_string(),
            "http://127.0.0.1:8001/items?page=2&size=10"
        );

        let with_path = Url::parse("http://127.0.0.1:8001/api/").unwrap();
        assert_eq!(
            upstream_uri(&with_path, "v2/users", Some("")).unwrap().to_string(),
            "http://127.0.0.1:8001/api/v2/users"
        );
    }

    #[test]
    fn test_upstream_headers() {
        let mut inbound = HeaderMap::new();
        inbound.insert(header::HOST, HeaderValue::from_static("gateway.local"));
        inbound.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
        inbound.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        inbound.append("x-trace", HeaderValue::from_static("a"));
        inbound.append("x-trace", HeaderValue::from_static("b"));

        let headers = upstream_headers(&inbound);
        assert!(headers.get(header::HOST).is_none());
        assert!(headers.get(header::CONNECTION).is_none());
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers.get_all("x-trace").iter().count(), 2);
    }

    #[tokio::test]
    async fn test_read_body_within_limit() {
        let bytes = read_body(Body::from("hello"), 16, Duration::from_secs(1)).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
    }

    #[tokio::test]
    async fn test_read_body_over_limit_is_413() {
        let err = read_body(Body::from("0123456789"), 4, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::PayloadTooLarge(4)));
        assert_eq!(err.status(), axum::http::StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_read_body_stream_error_is_400() {
        let chunks: Vec<Result<&'static str, std::io::Error>> = vec![
            Ok("par"),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));
        let err = read_body(body, 1024, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, GatewayError::Body(_)));
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }
}
