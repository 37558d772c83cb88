//! Reverse proxy with per-upstream circuit breakers.
//!
//! Failure accounting: upstream 5xx, transport errors and timeouts count
//! against the breaker; 4xx responses do not. While a breaker is OPEN the
//! gateway answers 503 without contacting the upstream. Upstream responses,
//! including 5xx, are forwarded verbatim (minus hop-by-hop headers); only
//! gateway-generated failures use the standard error envelope, which always
//! carries the correlation id.

use std::collections::BTreeMap;
use std::sync::Arc;

use actix_web::http::header::{HeaderName as ActixHeaderName, HeaderValue as ActixHeaderValue};
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse};
use dashmap::DashMap;
use error_types::ErrorResponse;
use resilience::{CircuitBreaker, CircuitBreakerError};
use tracing::{error, warn};
use trace_context::{TraceContext, CORRELATION_ID_HEADER};

use crate::routes::RouteTable;

/// Hop-by-hop headers are connection-scoped and never forwarded.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.contains(&name)
}

/// Upstream response captured for forwarding.
#[derive(Debug)]
pub struct UpstreamReply {
    pub status: u16,
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream read timed out")]
    Timeout,

    #[error("transport failure: {0}")]
    Transport(String),

    /// 5xx from the upstream; forwarded to the client but counted as a
    /// breaker failure.
    #[error("upstream returned {}", .0.status)]
    ServerError(UpstreamReply),
}

pub struct GatewayState {
    pub client: reqwest::Client,
    pub routes: RouteTable,
    pub breakers: DashMap<String, Arc<CircuitBreaker>>,
}

/// Catch-all handler proxying to the resolved upstream.
pub async fn proxy(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<GatewayState>,
) -> HttpResponse {
    let correlation_id = actix_middleware::get_correlation_id(&req)
        .unwrap_or_else(trace_context::new_correlation_id);

    let path = req.uri().path().to_string();
    let Some(route) = state.routes.resolve(&path) else {
        return HttpResponse::NotFound().json(ErrorResponse::new(
            "NOT_FOUND",
            format!("no upstream serves {path}"),
            Some(correlation_id),
        ));
    };

    let Some(breaker) = state
        .breakers
        .get(&route.name)
        .map(|entry| Arc::clone(entry.value()))
    else {
        error!(upstream = %route.name, "no circuit breaker configured");
        return HttpResponse::InternalServerError().json(ErrorResponse::new(
            "INTERNAL_ERROR",
            format!("no circuit breaker configured for upstream '{}'", route.name),
            Some(correlation_id),
        ));
    };

    let url = match req.uri().path_and_query() {
        Some(path_and_query) => format!("{}{}", route.upstream, path_and_query.as_str()),
        None => format!("{}{}", route.upstream, path),
    };

    let headers = forward_headers(&req, &correlation_id);
    let method = reqwest::Method::from_bytes(req.method().as_str().as_bytes())
        .unwrap_or(reqwest::Method::GET);

    let outcome = breaker
        .call(|| {
            let client = state.client.clone();
            let url = url.clone();
            let method = method.clone();
            let headers = headers.clone();
            let body = body.clone();
            async move { send_upstream(client, method, url, headers, body).await }
        })
        .await;

    match outcome {
        Ok(reply) => forward_reply(reply),
        Err(CircuitBreakerError::Open(name)) => {
            warn!(upstream = %name, "circuit open, short-circuiting");
            HttpResponse::ServiceUnavailable().json(ErrorResponse::new(
                "SERVICE_UNAVAILABLE",
                format!("service '{name}' is temporarily unavailable (circuit open)"),
                Some(correlation_id),
            ))
        }
        Err(CircuitBreakerError::Inner(UpstreamError::ServerError(reply))) => forward_reply(reply),
        Err(CircuitBreakerError::Inner(UpstreamError::Timeout)) => {
            error!(upstream = %route.name, "upstream timed out");
            HttpResponse::GatewayTimeout().json(ErrorResponse::new(
                "GATEWAY_TIMEOUT",
                format!("service '{}' timed out", route.name),
                Some(correlation_id),
            ))
        }
        Err(CircuitBreakerError::Inner(UpstreamError::Transport(reason))) => {
            error!(upstream = %route.name, reason = %reason, "upstream transport failure");
            HttpResponse::BadGateway().json(ErrorResponse::new(
                "BAD_GATEWAY",
                format!("failed to communicate with service '{}'", route.name),
                Some(correlation_id),
            ))
        }
    }
}

async fn send_upstream(
    client: reqwest::Client,
    method: reqwest::Method,
    url: String,
    headers: reqwest::header::HeaderMap,
    body: web::Bytes,
) -> Result<UpstreamReply, UpstreamError> {
    let response = client
        .request(method, &url)
        .headers(headers)
        .body(body.to_vec())
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Transport(e.to_string())
            }
        })?;

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
        .collect();
    let body = response
        .bytes()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout
            } else {
                UpstreamError::Transport(e.to_string())
            }
        })?
        .to_vec();

    let reply = UpstreamReply {
        status,
        headers,
        body,
    };

    if reply.status >= 500 {
        Err(UpstreamError::ServerError(reply))
    } else {
        Ok(reply)
    }
}

/// Copy request headers minus hop-by-hop and `Host`, stamp the correlation
/// id and inject B3 trace context for the upstream.
fn forward_headers(req: &HttpRequest, correlation_id: &str) -> reqwest::header::HeaderMap {
    let mut headers = reqwest::header::HeaderMap::new();

    for (name, value) in req.headers() {
        let lower = name.as_str().to_ascii_lowercase();
        if is_hop_by_hop(&lower) || lower == "host" || lower == CORRELATION_ID_HEADER {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.append(name, value);
        }
    }

    if let Ok(value) = reqwest::header::HeaderValue::from_str(correlation_id) {
        headers.insert(
            reqwest::header::HeaderName::from_static(CORRELATION_ID_HEADER),
            value,
        );
    }

    // Continue the caller's trace when present, otherwise open a new one.
    let incoming = TraceContext::extract(|key| {
        req.headers()
            .get(key)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    });
    let mut carrier = BTreeMap::new();
    TraceContext::continue_or_root(incoming.as_ref()).inject(&mut carrier);
    for (key, value) in carrier {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(key.as_bytes()),
            reqwest::header::HeaderValue::from_str(&value),
        ) {
            headers.insert(name, value);
        }
    }

    headers
}

fn forward_reply(reply: UpstreamReply) -> HttpResponse {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    let mut builder = HttpResponse::build(status);

    for (name, value) in &reply.headers {
        let lower = name.to_ascii_lowercase();
        // actix recomputes framing headers for the new body.
        if is_hop_by_hop(&lower) || lower == "content-length" {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            ActixHeaderName::from_bytes(name.as_bytes()),
            ActixHeaderValue::from_bytes(value),
        ) {
            builder.insert_header((name, value));
        }
    }

    builder.body(reply.body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hop_by_hop_headers_are_filtered() {
        assert!(is_hop_by_hop("connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(!is_hop_by_hop("content-type"));
        assert!(!is_hop_by_hop("authorization"));
    }

    #[test]
    fn forwarded_5xx_keeps_status_and_body() {
        let reply = UpstreamReply {
            status: 502,
            headers: vec![("content-type".into(), b"application/json".to_vec())],
            body: b"{\"error\":\"boom\"}".to_vec(),
        };
        let response = forward_reply(reply);
        assert_eq!(response.status().as_u16(), 502);
    }

    #[test]
    fn unknown_status_degrades_to_bad_gateway() {
        let reply = UpstreamReply {
            status: 1,
            headers: vec![],
            body: vec![],
        };
        let response = forward_reply(reply);
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
