use super::types::Decision;
use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub const LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Create a 429 Too Many Requests response with rate limit headers
pub fn rate_limit_response(decision: &Decision) -> Response {
    let mut headers = HeaderMap::new();
    insert_rate_limit_headers(&mut headers, decision);

    let retry_after = decision.retry_after().unwrap_or(decision.reset_seconds);
    headers.insert(axum::http::header::RETRY_AFTER, HeaderValue::from(retry_after));

    let body = json!({
        "error": "Rate limit exceeded",
        "status": 429,
        "limit": decision.limit,
        "remaining": decision.remaining,
        "reset_after": decision.reset_seconds,
        "retry_after": retry_after,
    });

    (StatusCode::TOO_MANY_REQUESTS, headers, Json(body)).into_response()
}

/// Add rate limit headers to a successful response
pub fn add_rate_limit_headers(mut response: Response, decision: &Decision) -> Response {
    insert_rate_limit_headers(response.headers_mut(), decision);
    response
}

fn insert_rate_limit_headers(headers: &mut HeaderMap, decision: &Decision) {
    headers.insert(
        HeaderName::from_static(LIMIT_HEADER),
        HeaderValue::from(decision.limit),
    );
    headers.insert(
        HeaderName::from_static(REMAINING_HEADER),
        HeaderValue::from(decision.remaining),
    );
    headers.insert(
        HeaderName::from_static(RESET_HEADER),
        HeaderValue::from(decision.reset_seconds),
    );
}
