use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type for quota operations
pub type Result<T> = std::result::Result<T, QuotaError>;

/// Quota and rate limiting error types
#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid rate limit configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Counter at key {key} holds a non-numeric value: {value}")]
    CorruptCounter { key: String, value: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Quota exceeded for {scope}, retry after {retry_after} seconds")]
    QuotaExceeded { scope: String, retry_after: u64 },

    #[error("Feature not available on current plan: {0}")]
    FeatureNotAvailable(String),

    #[error("File of {size_mb} MB exceeds the {max_mb} MB plan limit")]
    FileTooLarge { size_mb: u64, max_mb: u32 },

    #[error("{count} files exceeds the plan limit of {max} per session")]
    TooManyFiles { count: u32, max: u32 },

    #[error("Counter store rejected command: {0}")]
    StoreCommand(String),
}

impl QuotaError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            QuotaError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            QuotaError::InvalidConfiguration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotaError::CorruptCounter { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            QuotaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            QuotaError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            QuotaError::FeatureNotAvailable(_) => StatusCode::FORBIDDEN,
            QuotaError::FileTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            QuotaError::TooManyFiles { .. } => StatusCode::BAD_REQUEST,
            QuotaError::StoreCommand(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the caller may retry the same action later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QuotaError::StoreUnavailable(_) | QuotaError::QuotaExceeded { .. }
        )
    }
}

/// Only transport failures count as the store being unavailable. Server
/// replies such as WRONGTYPE surface as `StoreCommand` and are never
/// absorbed by a fail-open policy.
impl From<redis::RedisError> for QuotaError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_timeout()
            || err.is_connection_refusal()
            || err.is_connection_dropped()
        {
            QuotaError::StoreUnavailable(err.to_string())
        } else {
            QuotaError::StoreCommand(err.to_string())
        }
    }
}

impl IntoResponse for QuotaError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        match &self {
            QuotaError::FeatureNotAvailable(feature) => {
                body["feature"] = json!(feature);
                body["upgrade_required"] = json!(true);
            }
            QuotaError::QuotaExceeded { retry_after, .. } => {
                body["retry_after"] = json!(retry_after);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        if let QuotaError::QuotaExceeded { retry_after, .. } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            QuotaError::StoreUnavailable("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            QuotaError::FeatureNotAvailable("pivot_tables".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            QuotaError::QuotaExceeded {
                scope: "login".to_string(),
                retry_after: 30
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            QuotaError::FileTooLarge {
                size_mb: 20,
                max_mb: 5
            }
            .status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_error_display() {
        let err = QuotaError::QuotaExceeded {
            scope: "login".to_string(),
            retry_after: 42,
        };
        assert_eq!(
            err.to_string(),
            "Quota exceeded for login, retry after 42 seconds"
        );
    }

    #[test]
    fn test_retryable() {
        assert!(QuotaError::StoreUnavailable("timeout".to_string()).is_retryable());
        assert!(!QuotaError::InvalidConfiguration("zero".to_string()).is_retryable());
        assert!(!QuotaError::FeatureNotAvailable("x".to_string()).is_retryable());
        assert!(!QuotaError::StoreCommand("WRONGTYPE".to_string()).is_retryable());
    }

    #[test]
    fn test_redis_transport_errors_are_unavailable() {
        let refused = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(matches!(
            QuotaError::from(refused),
            QuotaError::StoreUnavailable(_)
        ));

        let timed_out = redis::RedisError::from(std::io::Error::new(
            std::io::ErrorKind::TimedOut,
            "read timed out",
        ));
        assert!(matches!(
            QuotaError::from(timed_out),
            QuotaError::StoreUnavailable(_)
        ));
    }

    #[test]
    fn test_redis_server_replies_are_command_errors() {
        let wrong_type = redis::RedisError::from((
            redis::ErrorKind::TypeError,
            "WRONGTYPE Operation against a key holding the wrong kind of value",
        ));
        let err = QuotaError::from(wrong_type);
        assert!(matches!(err, QuotaError::StoreCommand(_)));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let bad_expire = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "invalid expire time in 'set' command",
        ));
        assert!(matches!(
            QuotaError::from(bad_expire),
            QuotaError::StoreCommand(_)
        ));
    }

    #[test]
    fn test_quota_exceeded_response_sets_retry_after() {
        let response = QuotaError::QuotaExceeded {
            scope: "signup".to_string(),
            retry_after: 120,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "120");
    }
}
