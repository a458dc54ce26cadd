// HTTP API error taxonomy and client-safe error envelope
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

/// Envelope kind for the separately-handled rate limit condition.
///
/// Rate limiting is not part of the `ApiError` taxonomy because it carries a
/// retryable semantic (`retry_after`) the other kinds do not have. The rate
/// limit middleware builds its envelope directly via
/// [`ErrorEnvelope::rate_limited`].
pub const RATE_LIMIT_KIND: &str = "RATE_LIMIT_EXCEEDED";

/// A single field-level validation failure.
///
/// `field` is the dotted location path reported by the validation layer,
/// `kind` the validation-layer type tag (serialized as `type`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(
        field: impl Into<String>,
        message: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: kind.into(),
        }
    }
}

/// The externally visible failure representation.
///
/// Field names and the enumerated `error` kind strings are part of the
/// external API contract and must not change silently. `request_id` is
/// always present (null when no correlation id was ever attached).
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    pub request_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorEnvelope {
    /// Envelope for the rate limit condition, with a retry hint in seconds.
    pub fn rate_limited(request_id: Option<String>, retry_after: u64) -> Self {
        Self {
            error: RATE_LIMIT_KIND,
            error_code: None,
            detail: "Rate limit exceeded. Please try again later.".to_string(),
            errors: None,
            request_id,
            retry_after: Some(retry_after),
        }
    }
}

/// Classified API failure.
///
/// Downstream layers construct one of these variants directly; the error
/// handler middleware renders the envelope and logs at the mapped level.
/// The enum is total: anything that is not one of the expected variants
/// belongs in `Internal`, whose message is logged but never exposed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Framework-level HTTP exception with an explicit status and detail.
    #[error("{detail}")]
    Http { status: u16, detail: String },

    /// Malformed or missing fields before the handler ran.
    #[error("Request validation failed")]
    RequestValidation(Vec<FieldError>),

    /// Structured-data constraint violation during processing.
    #[error("Data validation failed")]
    DataValidation(Vec<FieldError>),

    /// Expected business-rule failure raised by handler-layer code.
    #[error("{message}")]
    BusinessLogic {
        message: String,
        error_code: Option<String>,
    },

    /// Persistence-layer failure. The operation name is logged, not exposed.
    #[error("{message}")]
    Database {
        message: String,
        operation: Option<String>,
    },

    /// Upstream service failure. The upstream status is logged, not exposed.
    #[error("{message}")]
    ExternalService {
        message: String,
        service: Option<String>,
        status: Option<u16>,
    },

    /// Unclassified fault. Only a generic detail reaches the client.
    #[error("{0}")]
    Internal(String),
}

// Constructor helpers (similar to the original exception classes)
impl ApiError {
    pub fn http(status: StatusCode, detail: impl Into<String>) -> Self {
        ApiError::Http {
            status: status.as_u16(),
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::http(StatusCode::BAD_REQUEST, detail)
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::http(StatusCode::NOT_FOUND, detail)
    }

    pub fn request_validation(errors: Vec<FieldError>) -> Self {
        ApiError::RequestValidation(errors)
    }

    pub fn data_validation(errors: Vec<FieldError>) -> Self {
        ApiError::DataValidation(errors)
    }

    pub fn business_logic(message: impl Into<String>, error_code: Option<&str>) -> Self {
        ApiError::BusinessLogic {
            message: message.into(),
            error_code: error_code.map(str::to_string),
        }
    }

    pub fn database(message: impl Into<String>, operation: Option<&str>) -> Self {
        ApiError::Database {
            message: message.into(),
            operation: operation.map(str::to_string),
        }
    }

    pub fn external_service(
        message: impl Into<String>,
        service: Option<&str>,
        status: Option<u16>,
    ) -> Self {
        ApiError::ExternalService {
            message: message.into(),
            service: service.map(str::to_string),
            status,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }
}

impl ApiError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Http { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }
            ApiError::RequestValidation(_) | ApiError::DataValidation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::BusinessLogic { .. } => StatusCode::BAD_REQUEST,
            ApiError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Fixed, externally-contracted error kind string.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Http { .. } => "HTTP_EXCEPTION",
            ApiError::RequestValidation(_) | ApiError::DataValidation(_) => "VALIDATION_ERROR",
            ApiError::BusinessLogic { .. } => "BUSINESS_LOGIC_ERROR",
            ApiError::Database { .. } => "DATABASE_ERROR",
            ApiError::ExternalService { .. } => "EXTERNAL_SERVICE_ERROR",
            ApiError::Internal(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Client-safe detail string. Internal messages never surface here.
    pub fn detail(&self) -> String {
        match self {
            ApiError::Http { detail, .. } => detail.clone(),
            ApiError::RequestValidation(_) => "Request validation failed".to_string(),
            ApiError::DataValidation(_) => "Data validation failed".to_string(),
            ApiError::BusinessLogic { message, .. } => message.clone(),
            ApiError::Database { .. } => "A database error occurred".to_string(),
            ApiError::ExternalService { service, .. } => format!(
                "External service ({}) is unavailable",
                service.as_deref().unwrap_or("unknown")
            ),
            ApiError::Internal(_) => "An internal server error occurred".to_string(),
        }
    }

    /// Build the client-facing envelope for this error.
    pub fn envelope(&self, request_id: Option<String>) -> ErrorEnvelope {
        let error_code = match self {
            ApiError::BusinessLogic { error_code, .. } => error_code.clone(),
            _ => None,
        };
        let errors = match self {
            ApiError::RequestValidation(errors) | ApiError::DataValidation(errors) => {
                Some(errors.clone())
            }
            _ => None,
        };

        ErrorEnvelope {
            error: self.kind(),
            error_code,
            detail: self.detail(),
            errors,
            request_id,
            retry_after: None,
        }
    }

    /// Log this error at the level mapped for its kind.
    ///
    /// Internal details (messages, operation names, upstream statuses) go to
    /// the log sink only, never into the envelope.
    pub fn log(&self, request_id: Option<&str>, method: &str, path: &str) {
        let request_id = request_id.unwrap_or("unset");
        match self {
            ApiError::Http { status, detail } => {
                tracing::warn!(
                    status_code = status,
                    detail = %detail,
                    request_id,
                    path,
                    method,
                    "HTTP exception occurred"
                );
            }
            ApiError::RequestValidation(errors) => {
                tracing::warn!(
                    errors = ?errors,
                    request_id,
                    path,
                    method,
                    "Request validation error"
                );
            }
            ApiError::DataValidation(errors) => {
                tracing::warn!(
                    errors = ?errors,
                    request_id,
                    path,
                    method,
                    "Data validation error"
                );
            }
            ApiError::BusinessLogic {
                message,
                error_code,
            } => {
                tracing::warn!(
                    error_code = error_code.as_deref(),
                    message = %message,
                    request_id,
                    path,
                    method,
                    "Business logic error"
                );
            }
            ApiError::Database { message, operation } => {
                tracing::error!(
                    operation = operation.as_deref(),
                    message = %message,
                    request_id,
                    path,
                    method,
                    "Database error"
                );
            }
            ApiError::ExternalService {
                message,
                service,
                status,
            } => {
                tracing::error!(
                    service = service.as_deref(),
                    upstream_status = status,
                    message = %message,
                    request_id,
                    path,
                    method,
                    "External service error"
                );
            }
            ApiError::Internal(message) => {
                // Full diagnostic detail goes to the log sink only
                let backtrace = std::backtrace::Backtrace::force_capture();
                tracing::error!(
                    error_message = %message,
                    backtrace = %backtrace,
                    request_id,
                    path,
                    method,
                    "Internal server error"
                );
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Render an envelope without a correlation id and stash the
        // classified error in the response extensions. The error handler
        // middleware re-renders with the request's correlation id and logs
        // at the mapped level.
        let status = self.status_code();
        let body = self.envelope(None);
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn business_logic_envelope_shape() {
        let err = ApiError::business_logic("duplicate entry", Some("DUP_001"));
        let envelope = err.envelope(Some("req-1".to_string()));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "error": "BUSINESS_LOGIC_ERROR",
                "error_code": "DUP_001",
                "detail": "duplicate entry",
                "request_id": "req-1",
            })
        );
    }

    #[test]
    fn database_error_hides_operation() {
        let err = ApiError::database("connection reset", Some("find_alerts"));
        let envelope = err.envelope(None);
        let text = serde_json::to_string(&envelope).unwrap();
        assert_eq!(envelope.detail, "A database error occurred");
        assert!(!text.contains("find_alerts"));
        assert!(!text.contains("connection reset"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn external_service_names_service_but_not_status() {
        let err = ApiError::external_service("timeout", Some("core-engine"), Some(503));
        let envelope = err.envelope(None);
        assert_eq!(envelope.error, "EXTERNAL_SERVICE_ERROR");
        assert!(envelope.detail.contains("core-engine"));
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(!text.contains("503"));
        assert!(!text.contains("timeout"));
    }

    #[test]
    fn internal_error_is_generic() {
        let err = ApiError::internal("index out of bounds at alerts.rs:42");
        let envelope = err.envelope(Some("req-9".to_string()));
        assert_eq!(envelope.error, "INTERNAL_SERVER_ERROR");
        assert_eq!(envelope.detail, "An internal server error occurred");
        let text = serde_json::to_string(&envelope).unwrap();
        assert!(!text.contains("alerts.rs"));
    }

    #[test]
    fn validation_errors_use_type_key_and_null_request_id() {
        let err = ApiError::request_validation(vec![FieldError::new(
            "body.name",
            "field required",
            "missing",
        )]);
        let value = serde_json::to_value(err.envelope(None)).unwrap();
        assert_eq!(value["error"], "VALIDATION_ERROR");
        assert_eq!(value["detail"], "Request validation failed");
        assert_eq!(value["errors"][0]["field"], "body.name");
        assert_eq!(value["errors"][0]["type"], "missing");
        assert!(value["request_id"].is_null());
    }

    #[test]
    fn internal_error_log_records_message_and_backtrace() {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        #[derive(Clone)]
        struct BufWriter(Arc<Mutex<Vec<u8>>>);

        impl Write for BufWriter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for BufWriter {
            type Writer = BufWriter;
            fn make_writer(&'a self) -> Self::Writer {
                self.clone()
            }
        }

        let sink = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BufWriter(sink.clone()))
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            ApiError::internal("index out of bounds").log(Some("req-7"), "GET", "/alerts");
        });

        let output = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Internal server error"));
        assert!(output.contains("index out of bounds"));
        assert!(output.contains("backtrace"));
        assert!(output.contains("req-7"));
    }

    #[test]
    fn rate_limit_envelope_carries_retry_after() {
        let envelope = ErrorEnvelope::rate_limited(Some("req-2".to_string()), 42);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["error"], "RATE_LIMIT_EXCEEDED");
        assert_eq!(value["retry_after"], 42);
    }
}
