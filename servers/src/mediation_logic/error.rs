use axum::{
    Json,
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use lib_mediation::MediationError;
use serde_json::json;
use tracing::{error, warn};

/// # Application Error
///
/// Everything a handler can fail with. Engine errors keep their kind so the
/// status code follows it; request decoding failures are the caller's fault.
#[derive(Debug)]
pub enum AppError {
    /// Error returned by one of the mediation engines.
    Mediation(MediationError),
    /// The request body is not the expected JSON document.
    InvalidBody(JsonRejection),
    /// The query string could not be decoded.
    InvalidQuery(QueryRejection),
}

impl From<MediationError> for AppError {
    fn from(err: MediationError) -> Self {
        AppError::Mediation(err)
    }
}

impl IntoResponse for AppError {
    /// Converts an `AppError` into an `axum::response::Response`, providing
    /// appropriate HTTP status codes and JSON error bodies to the client.
    fn into_response(self) -> Response {
        let (status, error_json) = match self {
            AppError::Mediation(err @ MediationError::Validation { .. }) => {
                warn!("Validation error: {}", err);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error_type": "ValidationError",
                        "message": "The request is missing required parameters or networks.",
                        "detail": err.to_string()
                    }),
                )
            }
            AppError::Mediation(err @ MediationError::Storage { .. }) => {
                error!("Storage error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error_type": "StorageError",
                        "message": "Failed to access priority lists. The database might be unavailable.",
                        "detail": err.to_string()
                    }),
                )
            }
            AppError::Mediation(err @ MediationError::Timeout { .. }) => {
                error!("Timeout: {}", err);
                (
                    StatusCode::GATEWAY_TIMEOUT,
                    json!({
                        "error_type": "Timeout",
                        "message": "The database did not answer in time.",
                        "detail": err.to_string()
                    }),
                )
            }
            AppError::InvalidBody(rejection) => {
                warn!("Request body rejected: {}", rejection);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error_type": "InvalidRequestBody",
                        "message": "Request body must be {\"networks\": [{\"networkName\": string, \"score\": number}, ...]}.",
                        "detail": rejection.body_text()
                    }),
                )
            }
            AppError::InvalidQuery(rejection) => {
                warn!("Query string rejected: {}", rejection);
                (
                    StatusCode::BAD_REQUEST,
                    json!({
                        "error_type": "InvalidQuery",
                        "message": "Query string could not be decoded.",
                        "detail": rejection.body_text()
                    }),
                )
            }
        };
        (status, Json(error_json)).into_response()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Mediation(e) => write!(f, "{}", e),
            AppError::InvalidBody(e) => write!(f, "Invalid request body: {}", e),
            AppError::InvalidQuery(e) => write!(f, "Invalid query string: {}", e),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Mediation(e) => Some(e),
            AppError::InvalidBody(e) => Some(e),
            AppError::InvalidQuery(e) => Some(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_follows_error_kind() {
        let cases = [
            (
                MediationError::validation("networks", "must not be empty"),
                StatusCode::BAD_REQUEST,
            ),
            (
                MediationError::storage("commit", "connection reset"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                MediationError::Timeout {
                    operation: "upsert",
                    after: Duration::from_secs(5),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }
}
