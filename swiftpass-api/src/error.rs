use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use swiftpass_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    BadRequest { code: &'static str, message: String },
    NotFound { code: &'static str, message: String },
    Conflict { code: &'static str, message: String },
    GatewayFailure(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::BadRequest { code, message } => (StatusCode::BAD_REQUEST, code, message),
            AppError::NotFound { code, message } => (StatusCode::NOT_FOUND, code, message),
            AppError::Conflict { code, message } => (StatusCode::CONFLICT, code, message),
            AppError::GatewayFailure(msg) => {
                tracing::error!("Gateway failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "GATEWAY_ERROR",
                    "Payment gateway unavailable".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::TripNotFound(_) => AppError::NotFound {
                code: "TRIP_NOT_FOUND",
                message,
            },
            CoreError::InsufficientSeats { .. } => AppError::Conflict {
                code: "NO_SEATS_LEFT",
                message,
            },
            CoreError::TicketNotFound(_) => AppError::NotFound {
                code: "TICKET_NOT_FOUND",
                message,
            },
            CoreError::PaymentNotFound(_) => AppError::NotFound {
                code: "PAYMENT_REFERENCE_NOT_FOUND",
                message,
            },
            CoreError::Gateway(msg) => AppError::GatewayFailure(msg),
            CoreError::DuplicateReference(_) | CoreError::Store(_) => AppError::Internal(message),
        }
    }
}
