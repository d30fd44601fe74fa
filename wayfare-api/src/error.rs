use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use wayfare_core::{BookingError, StoreError};

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    NotFoundError(String),
    ValidationError(String),
    InternalServerError(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Booking(err) => match err {
                BookingError::SeatUnavailable { .. } | BookingError::ConfirmationRejected { .. } => {
                    StatusCode::CONFLICT
                }
                BookingError::ReservationNotFound(_) => StatusCode::NOT_FOUND,
                BookingError::InvalidRequest(_) | BookingError::UnsupportedReissue(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                BookingError::CarrierTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                BookingError::CarrierProtocolError(_) => StatusCode::BAD_GATEWAY,
                BookingError::CacheWriteFailure(_) | BookingError::CacheReadFailure(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            AppError::NotFoundError(_) => StatusCode::NOT_FOUND,
            AppError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                "Internal Server Error".to_string()
            }
            AppError::Booking(err) if status == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("Internal Server Error: {}", err);
                "Internal Server Error".to_string()
            }
            AppError::Booking(err) => err.to_string(),
            AppError::NotFoundError(msg) | AppError::ValidationError(msg) => msg,
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}
