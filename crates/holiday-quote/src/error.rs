use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use crate::workflows::booking::pricing::PricingError;
use crate::workflows::booking::service::BookingServiceError;
use crate::workflows::booking::store::RepositoryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Config(ConfigError),
    Telemetry(TelemetryError),
    Io(std::io::Error),
    Server(axum::Error),
    Booking(BookingServiceError),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Booking(err) => booking_status(err),
            AppError::Config(_)
            | AppError::Telemetry(_)
            | AppError::Io(_)
            | AppError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn booking_status(err: &BookingServiceError) -> StatusCode {
    match err {
        BookingServiceError::Validation(_)
        | BookingServiceError::Stay(_)
        | BookingServiceError::Pricing(PricingError::MisalignedWeekStart(_))
        | BookingServiceError::Pricing(PricingError::NegativePrice(_))
        | BookingServiceError::Pricing(PricingError::SameYear(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        BookingServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        BookingServiceError::Repository(RepositoryError::Conflict)
        | BookingServiceError::AvailabilityConflict { .. } => StatusCode::CONFLICT,
        BookingServiceError::Repository(RepositoryError::Timeout { .. })
        | BookingServiceError::Repository(RepositoryError::Offline)
        | BookingServiceError::Pricing(PricingError::Repository(_)) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        BookingServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Telemetry(err) => write!(f, "telemetry error: {}", err),
            AppError::Io(err) => write!(f, "io error: {}", err),
            AppError::Server(err) => write!(f, "server error: {}", err),
            AppError::Booking(err) => write!(f, "booking error: {}", err),
        }
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Telemetry(err) => Some(err),
            AppError::Io(err) => Some(err),
            AppError::Server(err) => Some(err),
            AppError::Booking(err) => Some(err),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

impl From<ConfigError> for AppError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<TelemetryError> for AppError {
    fn from(value: TelemetryError) -> Self {
        Self::Telemetry(value)
    }
}

impl From<std::io::Error> for AppError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<axum::Error> for AppError {
    fn from(value: axum::Error) -> Self {
        Self::Server(value)
    }
}

impl From<BookingServiceError> for AppError {
    fn from(value: BookingServiceError) -> Self {
        Self::Booking(value)
    }
}
