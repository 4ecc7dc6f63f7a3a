use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::repository::StorageError;

/// A single rejected form field, reported back inline next to the input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Checks `value` lies in `[min, max]`, rejecting NaN as well.
pub fn check_range(field: &str, value: f64, min: f64, max: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < min || value > max {
        return Err(ValidationError::new(field, format!("must be between {min} and {max}")));
    }
    Ok(())
}

pub fn check_min(field: &str, value: f64, min: f64) -> Result<(), ValidationError> {
    if value.is_nan() || value < min {
        return Err(ValidationError::new(field, format!("must be at least {min}")));
    }
    Ok(())
}

pub fn check_student_id(student_id: &str) -> Result<(), ValidationError> {
    if student_id.trim().is_empty() {
        return Err(ValidationError::new("student_id", "Student ID is required"));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0} not found")]
    NotFound(String),
    #[error("invalid credentials")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<&'a str>,
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::Storage(_) => "storage",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let field = match self {
            AppError::Validation(err) => Some(err.field.as_str()),
            _ => None,
        };
        let message = match self {
            AppError::Validation(err) => err.message.clone(),
            other => other.to_string(),
        };
        HttpResponse::build(status).json(ErrorBody { error: self.kind(), message, field })
    }
}
