use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use shop_admin_core::dashboard::DashboardError;
use shop_admin_core::form::{FieldError, ValidationError};
use shop_admin_core::listing::ListError;
use shop_admin_storage::RepositoryError;

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<FieldError>,
}

/// RFC 7807 problem document returned by the JSON endpoints.
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
                errors: Vec::new(),
            },
        }
    }

    fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.body.errors = errors;
        self
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}

/// Failures shared by the HTML and JSON handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    BadRequest(#[from] ListError),
    #[error("{0}")]
    InvalidParameter(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Dashboard(#[from] DashboardError),
    #[error("{0}")]
    Internal(String),
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::InvalidParameter(rejection.body_text())
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::UnknownEntity(_) | Self::NotFound => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::InvalidParameter(_) | Self::Dashboard(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Repository(err) => match err {
                RepositoryError::NotFound => StatusCode::NOT_FOUND,
                RepositoryError::Conflict { .. } | RepositoryError::InUse => StatusCode::CONFLICT,
                RepositoryError::InvalidReference | RepositoryError::Invalid(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                RepositoryError::UnknownField(_) | RepositoryError::Database(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn problem_type(&self) -> &'static str {
        match self {
            Self::UnknownEntity(_) => "unknown_entity",
            Self::NotFound | Self::Repository(RepositoryError::NotFound) => "not_found",
            Self::BadRequest(_) | Self::InvalidParameter(_) => "invalid_parameter",
            Self::Dashboard(_) => "invalid_date_range",
            Self::Validation(_) => "validation_failed",
            Self::Repository(RepositoryError::Conflict { .. }) => "conflict",
            Self::Repository(RepositoryError::InUse) => "in_use",
            Self::Repository(RepositoryError::InvalidReference) => "invalid_reference",
            Self::Repository(RepositoryError::Invalid(_)) => "constraint_violation",
            Self::Repository(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to clients; internal details stay in the logs.
    pub fn public_message(&self) -> String {
        if self.status().is_server_error() {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }

    pub(crate) fn log(&self) {
        if self.status().is_server_error() {
            error!(stage = "app", error = %self, "request failed");
        }
    }
}

impl From<AppError> for ProblemResponse {
    fn from(err: AppError) -> Self {
        err.log();
        let problem = ProblemResponse::new(err.status(), err.problem_type(), err.public_message());
        match err {
            AppError::Validation(validation) => problem.with_errors(validation.errors),
            _ => problem,
        }
    }
}
