use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// One entry of the `errors` array returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub error_code: String,
    pub error_message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    pub fn new(error_code: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.into(),
            error_message: error_message.into(),
            field: None,
        }
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Request rejected ({status}): {} error(s)", errors.len())]
    Rejected {
        status: StatusCode,
        errors: Vec<ErrorDetail>,
    },

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    pub fn rejected(status: StatusCode, errors: Vec<ErrorDetail>) -> Self {
        AppError::Rejected { status, errors }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            errors: Vec<ErrorDetail>,
        }

        let (status, errors) = match self {
            AppError::Rejected { status, errors } => (status, errors),
            AppError::InternalError(err) => {
                // Never leak internals to the caller
                tracing::error!(error = %err, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![ErrorDetail::new(
                        "INTERNAL_ERROR",
                        "Internal server error",
                    )],
                )
            }
            AppError::ConfigError(err) => {
                tracing::error!(error = %err, "Configuration error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    vec![ErrorDetail::new(
                        "CONFIGURATION_ERROR",
                        "Configuration error",
                    )],
                )
            }
        };

        (status, Json(ErrorResponse { errors })).into_response()
    }
}
