use axum::http::StatusCode;
use service_core::error::{AppError, ErrorDetail};
use thiserror::Error;

use super::filters::FilterError;
use crate::validation::{ErrorCode, ValidationErrorSet};

/// Terminal outcome of a rejected admission. None of these are retried.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    #[error("Request validation failed with {} error(s)", .0.len())]
    Invalid(ValidationErrorSet),

    #[error("Digital signature verification failed")]
    SignatureInvalid,

    #[error("Unable to decipher {0}")]
    DecipherFailed(String),

    #[error("Request HMAC validation failed")]
    HmacValidationFailed,

    #[error("Filter {filter} rejected the request: {source}")]
    FilterRejected {
        filter: String,
        #[source]
        source: FilterError,
    },

    #[error("Unable to process request: {0}")]
    UnableToProcess(#[from] anyhow::Error),
}

impl AdmissionError {
    /// Code reported to the partner and used as the metrics outcome label.
    pub fn code(&self) -> &str {
        match self {
            AdmissionError::MissingParameter(_) => ErrorCode::MissingParameter.as_str(),
            AdmissionError::Invalid(errors) => errors
                .iter()
                .next()
                .map(|error| error.code.public_code().as_str())
                .unwrap_or(ErrorCode::InvalidInput.as_str()),
            AdmissionError::SignatureInvalid => ErrorCode::SignatureInvalid.as_str(),
            AdmissionError::DecipherFailed(_) => ErrorCode::DecipherFailed.public_code().as_str(),
            AdmissionError::HmacValidationFailed => ErrorCode::HmacValidationFailed.as_str(),
            AdmissionError::FilterRejected { source, .. } => source.code.as_str(),
            AdmissionError::UnableToProcess(_) => ErrorCode::UnableToProcess.as_str(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AdmissionError::MissingParameter(_) | AdmissionError::Invalid(_) => {
                StatusCode::BAD_REQUEST
            }
            AdmissionError::SignatureInvalid
            | AdmissionError::DecipherFailed(_)
            | AdmissionError::HmacValidationFailed => StatusCode::UNAUTHORIZED,
            AdmissionError::FilterRejected { .. } => StatusCode::FORBIDDEN,
            AdmissionError::UnableToProcess(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn detail(code: ErrorCode, args: &[&str]) -> ErrorDetail {
    ErrorDetail::new(code.public_code().as_str(), code.public_code().message(args))
}

impl From<AdmissionError> for AppError {
    fn from(err: AdmissionError) -> Self {
        let status = err.status();
        let errors = match err {
            AdmissionError::MissingParameter(field) => {
                vec![detail(ErrorCode::MissingParameter, &[&field]).with_field(field)]
            }
            AdmissionError::Invalid(errors) => errors
                .into_iter()
                .map(|error| {
                    ErrorDetail::new(error.code.public_code().as_str(), error.message)
                        .with_field(error.field)
                })
                .collect(),
            AdmissionError::SignatureInvalid => vec![detail(ErrorCode::SignatureInvalid, &[])],
            AdmissionError::DecipherFailed(field) => {
                // Reported as a signature failure; the detail stays in the log
                tracing::warn!(field = %field, "Decipher failure reported as signature failure");
                vec![detail(ErrorCode::DecipherFailed, &[])]
            }
            AdmissionError::HmacValidationFailed => {
                vec![detail(ErrorCode::HmacValidationFailed, &[])]
            }
            AdmissionError::FilterRejected { source, .. } => {
                vec![ErrorDetail::new(source.code, source.message)]
            }
            AdmissionError::UnableToProcess(err) => {
                tracing::error!(error = %err, "Unable to process request");
                vec![detail(ErrorCode::UnableToProcess, &[])]
            }
        };

        AppError::rejected(status, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(err: AdmissionError) -> (StatusCode, Vec<ErrorDetail>) {
        match AppError::from(err) {
            AppError::Rejected { status, errors } => (status, errors),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validation_errors_keep_fields() {
        let mut errors = ValidationErrorSet::new();
        errors.reject_missing("consentObtained");
        errors.reject("env", ErrorCode::InputMismatch, &["env", "env"]);

        let err = AdmissionError::Invalid(errors);
        assert_eq!(err.code(), "MISSING_PARAMETER");

        let (status, details) = rejected(err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(details.len(), 2);
        assert_eq!(details[1].error_code, "INPUT_MISMATCH");
        assert_eq!(details[1].field.as_deref(), Some("env"));
    }

    #[test]
    fn test_decipher_failure_looks_like_signature_failure() {
        let (status, details) = rejected(AdmissionError::DecipherFailed("request".to_string()));
        let (_, signature) = rejected(AdmissionError::SignatureInvalid);

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(details, signature);
    }

    #[test]
    fn test_filter_error_is_verbatim() {
        let err = AdmissionError::FilterRejected {
            filter: "partner-policy".to_string(),
            source: FilterError::new("PARTNER_NOT_ALLOWED", "Partner is not allowed"),
        };
        assert_eq!(err.code(), "PARTNER_NOT_ALLOWED");

        let (status, details) = rejected(err);
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(details[0].error_message, "Partner is not allowed");
    }

    #[test]
    fn test_internal_detail_not_exposed() {
        let (status, details) =
            rejected(AdmissionError::UnableToProcess(anyhow::anyhow!("socket reset")));

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(details[0].error_code, "UNABLE_TO_PROCESS");
        assert!(!details[0].error_message.contains("socket"));
    }
}
