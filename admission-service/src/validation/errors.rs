use serde::Serialize;
use std::fmt;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    MissingParameter,
    InvalidInput,
    InputMismatch,
    AuthTypeNotAllowed,
    RequestExpired,
    SignatureInvalid,
    DecipherFailed,
    HmacValidationFailed,
    UnableToProcess,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::MissingParameter => "MISSING_PARAMETER",
            ErrorCode::InvalidInput => "INVALID_INPUT",
            ErrorCode::InputMismatch => "INPUT_MISMATCH",
            ErrorCode::AuthTypeNotAllowed => "AUTH_TYPE_NOT_ALLOWED",
            ErrorCode::RequestExpired => "REQUEST_EXPIRED",
            ErrorCode::SignatureInvalid => "SIGNATURE_INVALID",
            ErrorCode::DecipherFailed => "DECIPHER_FAILED",
            ErrorCode::HmacValidationFailed => "HMAC_VALIDATION_FAILED",
            ErrorCode::UnableToProcess => "UNABLE_TO_PROCESS",
        }
    }

    /// Code shown to the partner. Decode failures are indistinguishable from
    /// forged payloads on the outside.
    pub fn public_code(self) -> ErrorCode {
        match self {
            ErrorCode::DecipherFailed => ErrorCode::SignatureInvalid,
            other => other,
        }
    }

    fn template(self) -> &'static str {
        match self {
            ErrorCode::MissingParameter => "Missing input parameter - {0}",
            ErrorCode::InvalidInput => "Invalid input parameter - {0}",
            ErrorCode::InputMismatch => {
                "Input mismatch - {0} in request does not match {1} in biometrics"
            }
            ErrorCode::AuthTypeNotAllowed => "Requested auth type is not allowed - {0}",
            ErrorCode::RequestExpired => "Request time in {0} is outside the allowed window of {1}",
            ErrorCode::SignatureInvalid => "Digital signature verification failed",
            ErrorCode::DecipherFailed => "Unable to decipher request",
            ErrorCode::HmacValidationFailed => "Request HMAC validation failed",
            ErrorCode::UnableToProcess => "Unable to process the request",
        }
    }

    /// Render the message template, substituting `{n}` with `args[n]`.
    pub fn message(self, args: &[&str]) -> String {
        args.iter()
            .enumerate()
            .fold(self.template().to_string(), |message, (index, arg)| {
                message.replace(&format!("{{{}}}", index), arg)
            })
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single field-level rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub code: ErrorCode,
    pub message: String,
}

/// Ordered collection of field errors produced by one validation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrorSet {
    errors: Vec<ValidationError>,
}

impl ValidationErrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `code` against `field`, formatting the message with `args`.
    pub fn reject(&mut self, field: impl Into<String>, code: ErrorCode, args: &[&str]) {
        self.errors.push(ValidationError {
            field: field.into(),
            code,
            message: code.message(args),
        });
    }

    /// Shorthand for the common missing-field case; the field path is also
    /// the message argument.
    pub fn reject_missing(&mut self, field: &str) {
        self.reject(field, ErrorCode::MissingParameter, &[field]);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    pub fn get(&self, field: &str) -> Option<&ValidationError> {
        self.errors.iter().find(|error| error.field == field)
    }

    pub fn codes(&self) -> Vec<ErrorCode> {
        self.errors.iter().map(|error| error.code).collect()
    }

    pub fn count_of(&self, code: ErrorCode) -> usize {
        self.errors.iter().filter(|error| error.code == code).count()
    }
}

impl IntoIterator for ValidationErrorSet {
    type Item = ValidationError;
    type IntoIter = std::vec::IntoIter<ValidationError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
