//! Request validation: structural checks, business rules and timestamp
//! freshness, run as ordered groups.
//!
//! Groups run in a fixed order and the run stops after the first group that
//! leaves any error in the set. Within a group every check runs, so one
//! response can report all problems of that group at once.

pub mod business;
pub mod errors;
pub mod structural;
pub mod timestamp;

use std::ops::ControlFlow;
use std::sync::Arc;

pub use errors::{ErrorCode, ValidationError, ValidationErrorSet};
pub use timestamp::{TimestampFormat, TimestampPolicy};

use crate::config::ValidationSettings;
use crate::models::{AuthKind, AuthRequest};
use structural::{bio_path, BIOMETRICS};

pub const REQUEST_TIME: &str = "requestTime";
pub const REQUEST_TIMESTAMP: &str = "request/timestamp";

type Check = fn(&AuthRequestValidator, &AuthRequest, &mut ValidationErrorSet);

/// Validation groups in evaluation order.
const GROUPS: &[(&str, Check)] = &[
    ("consent", AuthRequestValidator::check_consent),
    ("request_time", AuthRequestValidator::check_request_times),
    ("transaction_id", AuthRequestValidator::check_transaction_id),
    ("allowed_auth_types", AuthRequestValidator::check_allowed_auth_types),
    ("auth_type", AuthRequestValidator::check_auth_type),
    ("structure", AuthRequestValidator::check_structure),
    ("domain_uri_and_env", AuthRequestValidator::check_domain_uri_and_env),
    ("biometric_timestamps", AuthRequestValidator::check_biometric_timestamps),
];

/// Stateless validator over one settings snapshot.
#[derive(Debug, Clone)]
pub struct AuthRequestValidator {
    settings: Arc<ValidationSettings>,
    timestamps: TimestampPolicy,
}

impl AuthRequestValidator {
    pub fn new(settings: Arc<ValidationSettings>) -> Self {
        let timestamps = TimestampPolicy::new(&settings);
        Self {
            settings,
            timestamps,
        }
    }

    pub fn settings(&self) -> &ValidationSettings {
        &self.settings
    }

    /// Run every group in order, stopping after the first failing group.
    pub fn validate(&self, request: &AuthRequest) -> ValidationErrorSet {
        let outcome = GROUPS
            .iter()
            .try_fold(ValidationErrorSet::new(), |mut errors, (name, check)| {
                check(self, request, &mut errors);
                if errors.has_errors() {
                    tracing::debug!(group = name, errors = errors.len(), "Validation group failed");
                    ControlFlow::Break(errors)
                } else {
                    ControlFlow::Continue(errors)
                }
            });

        match outcome {
            ControlFlow::Break(errors) | ControlFlow::Continue(errors) => errors,
        }
    }

    fn check_consent(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        structural::validate_consent(request, errors);
    }

    fn check_request_times(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        self.timestamps.validate(
            request.request_time.as_deref(),
            REQUEST_TIME,
            TimestampFormat::Request,
            errors,
        );

        match request.request.as_ref() {
            Some(body) => {
                self.timestamps.validate(
                    body.timestamp.as_deref(),
                    REQUEST_TIMESTAMP,
                    TimestampFormat::Request,
                    errors,
                );
            }
            None => errors.reject_missing(structural::REQUEST),
        }
    }

    fn check_transaction_id(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        structural::validate_transaction_id(request, &self.settings, errors);
    }

    fn check_allowed_auth_types(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        business::validate_allowed_auth_types(request, &self.settings, errors);
    }

    fn check_auth_type(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        structural::validate_auth_type(request, errors);
    }

    /// Field presence across the request, then the branch for the requested
    /// auth kind. The biometric branch includes device details.
    fn check_structure(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        structural::validate_individual_id(request, errors);
        if errors.has_errors() {
            return;
        }

        let kind = request.requested_auth.and_then(|auth| auth.kind());
        if matches!(kind, Some(AuthKind::Demographic | AuthKind::DemographicAndBiometric)) {
            structural::validate_demographics(request, errors);
        }
        if matches!(kind, Some(AuthKind::Biometric | AuthKind::DemographicAndBiometric)) {
            structural::validate_bio_metadata(request, &self.settings, errors);
        }
    }

    fn check_domain_uri_and_env(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        business::validate_domain_uri_and_env(request, &self.settings, errors);
    }

    /// Capture and device timestamps of every block. A bad block does not
    /// stop the remaining blocks from being checked.
    fn check_biometric_timestamps(&self, request: &AuthRequest, errors: &mut ValidationErrorSet) {
        if !request.is_bio() {
            return;
        }

        let Some(biometrics) = request.request.as_ref().and_then(|body| body.biometrics.as_ref())
        else {
            errors.reject_missing(BIOMETRICS);
            return;
        };

        for (index, block) in biometrics.iter().enumerate() {
            let Some(data) = block.data.as_ref() else {
                errors.reject_missing(&bio_path(index, "data"));
                continue;
            };

            let capture_ok = self.timestamps.validate(
                data.timestamp.as_deref(),
                &bio_path(index, "data/timestamp"),
                TimestampFormat::Biometric,
                errors,
            );
            if !capture_ok {
                continue;
            }

            match data.digital_id.as_ref() {
                None => errors.reject_missing(&bio_path(index, "data/digitalId")),
                Some(digital_id) => {
                    self.timestamps.validate(
                        digital_id.date_time.as_deref(),
                        &bio_path(index, "data/digitalId/dateTime"),
                        TimestampFormat::Biometric,
                        errors,
                    );
                }
            }
        }
    }
}
