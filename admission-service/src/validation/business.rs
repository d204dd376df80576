//! Cross-field rules that depend on configured allow-lists.

use super::errors::{ErrorCode, ValidationErrorSet};
use crate::config::ValidationSettings;
use crate::models::{AuthRequest, BioData};

const DOMAIN_URI: &str = "domainUri";
const ENV: &str = "env";

/// Case-insensitive allow-list membership. An absent value is never a member.
pub fn contains_ignore_case(values: &[String], value: Option<&str>) -> bool {
    value.is_some_and(|value| values.iter().any(|v| v.eq_ignore_ascii_case(value)))
}

/// Whether one biometric block disagrees with the request-level value.
///
/// | block   | request | consistent when                                  |
/// |---------|---------|--------------------------------------------------|
/// | absent  | absent  | always                                           |
/// | absent  | present | never                                            |
/// | present | absent  | never                                            |
/// | present | present | block is allow-listed and exactly equals request |
pub fn is_block_inconsistent(
    request_value: Option<&str>,
    block_value: Option<&str>,
    allowed: &[String],
) -> bool {
    match (block_value, request_value) {
        (None, request) => request.is_some(),
        (Some(_), None) => true,
        (Some(block), Some(request)) => {
            !contains_ignore_case(allowed, Some(block)) || block != request
        }
    }
}

/// Domain-URI then environment consistency between the request and every
/// biometric block carrying data. Each check contributes at most one
/// `InputMismatch`, however many blocks disagree.
pub fn validate_domain_uri_and_env(
    request: &AuthRequest,
    settings: &ValidationSettings,
    errors: &mut ValidationErrorSet,
) {
    let bio_data: Vec<&BioData> = request
        .biometrics()
        .iter()
        .filter_map(|block| block.data.as_ref())
        .collect();

    if bio_data.iter().any(|data| {
        is_block_inconsistent(
            request.domain_uri.as_deref(),
            data.domain_uri.as_deref(),
            &settings.allowed_domain_uris,
        )
    }) {
        tracing::error!("Request domainUri does not match biometric domainUri");
        errors.reject(DOMAIN_URI, ErrorCode::InputMismatch, &[DOMAIN_URI, DOMAIN_URI]);
    }

    if bio_data.iter().any(|data| {
        is_block_inconsistent(
            request.env.as_deref(),
            data.env.as_deref(),
            &settings.allowed_environments,
        )
    }) {
        tracing::error!("Request env does not match biometric env");
        errors.reject(ENV, ErrorCode::InputMismatch, &[ENV, ENV]);
    }
}

/// Requested auth kinds must be enabled for the deployment.
pub fn validate_allowed_auth_types(
    request: &AuthRequest,
    settings: &ValidationSettings,
    errors: &mut ValidationErrorSet,
) {
    let allowed = &settings.allowed_auth_types;

    if request.is_demo() && !contains_ignore_case(allowed, Some("demo")) {
        errors.reject("requestedAuth", ErrorCode::AuthTypeNotAllowed, &["demo"]);
    }

    let any_bio_allowed = allowed
        .iter()
        .any(|auth_type| auth_type.to_ascii_lowercase().starts_with("bio"));
    if request.is_bio() && !any_bio_allowed {
        errors.reject("requestedAuth", ErrorCode::AuthTypeNotAllowed, &["bio"]);
    }
}

/// Map a device-reported bio type to its auth type name.
pub fn bio_auth_type(bio_type: &str) -> Option<&'static str> {
    match bio_type.to_ascii_uppercase().as_str() {
        "FIR" | "FMR" | "FINGER" => Some("bio-Finger"),
        "IIR" | "IRIS" => Some("bio-Iris"),
        "FID" | "FACE" => Some("bio-Face"),
        _ => None,
    }
}

/// Bio type of one block must be known and allow-listed.
pub fn validate_bio_type(
    bio_type: &str,
    field: &str,
    settings: &ValidationSettings,
    errors: &mut ValidationErrorSet,
) {
    match bio_auth_type(bio_type) {
        None => errors.reject(field, ErrorCode::InvalidInput, &[field]),
        Some(auth_type) if !contains_ignore_case(&settings.allowed_auth_types, Some(auth_type)) => {
            errors.reject(field, ErrorCode::AuthTypeNotAllowed, &[auth_type])
        }
        Some(_) => {}
    }
}
