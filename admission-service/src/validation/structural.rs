//! Field presence and shape checks. Each function appends to the error set
//! and never stops at the first problem it finds.

use super::business;
use super::errors::{ErrorCode, ValidationErrorSet};
use crate::config::ValidationSettings;
use crate::models::{AuthRequest, BioData, DigitalId};

pub const CONSENT_OBTAINED: &str = "consentObtained";
pub const TRANSACTION_ID: &str = "transactionID";
pub const INDIVIDUAL_ID: &str = "individualId";
pub const REQUESTED_AUTH: &str = "requestedAuth";
pub const REQUEST: &str = "request";
pub const BIOMETRICS: &str = "request/biometrics";
pub const DEMOGRAPHICS: &str = "request/demographics";

/// Path of a field below `request/biometrics[index]`.
pub fn bio_path(index: usize, suffix: &str) -> String {
    format!("{}[{}]/{}", BIOMETRICS, index, suffix)
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.trim().is_empty())
}

pub fn validate_consent(request: &AuthRequest, errors: &mut ValidationErrorSet) {
    if !request.consent_obtained {
        tracing::error!("Consent not obtained for request");
        errors.reject_missing(CONSENT_OBTAINED);
    }
}

pub fn validate_transaction_id(
    request: &AuthRequest,
    settings: &ValidationSettings,
    errors: &mut ValidationErrorSet,
) {
    match request.transaction_id.as_deref().map(str::trim) {
        None | Some("") => errors.reject_missing(TRANSACTION_ID),
        Some(txn_id) => {
            let well_formed = txn_id.len() <= settings.max_transaction_id_length
                && txn_id.chars().all(|c| c.is_ascii_alphanumeric());
            if !well_formed {
                errors.reject(TRANSACTION_ID, ErrorCode::InvalidInput, &[TRANSACTION_ID]);
            }
        }
    }
}

/// `requestedAuth` must assert demo, bio, or both.
pub fn validate_auth_type(request: &AuthRequest, errors: &mut ValidationErrorSet) {
    match request.requested_auth {
        None => errors.reject_missing(REQUESTED_AUTH),
        Some(auth) if auth.kind().is_none() => {
            errors.reject(REQUESTED_AUTH, ErrorCode::InvalidInput, &[REQUESTED_AUTH])
        }
        Some(_) => {}
    }
}

pub fn validate_individual_id(request: &AuthRequest, errors: &mut ValidationErrorSet) {
    if is_blank(request.individual_id.as_deref()) {
        errors.reject_missing(INDIVIDUAL_ID);
    }
    if request.request.is_none() {
        errors.reject_missing(REQUEST);
    }
}

pub fn validate_demographics(request: &AuthRequest, errors: &mut ValidationErrorSet) {
    let present = request
        .request
        .as_ref()
        .and_then(|body| body.demographics.as_ref())
        .is_some_and(|demographics| !demographics.is_empty());

    if !present {
        errors.reject_missing(DEMOGRAPHICS);
    }
}

/// Block count, per-block data presence and bio type, then device details
/// across every block.
pub fn validate_bio_metadata(
    request: &AuthRequest,
    settings: &ValidationSettings,
    errors: &mut ValidationErrorSet,
) {
    let biometrics = request.biometrics();
    if biometrics.is_empty() {
        errors.reject_missing(BIOMETRICS);
        return;
    }

    if biometrics.len() > settings.max_biometric_count {
        tracing::error!(
            count = biometrics.len(),
            max = settings.max_biometric_count,
            "Biometric block count exceeds the limit"
        );
        errors.reject(BIOMETRICS, ErrorCode::InvalidInput, &[BIOMETRICS]);
        return;
    }

    for (index, block) in biometrics.iter().enumerate() {
        let Some(data) = block.data.as_ref() else {
            errors.reject_missing(&bio_path(index, "data"));
            continue;
        };

        match data.bio_type.as_deref().filter(|t| !t.trim().is_empty()) {
            None => errors.reject_missing(&bio_path(index, "data/bioType")),
            Some(bio_type) => business::validate_bio_type(
                bio_type,
                &bio_path(index, "data/bioType"),
                settings,
                errors,
            ),
        }

        if is_blank(data.bio_value.as_deref()) {
            errors.reject_missing(&bio_path(index, "data/bioValue"));
        }
    }

    validate_device_details(request, errors);
}

/// Every block with data must identify its capture device completely.
pub fn validate_device_details(request: &AuthRequest, errors: &mut ValidationErrorSet) {
    for (index, block) in request.biometrics().iter().enumerate() {
        if let Some(data) = block.data.as_ref() {
            validate_device_block(index, data, errors);
        }
    }
}

fn validate_device_block(index: usize, data: &BioData, errors: &mut ValidationErrorSet) {
    if is_blank(data.device_code.as_deref()) {
        errors.reject_missing(&bio_path(index, "data/deviceCode"));
    }
    if is_blank(data.device_service_version.as_deref()) {
        errors.reject_missing(&bio_path(index, "data/deviceServiceVersion"));
    }

    let Some(digital_id) = data.digital_id.as_ref() else {
        errors.reject_missing(&bio_path(index, "data/digitalId"));
        return;
    };

    for (name, value) in digital_id_fields(digital_id) {
        if is_blank(value) {
            errors.reject_missing(&bio_path(index, &format!("data/digitalId/{}", name)));
        }
    }
}

fn digital_id_fields(digital_id: &DigitalId) -> [(&'static str, Option<&str>); 7] {
    [
        ("serialNo", digital_id.serial_no.as_deref()),
        ("make", digital_id.make.as_deref()),
        ("model", digital_id.model.as_deref()),
        ("type", digital_id.device_type.as_deref()),
        ("deviceSubType", digital_id.device_sub_type.as_deref()),
        ("deviceProvider", digital_id.dp.as_deref()),
        ("deviceProviderId", digital_id.dp_id.as_deref()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BioBlock, RequestBody};

    fn bio_request(blocks: Vec<BioBlock>) -> AuthRequest {
        AuthRequest {
            request: Some(RequestBody {
                biometrics: Some(blocks),
                ..RequestBody::default()
            }),
            ..AuthRequest::default()
        }
    }

    #[test]
    fn test_device_details_accumulate_across_blocks() {
        let complete = BioData {
            device_code: Some("DC-1".to_string()),
            device_service_version: Some("1.0".to_string()),
            digital_id: Some(DigitalId {
                date_time: Some("2024-05-01T12:00:00.000+00:00".to_string()),
                serial_no: Some("SN-1".to_string()),
                make: Some("Acme".to_string()),
                model: Some("F1".to_string()),
                device_type: Some("Finger".to_string()),
                device_sub_type: Some("Slap".to_string()),
                dp: Some("Acme Devices".to_string()),
                dp_id: Some("ACME".to_string()),
            }),
            ..BioData::default()
        };
        let mut missing_make = complete.clone();
        if let Some(digital_id) = missing_make.digital_id.as_mut() {
            digital_id.make = None;
            digital_id.dp_id = Some(String::new());
        }
        let no_digital_id = BioData {
            digital_id: None,
            device_code: None,
            ..complete.clone()
        };

        let request = bio_request(vec![
            BioBlock { data: Some(complete) },
            BioBlock { data: Some(missing_make) },
            BioBlock { data: Some(no_digital_id) },
        ]);

        let mut errors = ValidationErrorSet::new();
        validate_device_details(&request, &mut errors);

        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "request/biometrics[1]/data/digitalId/make",
                "request/biometrics[1]/data/digitalId/deviceProviderId",
                "request/biometrics[2]/data/deviceCode",
                "request/biometrics[2]/data/digitalId",
            ]
        );
        assert_eq!(errors.count_of(ErrorCode::MissingParameter), 4);
    }

    #[test]
    fn test_biometric_count_limit() {
        let settings = ValidationSettings {
            max_biometric_count: 2,
            ..ValidationSettings::default()
        };
        let block = || BioBlock { data: None };

        let mut errors = ValidationErrorSet::new();
        let request = bio_request(vec![block(), block(), block()]);
        validate_bio_metadata(&request, &settings, &mut errors);
        assert_eq!(errors.get(BIOMETRICS).map(|e| e.code), Some(ErrorCode::InvalidInput));

        let mut errors = ValidationErrorSet::new();
        validate_bio_metadata(&bio_request(vec![block(), block()]), &settings, &mut errors);
        assert!(errors.get(BIOMETRICS).is_none());
        assert_eq!(errors.len(), 2);
        assert!(errors.get("request/biometrics[1]/data").is_some());
    }

    #[test]
    fn test_transaction_id_shape() {
        let settings = ValidationSettings::default();
        let check = |txn: Option<&str>| {
            let request = AuthRequest {
                transaction_id: txn.map(str::to_string),
                ..AuthRequest::default()
            };
            let mut errors = ValidationErrorSet::new();
            validate_transaction_id(&request, &settings, &mut errors);
            errors.codes()
        };

        assert!(check(Some("1234567890")).is_empty());
        assert_eq!(check(None), vec![ErrorCode::MissingParameter]);
        assert_eq!(check(Some(" ")), vec![ErrorCode::MissingParameter]);
        assert_eq!(check(Some("12345678901")), vec![ErrorCode::InvalidInput]);
        assert_eq!(check(Some("12345-7890")), vec![ErrorCode::InvalidInput]);
    }
}
