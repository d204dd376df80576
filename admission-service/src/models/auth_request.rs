//! Typed view of a deciphered authentication request.
//!
//! Every field a partner may omit is an `Option` so that absence is reported
//! by the validator as a field-level error instead of a parse failure.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthRequest {
    pub id: Option<String>,
    pub version: Option<String>,
    pub request_time: Option<String>,
    #[serde(rename = "transactionID")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub consent_obtained: bool,
    pub individual_id: Option<String>,
    pub individual_id_type: Option<String>,
    pub domain_uri: Option<String>,
    pub env: Option<String>,
    pub requested_auth: Option<RequestedAuth>,
    pub request: Option<RequestBody>,
    #[serde(rename = "requestHMAC")]
    pub request_hmac: Option<String>,
}

impl AuthRequest {
    /// Biometric blocks of the request body, empty when absent.
    pub fn biometrics(&self) -> &[BioBlock] {
        self.request
            .as_ref()
            .and_then(|body| body.biometrics.as_deref())
            .unwrap_or_default()
    }

    pub fn is_bio(&self) -> bool {
        self.requested_auth.as_ref().is_some_and(|auth| auth.bio)
    }

    pub fn is_demo(&self) -> bool {
        self.requested_auth.as_ref().is_some_and(|auth| auth.demo)
    }
}

/// Which kinds of authentication the partner asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedAuth {
    #[serde(default)]
    pub demo: bool,
    #[serde(default)]
    pub bio: bool,
}

/// Resolved auth kind of a well-formed `RequestedAuth`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthKind {
    Demographic,
    Biometric,
    DemographicAndBiometric,
}

impl RequestedAuth {
    pub fn kind(&self) -> Option<AuthKind> {
        match (self.demo, self.bio) {
            (true, false) => Some(AuthKind::Demographic),
            (false, true) => Some(AuthKind::Biometric),
            (true, true) => Some(AuthKind::DemographicAndBiometric),
            (false, false) => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    pub timestamp: Option<String>,
    pub biometrics: Option<Vec<BioBlock>>,
    pub demographics: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BioBlock {
    pub data: Option<BioData>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BioData {
    pub bio_type: Option<String>,
    pub bio_sub_type: Option<String>,
    pub bio_value: Option<String>,
    pub timestamp: Option<String>,
    pub digital_id: Option<DigitalId>,
    pub domain_uri: Option<String>,
    pub env: Option<String>,
    pub device_code: Option<String>,
    pub device_service_version: Option<String>,
}

/// Capture-device identity reported inside a biometric block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalId {
    pub date_time: Option<String>,
    pub serial_no: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub device_sub_type: Option<String>,
    pub dp: Option<String>,
    pub dp_id: Option<String>,
}
