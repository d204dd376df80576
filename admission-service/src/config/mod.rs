use serde::Deserialize;
use service_core::error::AppError;

use crate::services::security::DomainType;

/// Environment keys that arrive as comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "validation.allowed_environments",
    "validation.allowed_domain_uris",
    "validation.allowed_auth_types",
    "filters.enabled",
    "filters.denied_device_providers",
];

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    pub port: u16,
    pub service_name: String,
    pub log_level: String,
    pub log_json: bool,
    pub security: SecuritySettings,
    pub decipher: DecipherSettings,
    pub validation: ValidationSettings,
    pub filters: FilterSettings,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            service_name: "admission-service".to_string(),
            log_level: "info".to_string(),
            log_json: true,
            security: SecuritySettings::default(),
            decipher: DecipherSettings::default(),
            validation: ValidationSettings::default(),
            filters: FilterSettings::default(),
        }
    }
}

impl AdmissionConfig {
    /// Reads `admission.{toml,yaml,json}` if present, then `ADMISSION__*`
    /// environment variables (e.g. `ADMISSION__SECURITY__REQUIRE_SIGNATURE`).
    pub fn load() -> Result<Self, AppError> {
        service_core::config::load("admission", "ADMISSION", LIST_KEYS)
    }
}

/// Deployment-time trust decisions for the cryptographic stages.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecuritySettings {
    pub require_signature: bool,
    pub require_trust_chain: bool,
    pub validate_request_hmac: bool,
    /// When set, request digests are HMAC-SHA256 keyed with this secret.
    pub hmac_key: Option<String>,
    pub partner_keys: Vec<PartnerKeyConfig>,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            require_signature: true,
            require_trust_chain: false,
            validate_request_hmac: true,
            hmac_key: None,
            partner_keys: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerKeyConfig {
    pub domain: DomainType,
    /// Base64 encoded ed25519 public key.
    pub public_key: String,
    #[serde(default)]
    pub trusted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecipherMode {
    #[default]
    PassThrough,
    Base64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DecipherSettings {
    pub mode: DecipherMode,
}

/// Allow-lists, limits and timestamp rules for request validation.
///
/// Held behind an `ArcSwap` by the pipeline so it can be replaced between
/// requests.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    pub allowed_environments: Vec<String>,
    pub allowed_domain_uris: Vec<String>,
    pub allowed_auth_types: Vec<String>,
    pub max_biometric_count: usize,
    pub max_transaction_id_length: usize,
    /// chrono format string for `requestTime` and `request/timestamp`.
    pub request_time_pattern: String,
    /// chrono format string tried first for biometric timestamps.
    pub biometric_time_pattern: String,
    pub request_time_past_seconds: i64,
    pub request_time_future_seconds: i64,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            allowed_environments: vec!["Staging".to_string(), "Production".to_string()],
            allowed_domain_uris: Vec::new(),
            allowed_auth_types: vec![
                "demo".to_string(),
                "bio-Finger".to_string(),
                "bio-Iris".to_string(),
                "bio-Face".to_string(),
            ],
            max_biometric_count: 10,
            max_transaction_id_length: 10,
            request_time_pattern: "%Y-%m-%dT%H:%M:%S%.3fZ".to_string(),
            biometric_time_pattern: "%Y-%m-%dT%H:%M:%S%.3f%:z".to_string(),
            request_time_past_seconds: 1800,
            request_time_future_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Ids of registered filters that run, in registration order.
    pub enabled: Vec<String>,
    pub denied_device_providers: Vec<String>,
}
