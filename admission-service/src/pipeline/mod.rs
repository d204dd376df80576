//! Request admission pipeline.
//!
//! A request passes, in order: signature verification over the raw body,
//! deciphering, structural and business validation, the request digest check
//! and the enabled plugin filters. Each stage consumes the previous stage's
//! request state and the first failure rejects the request.

pub mod decipher;
pub mod error;
pub mod filters;
pub mod hmac;
pub mod signature;

use arc_swap::ArcSwap;
use axum::body::Bytes;
use axum::http::HeaderMap;
use metrics::{counter, histogram};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

pub use decipher::DecipherStage;
pub use error::AdmissionError;
pub use filters::{
    AuthFilter, DeviceProviderDenyListFilter, FilterChain, FilterError, FilterRegistry,
    InMemoryFilterRegistry,
};
pub use hmac::HmacStage;
pub use signature::SignatureStage;

use crate::config::{AdmissionConfig, ValidationSettings};
use crate::models::{AuthRequest, FilterProperties, IdentityData};
use crate::services::{FraudAnalytics, SecurityProvider};
use crate::validation::AuthRequestValidator;

/// One step of the pipeline.
pub trait Stage<Input> {
    type Output;

    /// Label used in logs and metrics.
    fn name(&self) -> &'static str;

    fn run(&self, input: Input) -> Result<Self::Output, AdmissionError>;
}

/// Request as received: the body is untrusted until the signature stage.
#[derive(Debug, Clone)]
pub struct RawRequest {
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub identity_data: IdentityData,
}

impl RawRequest {
    pub fn new(uri: impl Into<String>, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            uri: uri.into(),
            headers,
            body,
            identity_data: IdentityData::new(),
        }
    }

    pub fn with_identity_data(mut self, identity_data: IdentityData) -> Self {
        self.identity_data = identity_data;
        self
    }
}

/// Body whose signature and authorization token have been accepted.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub uri: String,
    pub body: Bytes,
    pub identity_data: IdentityData,
}

/// Typed request plus the exact bytes its `requestHMAC` covers.
#[derive(Debug, Clone)]
pub struct DecipheredRequest {
    pub uri: String,
    pub request: AuthRequest,
    pub hmac_input: Vec<u8>,
    pub identity_data: IdentityData,
}

impl DecipheredRequest {
    pub fn filter_properties(&self) -> FilterProperties {
        let mut properties = FilterProperties::new();
        properties.insert("requestUri".to_string(), Value::String(self.uri.clone()));
        properties.insert(
            "transactionId".to_string(),
            self.request
                .transaction_id
                .clone()
                .map_or(Value::Null, Value::String),
        );
        properties
    }
}

impl Stage<DecipheredRequest> for AuthRequestValidator {
    type Output = DecipheredRequest;

    fn name(&self) -> &'static str {
        "validation"
    }

    fn run(&self, input: DecipheredRequest) -> Result<DecipheredRequest, AdmissionError> {
        let errors = self.validate(&input.request);
        if errors.has_errors() {
            return Err(AdmissionError::Invalid(errors));
        }
        Ok(input)
    }
}

/// Collaborators shared by every request.
#[derive(Clone)]
pub struct PipelineDependencies {
    pub security: Arc<dyn SecurityProvider>,
    pub fraud: Arc<dyn FraudAnalytics>,
    pub filters: Arc<dyn FilterRegistry>,
}

fn timed<I, S: Stage<I>>(stage: &S, input: I) -> Result<S::Output, AdmissionError> {
    let start = Instant::now();
    let result = stage.run(input);
    histogram!("admission_stage_duration_seconds", "stage" => stage.name())
        .record(start.elapsed().as_secs_f64());
    result
}

pub struct AdmissionPipeline {
    signature: SignatureStage,
    decipher: DecipherStage,
    hmac: HmacStage,
    filters: FilterChain,
    validation: ArcSwap<ValidationSettings>,
}

impl AdmissionPipeline {
    pub fn new(config: &AdmissionConfig, deps: PipelineDependencies) -> Self {
        Self {
            signature: SignatureStage::new(deps.security.clone(), deps.fraud, &config.security),
            decipher: DecipherStage::new(deps.security.clone(), &config.decipher, &config.security),
            hmac: HmacStage::new(deps.security, &config.security),
            filters: FilterChain::new(deps.filters),
            validation: ArcSwap::from_pointee(config.validation.clone()),
        }
    }

    /// Run every stage over `raw`. On success the deciphered, validated
    /// request is returned for identity matching.
    #[tracing::instrument(skip_all, fields(uri = %raw.uri, body_len = raw.body.len()))]
    pub fn admit(&self, raw: RawRequest) -> Result<AuthRequest, AdmissionError> {
        let result = self.run_stages(raw);

        let outcome = match &result {
            Ok(request) => {
                tracing::info!(
                    transaction_id = request.transaction_id.as_deref().unwrap_or_default(),
                    "Request admitted"
                );
                "ADMITTED".to_string()
            }
            Err(e) => {
                tracing::warn!(code = %e.code(), error = %e, "Request rejected");
                e.code().to_string()
            }
        };
        counter!("admission_requests_total", "outcome" => outcome).increment(1);

        result
    }

    fn run_stages(&self, raw: RawRequest) -> Result<AuthRequest, AdmissionError> {
        // One settings snapshot for the whole request
        let validator = AuthRequestValidator::new(self.validation.load_full());

        let signed = timed(&self.signature, raw)?;
        let deciphered = timed(&self.decipher, signed)?;
        let validated = timed(&validator, deciphered)?;
        let verified = timed(&self.hmac, validated)?;
        timed(&self.filters, verified)
    }

    /// Replace the validation settings. Requests already in flight keep the
    /// snapshot they started with.
    pub fn reload_settings(&self, settings: ValidationSettings) {
        tracing::info!(
            allowed_environments = ?settings.allowed_environments,
            allowed_domain_uris = ?settings.allowed_domain_uris,
            max_biometric_count = settings.max_biometric_count,
            "Validation settings reloaded"
        );
        self.validation.store(Arc::new(settings));
    }

    pub fn settings(&self) -> Arc<ValidationSettings> {
        self.validation.load_full()
    }

    /// Run only the plugin filters over an already admitted request.
    pub fn validate_auth_filters(
        &self,
        request: &AuthRequest,
        identity_data: &IdentityData,
        properties: &FilterProperties,
    ) -> Result<(), AdmissionError> {
        self.filters.apply(request, identity_data, properties)
    }
}
