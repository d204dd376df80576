use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::sync::Arc;

use super::{AdmissionError, RawRequest, SignedRequest, Stage};
use crate::config::SecuritySettings;
use crate::services::{DomainType, FraudAnalytics, SecurityProvider};

pub const SIGNATURE_HEADER: &str = "signature";

/// Non-empty, trimmed header value.
fn header_value<'a>(
    headers: &'a HeaderMap,
    name: impl axum::http::header::AsHeaderName,
) -> Option<&'a str> {
    headers
        .get(name)?
        .to_str()
        .ok()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Verifies the detached request signature over the raw body and requires an
/// authorization token.
pub struct SignatureStage {
    provider: Arc<dyn SecurityProvider>,
    fraud: Arc<dyn FraudAnalytics>,
    require_signature: bool,
    require_trust_chain: bool,
}

impl SignatureStage {
    pub fn new(
        provider: Arc<dyn SecurityProvider>,
        fraud: Arc<dyn FraudAnalytics>,
        settings: &SecuritySettings,
    ) -> Self {
        Self {
            provider,
            fraud,
            require_signature: settings.require_signature,
            require_trust_chain: settings.require_trust_chain,
        }
    }

    /// Provider errors count as a failed verification.
    fn verify(&self, signature: &str, body: &[u8]) -> bool {
        match self.provider.verify_signature(
            signature,
            DomainType::Auth,
            Some(body),
            self.require_trust_chain,
        ) {
            Ok(valid) => valid,
            Err(e) => {
                tracing::error!(error = %e, "Invalid JWS signature");
                false
            }
        }
    }
}

impl Stage<RawRequest> for SignatureStage {
    type Output = SignedRequest;

    fn name(&self) -> &'static str {
        "signature"
    }

    fn run(&self, raw: RawRequest) -> Result<SignedRequest, AdmissionError> {
        if self.require_signature {
            let Some(signature) = header_value(&raw.headers, SIGNATURE_HEADER) else {
                tracing::error!("Signature header is empty or missing");
                return Err(AdmissionError::MissingParameter(
                    "signature - header".to_string(),
                ));
            };

            if !self.verify(signature, &raw.body) {
                tracing::error!(
                    uri = %raw.uri,
                    payload_len = raw.body.len(),
                    "Signature verification failed"
                );
                if let Err(e) = self.fraud.on_signature_failure(&raw.uri, &raw.body) {
                    tracing::warn!(error = %e, "Fraud analysis notification failed");
                }
                return Err(AdmissionError::SignatureInvalid);
            }
        }

        if header_value(&raw.headers, AUTHORIZATION).is_none() {
            tracing::error!("Authorization header is empty or missing");
            return Err(AdmissionError::MissingParameter(
                "Authorization - header".to_string(),
            ));
        }

        Ok(SignedRequest {
            uri: raw.uri,
            body: raw.body,
            identity_data: raw.identity_data,
        })
    }
}
