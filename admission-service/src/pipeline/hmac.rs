use service_core::utils::digest;
use std::sync::Arc;

use super::{AdmissionError, DecipheredRequest, Stage};
use crate::config::SecuritySettings;
use crate::services::SecurityProvider;

pub const REQUEST_HMAC: &str = "requestHMAC";

/// Recomputes the digest of the deciphered `request` block and compares it
/// with the partner's `requestHMAC`.
pub struct HmacStage {
    provider: Arc<dyn SecurityProvider>,
    enabled: bool,
}

impl HmacStage {
    pub fn new(provider: Arc<dyn SecurityProvider>, settings: &SecuritySettings) -> Self {
        Self {
            provider,
            enabled: settings.validate_request_hmac,
        }
    }

    pub fn verify(&self, expected: &str, bytes: &[u8]) -> Result<(), AdmissionError> {
        let actual = self
            .provider
            .compute_hmac(bytes)
            .map_err(|e| AdmissionError::UnableToProcess(e.into()))?;

        if digest::digests_match(expected, &actual) {
            Ok(())
        } else {
            tracing::error!(payload_len = bytes.len(), "Request HMAC mismatch");
            Err(AdmissionError::HmacValidationFailed)
        }
    }
}

impl Stage<DecipheredRequest> for HmacStage {
    type Output = DecipheredRequest;

    fn name(&self) -> &'static str {
        "hmac"
    }

    fn run(&self, input: DecipheredRequest) -> Result<DecipheredRequest, AdmissionError> {
        if !self.enabled {
            return Ok(input);
        }

        let Some(expected) = input
            .request
            .request_hmac
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        else {
            return Err(AdmissionError::MissingParameter(REQUEST_HMAC.to_string()));
        };

        self.verify(expected, &input.hmac_input)?;
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AuthRequest;
    use crate::services::LocalSecurityProvider;

    const BODY: &[u8] = br#"{"timestamp":"2024-01-01T00:00:00.000Z"}"#;

    fn deciphered(request_hmac: Option<String>, hmac_input: &[u8]) -> DecipheredRequest {
        DecipheredRequest {
            uri: "/auth".to_string(),
            request: AuthRequest {
                request_hmac,
                ..AuthRequest::default()
            },
            hmac_input: hmac_input.to_vec(),
            identity_data: Default::default(),
        }
    }

    fn stage(provider: LocalSecurityProvider) -> HmacStage {
        HmacStage::new(Arc::new(provider), &SecuritySettings::default())
    }

    #[test]
    fn test_digest_round_trip_and_byte_flip() {
        let stage = stage(LocalSecurityProvider::new());
        let hmac = digest::sha256_hex(BODY);

        assert!(stage.run(deciphered(Some(hmac.clone()), BODY)).is_ok());

        for index in 0..BODY.len() {
            let mut flipped = BODY.to_vec();
            flipped[index] ^= 0x01;
            assert!(matches!(
                stage.run(deciphered(Some(hmac.clone()), &flipped)),
                Err(AdmissionError::HmacValidationFailed)
            ));
        }
    }

    #[test]
    fn test_keyed_digest() {
        let stage = stage(LocalSecurityProvider::new().with_hmac_key(b"partner-secret"));
        let keyed = digest::hmac_sha256_hex(b"partner-secret", BODY).unwrap();

        assert!(stage.run(deciphered(Some(keyed), BODY)).is_ok());
        assert!(stage
            .run(deciphered(Some(digest::sha256_hex(BODY)), BODY))
            .is_err());
    }

    #[test]
    fn test_missing_hmac() {
        let stage = stage(LocalSecurityProvider::new());
        assert!(matches!(
            stage.run(deciphered(None, BODY)),
            Err(AdmissionError::MissingParameter(ref field)) if field == REQUEST_HMAC
        ));

        let disabled = HmacStage::new(
            Arc::new(LocalSecurityProvider::new()),
            &SecuritySettings {
                validate_request_hmac: false,
                ..SecuritySettings::default()
            },
        );
        assert!(disabled.run(deciphered(None, BODY)).is_ok());
    }
}
