//! Cryptographic capability consumed by the pipeline.
//!
//! The pipeline only sees the `SecurityProvider` trait. `LocalSecurityProvider`
//! verifies EdDSA JWS signatures against configured partner keys and computes
//! request digests in process.

use base64::{
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
    Engine as _,
};
use jsonwebtoken::{crypto, decode_header, Algorithm, DecodingKey};
use serde::Deserialize;
use std::collections::HashMap;
use thiserror::Error;

use crate::config::{PartnerKeyConfig, SecuritySettings};
use service_core::utils::digest;

/// What a signature vouches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum DomainType {
    /// Detached signature over the raw request body.
    #[serde(rename = "AUTH")]
    Auth,
    /// Attached JWS carried inside the payload (biometric data blocks).
    #[serde(rename = "JWT_DATA")]
    JwtData,
}

impl DomainType {
    pub fn as_str(self) -> &'static str {
        match self {
            DomainType::Auth => "AUTH",
            DomainType::JwtData => "JWT_DATA",
        }
    }
}

#[derive(Debug, Error)]
pub enum SecurityError {
    #[error("Malformed JWS: {0}")]
    MalformedJws(String),

    #[error("Unsupported JWS algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),

    #[error("No partner key configured for domain {0}")]
    UnknownKey(&'static str),

    #[error("Partner key for domain {0} is not trusted")]
    UntrustedKey(&'static str),

    #[error("Invalid partner key: {0}")]
    InvalidKey(String),

    #[error("Invalid JWS: {0}")]
    InvalidJws(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid base64 value: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Digest error: {0}")]
    Digest(#[from] anyhow::Error),
}

/// Signature, digest and decode primitives. Implementations are shared by
/// every in-flight request and must be safe for concurrent use.
pub trait SecurityProvider: Send + Sync {
    /// Verify `signature` for `domain`. With `payload` the signature is
    /// detached and covers those bytes; without it the signature carries its
    /// own payload.
    fn verify_signature(
        &self,
        signature: &str,
        domain: DomainType,
        payload: Option<&[u8]>,
        require_trust_chain: bool,
    ) -> Result<bool, SecurityError>;

    fn compute_hmac(&self, bytes: &[u8]) -> Result<String, SecurityError>;

    fn decode_base64(&self, value: &str) -> Result<Vec<u8>, SecurityError> {
        decode_base64(value)
    }
}

/// URL-safe (padded or not) first, then the standard alphabet.
pub fn decode_base64(value: &str) -> Result<Vec<u8>, SecurityError> {
    let trimmed = value.trim();
    URL_SAFE_NO_PAD
        .decode(trimmed.trim_end_matches('='))
        .or_else(|_| STANDARD.decode(trimmed))
        .map_err(SecurityError::from)
}

/// Payload segment of a compact JWS, or the input itself if it is not one.
pub fn jws_payload_segment(jws: &str) -> &str {
    jws.split('.').nth(1).unwrap_or(jws)
}

pub fn is_compact_jws(value: &str) -> bool {
    value.split('.').count() == 3
}

/// Ed25519 verification key from the raw 32-byte public key.
pub fn ed25519_key(public_key: &[u8]) -> Result<DecodingKey, SecurityError> {
    if public_key.len() != 32 {
        return Err(SecurityError::InvalidKey(format!(
            "expected 32 bytes, got {}",
            public_key.len()
        )));
    }
    Ok(DecodingKey::from_ed_components(&URL_SAFE_NO_PAD.encode(public_key))?)
}

#[derive(Clone)]
struct PartnerKey {
    key: DecodingKey,
    trusted: bool,
}

/// In-process provider backed by ed25519 partner keys.
#[derive(Clone, Default)]
pub struct LocalSecurityProvider {
    keys: HashMap<DomainType, PartnerKey>,
    hmac_key: Option<Vec<u8>>,
}

impl LocalSecurityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &SecuritySettings) -> Result<Self, SecurityError> {
        let mut provider = Self::new();
        for PartnerKeyConfig {
            domain,
            public_key,
            trusted,
        } in &settings.partner_keys
        {
            let key = ed25519_key(&decode_base64(public_key)?)?;
            provider = provider.with_key(*domain, key, *trusted);
        }
        if let Some(secret) = settings.hmac_key.as_ref() {
            provider = provider.with_hmac_key(secret.as_bytes());
        }

        tracing::info!(
            keys = provider.keys.len(),
            keyed_digest = provider.hmac_key.is_some(),
            "Security provider initialized"
        );
        Ok(provider)
    }

    pub fn with_key(mut self, domain: DomainType, key: DecodingKey, trusted: bool) -> Self {
        self.keys.insert(domain, PartnerKey { key, trusted });
        self
    }

    pub fn with_hmac_key(mut self, secret: &[u8]) -> Self {
        self.hmac_key = Some(secret.to_vec());
        self
    }
}

impl SecurityProvider for LocalSecurityProvider {
    fn verify_signature(
        &self,
        signature: &str,
        domain: DomainType,
        payload: Option<&[u8]>,
        require_trust_chain: bool,
    ) -> Result<bool, SecurityError> {
        let partner = self
            .keys
            .get(&domain)
            .ok_or(SecurityError::UnknownKey(domain.as_str()))?;
        if require_trust_chain && !partner.trusted {
            return Err(SecurityError::UntrustedKey(domain.as_str()));
        }

        let jws = signature.trim();
        let header = decode_header(jws)?;
        if header.alg != Algorithm::EdDSA {
            return Err(SecurityError::UnsupportedAlgorithm(header.alg));
        }

        let Some((message, signature_part)) = jws.rsplit_once('.') else {
            return Err(SecurityError::MalformedJws("missing signature segment".to_string()));
        };
        let signing_input = match (payload, message.split_once('.')) {
            (Some(bytes), Some((encoded_header, ""))) => {
                format!("{}.{}", encoded_header, URL_SAFE_NO_PAD.encode(bytes))
            }
            (None, Some((_, embedded))) if !embedded.is_empty() => message.to_string(),
            _ => {
                return Err(SecurityError::MalformedJws(
                    "payload segment does not match signature form".to_string(),
                ))
            }
        };

        Ok(crypto::verify(
            signature_part,
            signing_input.as_bytes(),
            &partner.key,
            Algorithm::EdDSA,
        )?)
    }

    fn compute_hmac(&self, bytes: &[u8]) -> Result<String, SecurityError> {
        match self.hmac_key.as_deref() {
            Some(secret) => Ok(digest::hmac_sha256_hex(secret, bytes)?),
            None => Ok(digest::sha256_hex(bytes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn header() -> String {
        URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA"}"#)
    }

    fn detached(key: &SigningKey, payload: &[u8]) -> String {
        let header = header();
        let input = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));
        let signature = key.sign(input.as_bytes());
        format!("{}..{}", header, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
    }

    fn partner_key(key: &SigningKey) -> DecodingKey {
        ed25519_key(key.verifying_key().as_bytes()).unwrap()
    }

    fn provider(trusted: bool) -> LocalSecurityProvider {
        let key = partner_key(&signing_key());
        LocalSecurityProvider::new().with_key(DomainType::Auth, key, trusted)
    }

    #[test]
    fn test_detached_signature_round_trip() {
        let body = br#"{"transactionID":"1234567890"}"#;
        let jws = detached(&signing_key(), body);

        assert!(provider(false)
            .verify_signature(&jws, DomainType::Auth, Some(body), false)
            .unwrap());
        assert!(!provider(false)
            .verify_signature(&jws, DomainType::Auth, Some(b"{}"), false)
            .unwrap());
    }

    #[test]
    fn test_trust_chain_requires_trusted_key() {
        let body = b"payload";
        let jws = detached(&signing_key(), body);

        assert!(matches!(
            provider(false).verify_signature(&jws, DomainType::Auth, Some(body), true),
            Err(SecurityError::UntrustedKey("AUTH"))
        ));
        assert!(provider(true)
            .verify_signature(&jws, DomainType::Auth, Some(body), true)
            .unwrap());
    }

    #[test]
    fn test_malformed_inputs_are_errors() {
        let provider = provider(false);
        assert!(provider
            .verify_signature("not-a-jws", DomainType::Auth, Some(b"x"), false)
            .is_err());
        assert!(matches!(
            provider.verify_signature("a.b.c", DomainType::JwtData, None, false),
            Err(SecurityError::UnknownKey("JWT_DATA"))
        ));

        let rs256 = format!("{}..AAAA", URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#));
        assert!(matches!(
            provider.verify_signature(&rs256, DomainType::Auth, Some(b"x"), false),
            Err(SecurityError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_attached_signature_and_form_mismatch() {
        let input = format!("{}.{}", header(), URL_SAFE_NO_PAD.encode(br#"{"bioType":"Iris"}"#));
        let signature = URL_SAFE_NO_PAD.encode(signing_key().sign(input.as_bytes()).to_bytes());
        let attached = format!("{}.{}", input, signature);
        let provider = LocalSecurityProvider::new().with_key(
            DomainType::JwtData,
            partner_key(&signing_key()),
            false,
        );

        assert!(provider
            .verify_signature(&attached, DomainType::JwtData, None, false)
            .unwrap());
        assert!(matches!(
            provider.verify_signature(&attached, DomainType::JwtData, Some(b"x"), false),
            Err(SecurityError::MalformedJws(_))
        ));

        let other = SigningKey::from_bytes(&[8u8; 32]);
        let forged = LocalSecurityProvider::new().with_key(
            DomainType::JwtData,
            partner_key(&other),
            false,
        );
        assert!(!forged
            .verify_signature(&attached, DomainType::JwtData, None, false)
            .unwrap());
    }

    #[test]
    fn test_partner_key_length_checked() {
        assert!(matches!(ed25519_key(&[1u8; 31]), Err(SecurityError::InvalidKey(_))));
        assert!(ed25519_key(&[1u8; 32]).is_ok());
    }

    #[test]
    fn test_compute_hmac_modes() {
        let plain = LocalSecurityProvider::new();
        assert_eq!(plain.compute_hmac(b"abc").unwrap(), digest::sha256_hex(b"abc"));

        let keyed = LocalSecurityProvider::new().with_hmac_key(b"secret");
        assert_ne!(keyed.compute_hmac(b"abc").unwrap(), digest::sha256_hex(b"abc"));
    }

    #[test]
    fn test_decode_base64_variants() {
        assert_eq!(decode_base64("aGVsbG8").unwrap(), b"hello");
        assert_eq!(decode_base64("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64("-_8").unwrap(), vec![0xfb, 0xff]);
        assert!(decode_base64("***").is_err());
    }

    #[test]
    fn test_jws_helpers() {
        assert!(is_compact_jws("a.b.c"));
        assert!(!is_compact_jws("abc"));
        assert_eq!(jws_payload_segment("a.b.c"), "b");
        assert_eq!(jws_payload_segment("abc"), "abc");
    }
}
