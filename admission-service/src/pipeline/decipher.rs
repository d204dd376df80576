//! Decoding of partner-encoded request sub-fields.
//!
//! Runs after the signature check. The result is re-serialized and parsed into
//! the typed request, so validation only ever sees final field values.

use anyhow::Context;
use serde::Deserialize;
use serde_json::value::RawValue;
use serde_json::Value;
use std::sync::Arc;

use super::{AdmissionError, DecipheredRequest, SignedRequest, Stage};
use crate::config::{DecipherMode, DecipherSettings, SecuritySettings};
use crate::models::AuthRequest;
use crate::services::security::{is_compact_jws, jws_payload_segment};
use crate::services::{DomainType, SecurityProvider};
use crate::validation::structural::{bio_path, REQUEST};

const REQUEST_HMAC: &str = "requestHMAC";
const BIOMETRICS: &str = "biometrics";
const DATA: &str = "data";

pub struct DecipherStage {
    mode: DecipherMode,
    provider: Arc<dyn SecurityProvider>,
    verify_jws_data: bool,
    require_trust_chain: bool,
}

impl DecipherStage {
    pub fn new(
        provider: Arc<dyn SecurityProvider>,
        decipher: &DecipherSettings,
        security: &SecuritySettings,
    ) -> Self {
        Self {
            mode: decipher.mode,
            provider,
            verify_jws_data: security.require_signature,
            require_trust_chain: security.require_trust_chain,
        }
    }

    /// Decode `body` in place and return the bytes the request digest covers.
    /// `raw` is the body exactly as received.
    fn decipher(&self, raw: &[u8], body: &mut Value) -> Result<Vec<u8>, AdmissionError> {
        match self.mode {
            DecipherMode::PassThrough => request_bytes(raw),
            DecipherMode::Base64 => {
                let hmac_input = self.decode_request_block(raw, body)?;
                self.decode_request_hmac(body)?;
                self.decode_biometrics(body)?;
                Ok(hmac_input)
            }
        }
    }

    /// A string `request` block is base64 JSON; its decoded bytes are the
    /// digest input.
    fn decode_request_block(
        &self,
        raw: &[u8],
        body: &mut Value,
    ) -> Result<Vec<u8>, AdmissionError> {
        let Some(Value::String(encoded)) = body.get(REQUEST) else {
            return request_bytes(raw);
        };

        let decoded = self
            .provider
            .decode_base64(encoded)
            .map_err(|_| AdmissionError::DecipherFailed(REQUEST.to_string()))?;
        let block: Value = serde_json::from_slice(&decoded)
            .map_err(|_| AdmissionError::DecipherFailed(REQUEST.to_string()))?;
        body[REQUEST] = block;
        Ok(decoded)
    }

    fn decode_request_hmac(&self, body: &mut Value) -> Result<(), AdmissionError> {
        let Some(Value::String(encoded)) = body.get(REQUEST_HMAC) else {
            return Ok(());
        };

        let decoded = self
            .provider
            .decode_base64(encoded)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .ok_or_else(|| AdmissionError::DecipherFailed(REQUEST_HMAC.to_string()))?;
        body[REQUEST_HMAC] = Value::String(decoded);
        Ok(())
    }

    /// Each `data` given as a string is either a JWS (signature checked under
    /// `JWT_DATA`) or bare base64 JSON.
    fn decode_biometrics(&self, body: &mut Value) -> Result<(), AdmissionError> {
        let Some(blocks) = body
            .get_mut(REQUEST)
            .and_then(|request| request.get_mut(BIOMETRICS))
            .and_then(Value::as_array_mut)
        else {
            return Ok(());
        };

        for (index, block) in blocks.iter_mut().enumerate() {
            let Some(Value::String(encoded)) = block.get(DATA) else {
                continue;
            };
            let decoded = self.decode_bio_data(index, encoded)?;
            block[DATA] = decoded;
        }
        Ok(())
    }

    fn decode_bio_data(&self, index: usize, encoded: &str) -> Result<Value, AdmissionError> {
        let field = || AdmissionError::DecipherFailed(bio_path(index, DATA));

        let segment = if is_compact_jws(encoded) {
            self.verify_jws_data(index, encoded)?;
            jws_payload_segment(encoded)
        } else {
            encoded
        };

        let bytes = self.provider.decode_base64(segment).map_err(|_| field())?;
        serde_json::from_slice(&bytes).map_err(|_| field())
    }

    fn verify_jws_data(&self, index: usize, jws: &str) -> Result<(), AdmissionError> {
        if !self.verify_jws_data {
            return Ok(());
        }

        let verified = self
            .provider
            .verify_signature(jws, DomainType::JwtData, None, self.require_trust_chain)
            .unwrap_or_else(|e| {
                tracing::error!(index, error = %e, "Invalid JWS data");
                false
            });
        if !verified {
            tracing::error!(index, "Biometric data signature verification failed");
            return Err(AdmissionError::SignatureInvalid);
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct Envelope<'a> {
    #[serde(borrow)]
    request: Option<&'a RawValue>,
}

/// The `request` block exactly as the partner sent it, empty when absent.
fn request_bytes(raw: &[u8]) -> Result<Vec<u8>, AdmissionError> {
    let envelope: Envelope<'_> =
        serde_json::from_slice(raw).context("Failed to read request block")?;
    Ok(envelope
        .request
        .map(|block| block.get().as_bytes().to_vec())
        .unwrap_or_default())
}

impl Stage<SignedRequest> for DecipherStage {
    type Output = DecipheredRequest;

    fn name(&self) -> &'static str {
        "decipher"
    }

    fn run(&self, input: SignedRequest) -> Result<DecipheredRequest, AdmissionError> {
        let mut body: Value =
            serde_json::from_slice(&input.body).context("Failed to read request body")?;

        let hmac_input = self.decipher(&input.body, &mut body)?;

        let request: AuthRequest =
            serde_json::from_value(body).context("Failed to parse deciphered request")?;

        Ok(DecipheredRequest {
            uri: input.uri,
            request,
            hmac_input,
            identity_data: input.identity_data,
        })
    }
}
