//! Test helpers for admission-service integration tests.
//!
//! Builds signed, fresh requests and a pipeline wired with in-memory
//! collaborators so tests can inspect fraud events and toggle filters.

#![allow(dead_code)]

use admission_service::{
    config::{AdmissionConfig, PartnerKeyConfig},
    pipeline::{AdmissionPipeline, InMemoryFilterRegistry, PipelineDependencies, RawRequest},
    services::{DomainType, LocalSecurityProvider, RecordingFraudAnalytics},
};
use axum::body::Bytes;
use axum::http::{header::AUTHORIZATION, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use ed25519_dalek::{Signer, SigningKey};
use serde_json::{json, Value};
use service_core::utils::digest;
use std::sync::Arc;

pub const AUTH_URI: &str = "/idauthentication/v1/auth";
pub const DOMAIN_URI: &str = "https://ida.example.org";
pub const ENV: &str = "Staging";
pub const TRANSACTION_ID: &str = "1234567890";

pub fn signing_key() -> SigningKey {
    SigningKey::from_bytes(&[42u8; 32])
}

/// `requestTime` / `request.timestamp` shifted by `offset_seconds` from now.
pub fn request_time(offset_seconds: i64) -> String {
    (Utc::now() + Duration::seconds(offset_seconds))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

/// Biometric capture time shifted by `offset_seconds` from now.
pub fn bio_time(offset_seconds: i64) -> String {
    (Utc::now() + Duration::seconds(offset_seconds))
        .format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        .to_string()
}

pub fn bio_block() -> Value {
    json!({
        "data": {
            "bioType": "Finger",
            "bioSubType": "Left IndexFinger",
            "bioValue": "Rk1SACAyMAAAAAFiAAABPAFiAMUAxQEAAAAoOECEAGE",
            "timestamp": bio_time(0),
            "domainUri": DOMAIN_URI,
            "env": ENV,
            "deviceCode": "DC-7781",
            "deviceServiceVersion": "0.9.5",
            "digitalId": {
                "dateTime": bio_time(0),
                "serialNo": "SN-20240501",
                "make": "Acme",
                "model": "FS-100",
                "type": "Finger",
                "deviceSubType": "Single",
                "dp": "Acme Devices",
                "dpId": "ACME-01"
            }
        }
    })
}

/// Complete biometric request with `bio_count` blocks and a matching
/// `requestHMAC`.
pub fn valid_request(bio_count: usize) -> Value {
    let mut body = json!({
        "id": "mosip.identity.auth",
        "version": "1.0",
        "requestTime": request_time(0),
        "transactionID": TRANSACTION_ID,
        "consentObtained": true,
        "individualId": "9830872690593682",
        "individualIdType": "VID",
        "domainUri": DOMAIN_URI,
        "env": ENV,
        "requestedAuth": { "bio": true },
        "request": {
            "timestamp": request_time(0),
            "biometrics": (0..bio_count).map(|_| bio_block()).collect::<Vec<_>>()
        }
    });
    refresh_hmac(&mut body);
    body
}

/// Recompute `requestHMAC` over the current `request` block.
pub fn refresh_hmac(body: &mut Value) {
    let bytes = serde_json::to_vec(&body["request"]).unwrap();
    body["requestHMAC"] = Value::String(digest::sha256_hex(&bytes));
}

fn jws_header() -> String {
    URL_SAFE_NO_PAD.encode(br#"{"alg":"EdDSA"}"#)
}

/// Detached compact JWS (`header..signature`) over `payload`.
pub fn detached_signature(key: &SigningKey, payload: &[u8]) -> String {
    let header = jws_header();
    let input = format!("{}.{}", header, URL_SAFE_NO_PAD.encode(payload));
    let signature = key.sign(input.as_bytes());
    format!("{}..{}", header, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

/// Attached compact JWS carrying `payload`.
pub fn attached_jws(key: &SigningKey, payload: &Value) -> String {
    let input = format!(
        "{}.{}",
        jws_header(),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap())
    );
    let signature = key.sign(input.as_bytes());
    format!("{}.{}", input, URL_SAFE_NO_PAD.encode(signature.to_bytes()))
}

pub fn test_config() -> AdmissionConfig {
    let public_key = URL_SAFE_NO_PAD.encode(signing_key().verifying_key().to_bytes());

    let mut config = AdmissionConfig::default();
    config.log_level = "error".to_string();
    config.security.partner_keys = vec![
        PartnerKeyConfig {
            domain: DomainType::Auth,
            public_key: public_key.clone(),
            trusted: true,
        },
        PartnerKeyConfig {
            domain: DomainType::JwtData,
            public_key,
            trusted: true,
        },
    ];
    config.validation.allowed_domain_uris = vec![DOMAIN_URI.to_string()];
    config
}

pub struct TestPipeline {
    pub pipeline: AdmissionPipeline,
    pub fraud: Arc<RecordingFraudAnalytics>,
    pub filters: Arc<InMemoryFilterRegistry>,
}

impl TestPipeline {
    pub fn new(config: &AdmissionConfig) -> Self {
        Self::with_filters(config, InMemoryFilterRegistry::from_settings(&config.filters))
    }

    pub fn with_filters(config: &AdmissionConfig, filters: InMemoryFilterRegistry) -> Self {
        let security = LocalSecurityProvider::from_settings(&config.security)
            .expect("Failed to build security provider");
        let fraud = Arc::new(RecordingFraudAnalytics::new());
        let filters = Arc::new(filters);

        let pipeline = AdmissionPipeline::new(
            config,
            PipelineDependencies {
                security: Arc::new(security),
                fraud: fraud.clone(),
                filters: filters.clone(),
            },
        );

        Self {
            pipeline,
            fraud,
            filters,
        }
    }
}

/// Raw request for `body` with a valid signature and authorization header.
pub fn signed_raw(body: &Value) -> RawRequest {
    let bytes = serde_json::to_vec(body).unwrap();
    let signature = detached_signature(&signing_key(), &bytes);
    raw_with_headers(bytes, Some(&signature), Some("Bearer consent-token"))
}

pub fn raw_with_headers(
    bytes: Vec<u8>,
    signature: Option<&str>,
    authorization: Option<&str>,
) -> RawRequest {
    let mut headers = HeaderMap::new();
    if let Some(signature) = signature {
        headers.insert("signature", HeaderValue::from_str(signature).unwrap());
    }
    if let Some(authorization) = authorization {
        headers.insert(AUTHORIZATION, HeaderValue::from_str(authorization).unwrap());
    }
    RawRequest::new(AUTH_URI, headers, Bytes::from(bytes))
}
