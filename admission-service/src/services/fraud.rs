//! Fraud-analysis notifications for suspicious requests.

use chrono::{DateTime, Utc};
use serde::Serialize;
use service_core::utils::digest;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FraudEventType {
    /// Request body failed digital signature verification
    DigitalSignatureFailure,
}

/// One fraud-analysis event. The payload itself is never kept, only its
/// size and digest.
#[derive(Debug, Clone, Serialize)]
pub struct FraudEvent {
    pub id: String,
    pub event_type: FraudEventType,
    pub request_uri: String,
    pub payload_len: usize,
    pub payload_sha256: String,
    pub created_at: DateTime<Utc>,
}

impl FraudEvent {
    pub fn signature_failure(request_uri: &str, payload: &[u8]) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            event_type: FraudEventType::DigitalSignatureFailure,
            request_uri: request_uri.to_string(),
            payload_len: payload.len(),
            payload_sha256: digest::sha256_hex(payload),
            created_at: Utc::now(),
        }
    }
}

/// Best-effort sink. Callers ignore failures.
pub trait FraudAnalytics: Send + Sync {
    fn on_signature_failure(&self, request_uri: &str, payload: &[u8]) -> Result<(), anyhow::Error>;
}

/// Emits events to the structured log.
#[derive(Debug, Clone, Default)]
pub struct AuditLogFraudAnalytics;

impl FraudAnalytics for AuditLogFraudAnalytics {
    fn on_signature_failure(&self, request_uri: &str, payload: &[u8]) -> Result<(), anyhow::Error> {
        let event = FraudEvent::signature_failure(request_uri, payload);
        tracing::warn!(
            event_id = %event.id,
            request_uri = %event.request_uri,
            payload_len = event.payload_len,
            payload_sha256 = %event.payload_sha256,
            event = %serde_json::to_string(&event)?,
            "Fraud analysis: digital signature failure"
        );
        Ok(())
    }
}

/// Keeps events in memory.
pub struct RecordingFraudAnalytics {
    pub events: Mutex<Vec<FraudEvent>>,
}

impl Default for RecordingFraudAnalytics {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingFraudAnalytics {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    pub fn events(&self) -> Vec<FraudEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl FraudAnalytics for RecordingFraudAnalytics {
    fn on_signature_failure(&self, request_uri: &str, payload: &[u8]) -> Result<(), anyhow::Error> {
        self.events
            .lock()
            .map_err(|e| anyhow::anyhow!("Fraud event mutex poisoned: {}", e))?
            .push(FraudEvent::signature_failure(request_uri, payload));
        Ok(())
    }
}
