use crate::pipeline::RawRequest;
use crate::AppState;
use serde::Serialize;
use service_core::{
    axum::{
        body::Bytes,
        extract::{OriginalUri, State},
        http::HeaderMap,
        Json,
    },
    error::AppError,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionResponse {
    pub transaction_id: Option<String>,
    pub status: &'static str,
}

/// Admit a partner authentication request.
///
/// The pipeline does blocking crypto and provider calls, so it runs off the
/// async workers.
pub async fn authenticate(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AdmissionResponse>, AppError> {
    let pipeline = state.pipeline.clone();
    let raw = RawRequest::new(uri.path(), headers, body);

    let request = tokio::task::spawn_blocking(move || pipeline.admit(raw))
        .await
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Admission task failed: {}", e)))??;

    Ok(Json(AdmissionResponse {
        transaction_id: request.transaction_id,
        status: "ADMITTED",
    }))
}
