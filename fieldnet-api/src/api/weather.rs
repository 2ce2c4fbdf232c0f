//! Weather station records

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use fieldnet_common::db::WeatherRecord;
use serde_json::{json, Value};
use tracing::info;

use super::payload::read_document;
use crate::db::weather;
use crate::ingest::has_extension;
use crate::ingest::weather::{parse_workbook, validate_records};
use crate::pagination::{Page, PageRequest};
use crate::{error::ApiError, ApiResult, AppState};

fn document_error(message: impl Into<String>) -> ApiError {
    ApiError::UploadRejected(json!({ "document": [message.into()] }))
}

/// GET /api/nodes/weather-station/
pub async fn list_weather(
    State(state): State<AppState>,
    page: PageRequest,
) -> ApiResult<Json<Page<WeatherRecord>>> {
    let total = weather::count(&state.db).await?;
    let window = page.window(total)?;
    let results = weather::list(&state.db, window.limit, window.offset).await?;
    Ok(Json(page.page(window, total, results)))
}

/// POST /api/nodes/weather-station/
///
/// Multipart `document` in `.xlsx` format. One invalid record rejects
/// the whole workbook.
pub async fn upload_weather(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let document = read_document(multipart)
        .await?
        .ok_or_else(|| document_error("No file was submitted."))?;

    if !has_extension(&document.file_name, "xlsx") {
        return Err(document_error("The file must be in .xlsx format"));
    }

    let bytes = document.bytes.clone();
    let records = tokio::task::spawn_blocking(move || parse_workbook(&bytes))
        .await
        .map_err(|e| fieldnet_common::Error::Internal(format!("Workbook parser failed: {}", e)))?
        .map_err(|e| document_error(e.to_string()))?;

    let inputs = validate_records(&records).map_err(ApiError::UploadRejected)?;

    let mut tx = state.db.begin().await?;
    let mut inserted = 0usize;
    for input in &inputs {
        if weather::insert_if_absent(&mut *tx, input).await? {
            inserted += 1;
        }
    }
    tx.commit().await?;

    info!(
        file = %document.file_name,
        records = inputs.len(),
        inserted,
        "Uploaded weather station workbook"
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Document uploaded successfully" })),
    ))
}
