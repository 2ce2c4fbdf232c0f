//! Node readings: listing, raw line submission and `.txt` uploads

use axum::{
    extract::{Multipart, Query, State},
    http::StatusCode,
    Json,
};
use fieldnet_common::db::Reading;
use fieldnet_common::time::{day_bounds, parse_datetime, parse_datetime_exact, parse_day, response_stamp};
use fieldnet_common::validation::integer_of;
use fieldnet_common::ValidationErrors;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, warn};

use super::payload::read_document;
use crate::db::{nodes, readings};
use crate::db::readings::{ReadingFilter, ReadingOrder};
use crate::ingest::has_extension;
use crate::ingest::readings::{data_lines, is_header, split_line, ReadingInput, TXT_DATE_FORMAT};
use crate::pagination::{Page, PageRequest};
use crate::{error::ApiError, ApiResult, AppState};

fn param<'a>(params: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    params.get(name).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// GET /api/nodes/storage/
///
/// Filters: `node_id`, `start_date` + `end_date` (`DD-MM-YYYY`, whole
/// days), `order_by`.
pub async fn list_readings(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    page: PageRequest,
) -> ApiResult<Json<Page<Reading>>> {
    let mut filter = ReadingFilter {
        order: ReadingOrder::parse(params.get("order_by").map(String::as_str)),
        ..ReadingFilter::default()
    };

    if let Some(raw) = param(&params, "node_id") {
        let missing = || ApiError::BadRequest(format!("Node with id {} does not exist!", raw));
        let node_id = raw.parse::<i64>().map_err(|_| missing())?;
        let by_node = ReadingFilter {
            node_id: Some(node_id),
            ..ReadingFilter::default()
        };
        if readings::count(&state.db, &by_node).await? == 0 {
            return Err(missing());
        }
        filter.node_id = Some(node_id);
    }

    if let (Some(start), Some(end)) = (param(&params, "start_date"), param(&params, "end_date")) {
        let (Some(start), Some(end)) = (parse_day(start), parse_day(end)) else {
            return Err(ApiError::BadRequest(
                "Dates must use the DD-MM-YYYY format!".to_string(),
            ));
        };
        if start > end {
            return Err(ApiError::BadRequest(
                "Start date cannot be greater than end date!".to_string(),
            ));
        }
        filter.between = Some((day_bounds(start).0, day_bounds(end).1));
    }

    let total = readings::count(&state.db, &filter).await?;
    let window = page.window(total)?;
    let results = readings::list(&state.db, &filter, window.limit, window.offset).await?;

    Ok(Json(page.page(window, total, results)))
}

/// POST /api/nodes/storage/
///
/// Raw text body, one reading per line. Lines are saved as they
/// validate; the first bad line stops processing.
pub async fn create_readings(
    State(state): State<AppState>,
    body: String,
) -> ApiResult<(StatusCode, Json<Value>)> {
    if body.trim().is_empty() {
        return Err(ApiError::BadReadings("Please provide data!".to_string()));
    }

    let mut messages = Vec::new();
    for line in data_lines(&body) {
        let obj = split_line(line)
            .map_err(|_| ApiError::BadReadings("Format data is not correct!".to_string()))?;

        let node_id = obj.get("node").and_then(integer_of);
        let date_time = obj
            .get("date_time")
            .and_then(Value::as_str)
            .and_then(parse_datetime);
        if let (Some(node_id), Some(date_time)) = (node_id, date_time) {
            if readings::exists_at(&state.db, node_id, date_time).await? {
                continue;
            }
        }

        let reading = ReadingInput::from_payload(&obj).map_err(ApiError::Fields)?;
        if !nodes::exists(&state.db, reading.node_id).await? {
            return Err(ApiError::Fields(ValidationErrors::single(
                "node",
                format!("Invalid pk \"{}\" - object does not exist.", reading.node_id),
            )));
        }

        readings::insert_if_absent(&state.db, &reading).await?;
        messages.push(format!("Node {} data created successfully!", reading.node_id));
    }

    info!(count = messages.len(), "Stored node readings");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "messages": messages, "datetime": response_stamp() })),
    ))
}

/// Validate every data line of an exported `.txt` file
///
/// Header and blank lines are skipped. Errors name the 1-based line.
fn parse_txt(text: &str) -> Result<Vec<ReadingInput>, ApiError> {
    let mut parsed = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let number = index + 1;
        let line = line.trim();
        if line.is_empty() || is_header(line) {
            continue;
        }

        let obj = split_line(line).map_err(|found| {
            ApiError::Upload(format!(
                "Line {}: expected 15 fields, found {}",
                number, found
            ))
        })?;

        let raw_date = obj.get("date_time").and_then(Value::as_str).unwrap_or_default();
        if parse_datetime_exact(raw_date, TXT_DATE_FORMAT).is_none() {
            return Err(ApiError::Upload(format!(
                "Line {}: time data '{}' does not match format '{}'",
                number, raw_date, TXT_DATE_FORMAT
            )));
        }

        let reading = ReadingInput::from_payload(&obj)
            .map_err(|e| ApiError::Upload(format!("Line {}: {}", number, e)))?;
        parsed.push(reading);
    }

    Ok(parsed)
}

/// POST /api/nodes/storage/txt/
///
/// Multipart `document` in `.txt` format. All lines are validated
/// before anything is written; the batch is saved in one transaction.
pub async fn upload_readings(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let document = read_document(multipart)
        .await?
        .ok_or_else(|| ApiError::BadRequest("Please provide a document!".to_string()))?;

    if !has_extension(&document.file_name, "txt") {
        return Err(ApiError::Fields(ValidationErrors::single(
            "document",
            "The file must be in .txt format",
        )));
    }

    let text = String::from_utf8_lossy(&document.bytes);
    let parsed = parse_txt(&text)?;

    let mut checked = Vec::new();
    for reading in &parsed {
        if checked.contains(&reading.node_id) {
            continue;
        }
        if !nodes::exists(&state.db, reading.node_id).await? {
            return Err(ApiError::Upload(format!(
                "Node with id {} does not exist",
                reading.node_id
            )));
        }
        checked.push(reading.node_id);
    }

    let mut tx = state.db.begin().await?;
    let mut inserted = 0usize;
    for reading in &parsed {
        if readings::insert_if_absent(&mut *tx, reading).await? {
            inserted += 1;
        }
    }
    tx.commit().await?;

    if inserted < parsed.len() {
        warn!(
            file = %document.file_name,
            skipped = parsed.len() - inserted,
            "Skipped readings that were already stored"
        );
    }
    info!(file = %document.file_name, inserted, "Uploaded node readings");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Document uploaded successfully!" })),
    ))
}
