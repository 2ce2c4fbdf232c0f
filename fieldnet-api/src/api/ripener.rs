//! Ripener machine sessions and their node telemetry

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use fieldnet_common::db::{Machine, MachineNode};
use fieldnet_common::validation::{merge_patch, DecimalSpec, Fields};
use fieldnet_common::ValidationErrors;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use tracing::info;

use super::payload::Payload;
use crate::db::machines::{self, MachineInput, MachineNodeInput, MachineScope};
use crate::{error::ApiError, ApiResult, AppState};

const MEASURE: DecimalSpec = DecimalSpec::new(10, 2);

const READ_ONLY: [&str; 4] = ["id", "created_at", "updated_at", "deleted_at"];

fn machine_form(obj: &Map<String, Value>) -> Result<MachineInput, ValidationErrors> {
    let mut f = Fields::new(obj);
    let rod_set = f.decimal("rod_set", MEASURE);
    let flow_pump = f.decimal("flow_pump", MEASURE);
    let time_start = f.datetime("time_start");
    let time_on = f.decimal("time_on", MEASURE);
    let is_active = f.boolean("is_active", true);
    f.finish()?;

    match (rod_set, flow_pump, time_start, time_on) {
        (Some(rod_set), Some(flow_pump), Some(time_start), Some(time_on)) => Ok(MachineInput {
            rod_set,
            flow_pump,
            time_start,
            time_on,
            is_active,
        }),
        _ => Err(ValidationErrors::single("non_field_errors", "Invalid data.")),
    }
}

fn machine_node_form(obj: &Map<String, Value>) -> Result<MachineNodeInput, ValidationErrors> {
    let mut f = Fields::new(obj);
    let machine_id = f.integer("node");
    let temperature_rod = f.nullable_decimal("temperature_rod", MEASURE);
    let temperature_environment = f.nullable_decimal("temperature_environment", MEASURE);
    let humidity_environment = f.nullable_decimal("humidity_environment", MEASURE);
    let concentration_c2h4 = f.nullable_decimal("concentration_c2h4", MEASURE);
    let concentration_ozone = f.nullable_decimal("concentration_ozone", MEASURE);
    let info_extra = f.nullable_json("info_extra");
    let id_node = f.nullable_string("id_node", 50);
    let is_active = f.boolean("is_active", true);
    f.finish()?;

    let machine_id = machine_id
        .ok_or_else(|| ValidationErrors::single("node", fieldnet_common::validation::REQUIRED))?;
    Ok(MachineNodeInput {
        machine_id,
        temperature_rod,
        temperature_environment,
        humidity_environment,
        concentration_c2h4,
        concentration_ozone,
        info_extra,
        id_node,
        is_active,
    })
}

/// Serialized row as an object, for merging partial updates
fn as_object<T: Serialize>(row: &T) -> Map<String, Value> {
    match serde_json::to_value(row) {
        Ok(Value::Object(obj)) => obj,
        _ => Map::new(),
    }
}

/// Parse a `machine` query id; anything non-numeric matches nothing
fn machine_param(params: &HashMap<String, String>) -> Option<Option<i64>> {
    let raw = params.get("machine").map(|v| v.trim()).filter(|v| !v.is_empty())?;
    Some(raw.parse::<i64>().ok())
}

/// GET /api/ripener/
///
/// `?all=<any>` lists every session, `?machine=<id>` one session,
/// otherwise the active ones.
pub async fn list_machines(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<Machine>>> {
    let scope = if params.get("all").is_some_and(|v| !v.is_empty()) {
        MachineScope::All
    } else {
        match machine_param(&params) {
            Some(Some(id)) => MachineScope::One(id),
            Some(None) => return Ok(Json(Vec::new())),
            None => MachineScope::Active,
        }
    };

    Ok(Json(machines::list_machines(&state.db, scope).await?))
}

/// POST /api/ripener/
pub async fn create_machine(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let machine = machine_form(&body)
        .map_err(|e| ApiError::invalid("machine session not created!", e))?;
    let id = machines::insert_machine(&state.db, &machine).await?;

    info!(machine_id = id, "Machine session created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "machine session created successfully!",
            "machine_id": id,
        })),
    ))
}

/// PUT /api/ripener/
pub async fn update_machine(State(state): State<AppState>, payload: Payload) -> ApiResult<Json<Value>> {
    let not_found = || ApiError::NotFound("Machine not found!".to_string());
    let id = payload.target_id().ok_or_else(not_found)?;
    let existing = machines::get_machine(&state.db, id)
        .await?
        .ok_or_else(not_found)?;

    let mut merged = as_object(&existing);
    merge_patch(&mut merged, &payload.0, &READ_ONLY);
    let machine = machine_form(&merged)
        .map_err(|e| ApiError::invalid("machine session not updated!", e))?;
    machines::update_machine(&state.db, id, &machine).await?;

    info!(machine_id = id, "Machine session updated");

    Ok(Json(json!({
        "message": "machine session updated successfully!",
        "machine_id": id,
    })))
}

/// GET /api/ripener/nodes/
pub async fn list_machine_nodes(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<MachineNode>>> {
    let machine_id = match machine_param(&params) {
        Some(Some(id)) => Some(id),
        Some(None) => return Ok(Json(Vec::new())),
        None => None,
    };

    Ok(Json(machines::list_nodes(&state.db, machine_id).await?))
}

/// Reject telemetry that points at an unknown machine
async fn check_machine(state: &AppState, node: &MachineNodeInput) -> ApiResult<Option<ValidationErrors>> {
    if machines::get_machine(&state.db, node.machine_id).await?.is_some() {
        Ok(None)
    } else {
        Ok(Some(ValidationErrors::single(
            "node",
            format!("Invalid pk \"{}\" - object does not exist.", node.machine_id),
        )))
    }
}

/// POST /api/ripener/nodes/
pub async fn create_machine_node(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> ApiResult<(StatusCode, Json<Value>)> {
    const FAILED: &str = "Node not created!";
    let node = machine_node_form(&body).map_err(|e| ApiError::invalid(FAILED, e))?;
    if let Some(errors) = check_machine(&state, &node).await? {
        return Err(ApiError::invalid(FAILED, errors));
    }

    let id = machines::insert_node(&state.db, &node).await?;
    info!(node_id = id, machine_id = node.machine_id, "Machine node created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Node created successfully!" })),
    ))
}

/// PUT /api/ripener/nodes/
pub async fn update_machine_node(
    State(state): State<AppState>,
    payload: Payload,
) -> ApiResult<Json<Value>> {
    const FAILED: &str = "Node not updated!";
    let not_found = || ApiError::NotFound("Node not found!".to_string());
    let id = payload.target_id().ok_or_else(not_found)?;
    let existing = machines::get_node(&state.db, id).await?.ok_or_else(not_found)?;

    let mut merged = as_object(&existing);
    merge_patch(&mut merged, &payload.0, &READ_ONLY);
    let node = machine_node_form(&merged).map_err(|e| ApiError::invalid(FAILED, e))?;
    if let Some(errors) = check_machine(&state, &node).await? {
        return Err(ApiError::invalid(FAILED, errors));
    }

    machines::update_node(&state.db, id, &node).await?;
    info!(node_id = id, "Machine node updated");

    Ok(Json(json!({
        "message": format!("Node with id {} updated successfully!", id),
        "machine_id": node.machine_id,
    })))
}
