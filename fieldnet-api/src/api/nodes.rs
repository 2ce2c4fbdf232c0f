//! Sensor node registry

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fieldnet_common::db::{Node, NODE_TYPES};
use fieldnet_common::validation::{merge_patch, DecimalSpec, Fields};
use fieldnet_common::ValidationErrors;
use serde_json::{json, Map, Value};
use tracing::info;

use super::payload::Payload;
use crate::db::nodes::{self, NodeInput};
use crate::{error::ApiError, ApiResult, AppState};

const COORDINATE: DecimalSpec = DecimalSpec::new(9, 6);

const READ_ONLY: [&str; 5] = ["id", "created_at", "updated_at", "deleted_at", "is_active"];

fn node_form(obj: &Map<String, Value>) -> Result<NodeInput, ValidationErrors> {
    let mut f = Fields::new(obj);
    let name = f.string("name", 255);
    let node_type = f.choice("type", &NODE_TYPES);
    let description = f.blank_string("description", usize::MAX);
    let latitude = f.decimal("latitude", COORDINATE);
    let longitude = f.decimal("longitude", COORDINATE);
    f.finish()?;

    match (name, node_type, latitude, longitude) {
        (Some(name), Some(node_type), Some(latitude), Some(longitude)) => Ok(NodeInput {
            name,
            node_type,
            description,
            latitude,
            longitude,
        }),
        _ => Err(ValidationErrors::single("non_field_errors", "Invalid data.")),
    }
}

/// GET /api/nodes/
pub async fn list_nodes(State(state): State<AppState>) -> ApiResult<Json<Vec<Node>>> {
    Ok(Json(nodes::list_active(&state.db).await?))
}

/// POST /api/nodes/
pub async fn create_node(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let node = node_form(&body).map_err(|e| ApiError::invalid("Node not created!", e))?;
    let id = nodes::insert(&state.db, &node).await?;

    info!(node_id = id, name = %node.name, "Node created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Node created successfully!" })),
    ))
}

/// PUT /api/nodes/
///
/// Partial update of the node whose `id` is in the body.
pub async fn update_node(State(state): State<AppState>, payload: Payload) -> ApiResult<Json<Value>> {
    let not_found = || ApiError::NotFound("Node not found!".to_string());
    let id = payload.target_id().ok_or_else(not_found)?;
    let existing = nodes::get(&state.db, id).await?.ok_or_else(not_found)?;

    let mut merged = match serde_json::to_value(&existing) {
        Ok(Value::Object(obj)) => obj,
        _ => Map::new(),
    };
    merge_patch(&mut merged, &payload.0, &READ_ONLY);

    let node = node_form(&merged).map_err(|e| ApiError::invalid("Node not updated!", e))?;
    nodes::update(&state.db, id, &node).await?;

    info!(node_id = id, "Node updated");

    Ok(Json(json!({
        "message": format!("Node {} with id {} updated successfully!", node.name, id)
    })))
}

/// DELETE /api/nodes/:id/
///
/// Soft delete; readings stay in place.
pub async fn delete_node(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Value>> {
    if !nodes::soft_delete(&state.db, id).await? {
        return Err(ApiError::NotFound("Node not found!".to_string()));
    }

    info!(node_id = id, "Node deleted");

    Ok(Json(json!({
        "message": format!("Node with id {} deleted successfully!", id)
    })))
}
