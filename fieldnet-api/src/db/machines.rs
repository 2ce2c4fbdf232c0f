//! Ripener machine sessions (`machine_info`) and their node telemetry
//! (`nodes_info`)

use chrono::{DateTime, Utc};
use fieldnet_common::db::{Machine, MachineNode};
use fieldnet_common::time::now;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::SqlitePool;

/// Writable machine session columns
#[derive(Debug, Clone, PartialEq)]
pub struct MachineInput {
    pub rod_set: f64,
    pub flow_pump: f64,
    pub time_start: DateTime<Utc>,
    pub time_on: f64,
    pub is_active: bool,
}

/// Writable telemetry columns
#[derive(Debug, Clone, PartialEq)]
pub struct MachineNodeInput {
    pub machine_id: i64,
    pub temperature_rod: Option<f64>,
    pub temperature_environment: Option<f64>,
    pub humidity_environment: Option<f64>,
    pub concentration_c2h4: Option<f64>,
    pub concentration_ozone: Option<f64>,
    pub info_extra: Option<Value>,
    pub id_node: Option<String>,
    pub is_active: bool,
}

/// Which machine sessions to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineScope {
    All,
    Active,
    One(i64),
}

pub async fn list_machines(pool: &SqlitePool, scope: MachineScope) -> sqlx::Result<Vec<Machine>> {
    match scope {
        MachineScope::All => {
            sqlx::query_as("SELECT * FROM machine_info ORDER BY id")
                .fetch_all(pool)
                .await
        }
        MachineScope::Active => {
            sqlx::query_as("SELECT * FROM machine_info WHERE is_active = 1 ORDER BY id")
                .fetch_all(pool)
                .await
        }
        MachineScope::One(id) => {
            sqlx::query_as("SELECT * FROM machine_info WHERE id = ?")
                .bind(id)
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn get_machine(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Machine>> {
    sqlx::query_as("SELECT * FROM machine_info WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_machine(pool: &SqlitePool, machine: &MachineInput) -> sqlx::Result<i64> {
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO machine_info (rod_set, flow_pump, time_start, time_on, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(machine.rod_set)
    .bind(machine.flow_pump)
    .bind(machine.time_start)
    .bind(machine.time_on)
    .bind(machine.is_active)
    .bind(stamp)
    .bind(stamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update_machine(pool: &SqlitePool, id: i64, machine: &MachineInput) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE machine_info
        SET rod_set = ?, flow_pump = ?, time_start = ?, time_on = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(machine.rod_set)
    .bind(machine.flow_pump)
    .bind(machine.time_start)
    .bind(machine.time_on)
    .bind(machine.is_active)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Active telemetry rows, optionally for one machine
pub async fn list_nodes(pool: &SqlitePool, machine_id: Option<i64>) -> sqlx::Result<Vec<MachineNode>> {
    match machine_id {
        Some(id) => {
            sqlx::query_as("SELECT * FROM nodes_info WHERE is_active = 1 AND machine_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(pool)
                .await
        }
        None => {
            sqlx::query_as("SELECT * FROM nodes_info WHERE is_active = 1 ORDER BY id")
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn get_node(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<MachineNode>> {
    sqlx::query_as("SELECT * FROM nodes_info WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn insert_node(pool: &SqlitePool, node: &MachineNodeInput) -> sqlx::Result<i64> {
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO nodes_info (
            machine_id, temperature_rod, temperature_environment, humidity_environment,
            concentration_c2h4, concentration_ozone, info_extra, id_node, is_active,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(node.machine_id)
    .bind(node.temperature_rod)
    .bind(node.temperature_environment)
    .bind(node.humidity_environment)
    .bind(node.concentration_c2h4)
    .bind(node.concentration_ozone)
    .bind(node.info_extra.as_ref().map(Json))
    .bind(&node.id_node)
    .bind(node.is_active)
    .bind(stamp)
    .bind(stamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update_node(pool: &SqlitePool, id: i64, node: &MachineNodeInput) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE nodes_info
        SET machine_id = ?, temperature_rod = ?, temperature_environment = ?,
            humidity_environment = ?, concentration_c2h4 = ?, concentration_ozone = ?,
            info_extra = ?, id_node = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(node.machine_id)
    .bind(node.temperature_rod)
    .bind(node.temperature_environment)
    .bind(node.humidity_environment)
    .bind(node.concentration_c2h4)
    .bind(node.concentration_ozone)
    .bind(node.info_extra.as_ref().map(Json))
    .bind(&node.id_node)
    .bind(node.is_active)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}
