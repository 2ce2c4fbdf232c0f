//! Sensor node queries

use fieldnet_common::db::Node;
use fieldnet_common::time::now;
use sqlx::SqlitePool;

/// Writable node columns
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInput {
    pub name: String,
    pub node_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Active nodes, ordered by id
pub async fn list_active(pool: &SqlitePool) -> sqlx::Result<Vec<Node>> {
    sqlx::query_as("SELECT * FROM nodes WHERE is_active = 1 ORDER BY id")
        .fetch_all(pool)
        .await
}

pub async fn get(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<Node>> {
    sqlx::query_as("SELECT * FROM nodes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn exists(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM nodes WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Insert a node, returning its id
pub async fn insert(pool: &SqlitePool, node: &NodeInput) -> sqlx::Result<i64> {
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO nodes (name, type, description, latitude, longitude, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&node.name)
    .bind(&node.node_type)
    .bind(&node.description)
    .bind(node.latitude)
    .bind(node.longitude)
    .bind(stamp)
    .bind(stamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn update(pool: &SqlitePool, id: i64, node: &NodeInput) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE nodes
        SET name = ?, type = ?, description = ?, latitude = ?, longitude = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&node.name)
    .bind(&node.node_type)
    .bind(&node.description)
    .bind(node.latitude)
    .bind(node.longitude)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Deactivate a node; false when no active node has this id
pub async fn soft_delete(pool: &SqlitePool, id: i64) -> sqlx::Result<bool> {
    let stamp = now();
    let result = sqlx::query(
        "UPDATE nodes SET is_active = 0, deleted_at = ?, updated_at = ? WHERE id = ? AND is_active = 1",
    )
    .bind(stamp)
    .bind(stamp)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}
