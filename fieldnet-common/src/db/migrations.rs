//! Database schema migrations
//!
//! Versioned, idempotent schema changes tracked in the `schema_version`
//! table. Tables themselves are created with `CREATE TABLE IF NOT EXISTS`
//! in [`crate::db::init`]; migrations cover what cannot be expressed that
//! way (indexes over existing data, constraint tightening).
//!
//! Never modify an existing migration; add a new one and bump
//! [`CURRENT_SCHEMA_VERSION`].

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 when no version has been recorded yet
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("✓ Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("✓ Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: lookup indexes for the filtered listings
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v1: listing indexes");

    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_nodes_storage_date_time ON nodes_storage(date_time)",
        "CREATE INDEX IF NOT EXISTS idx_visitors_created_at ON visitors(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_nodes_info_machine ON nodes_info(machine_id)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: one reading per node per timestamp
///
/// Duplicate readings keep their earliest row; the rest are deleted
/// before the unique index is created.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    info!("Running migration v2: unique (node_id, date_time) on nodes_storage");

    let mut tx = pool.begin().await?;

    let removed = sqlx::query(
        r#"
        DELETE FROM nodes_storage
        WHERE id NOT IN (
            SELECT MIN(id) FROM nodes_storage GROUP BY node_id, date_time
        )
        "#,
    )
    .execute(&mut *tx)
    .await?
    .rows_affected();

    if removed > 0 {
        warn!("  Removed {} duplicate readings", removed);
    }

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_storage_node_date ON nodes_storage(node_id, date_time)",
    )
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}
