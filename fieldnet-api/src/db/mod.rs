//! Database access layer for fieldnet-api
//!
//! One module per entity. Every write stamps `created_at`/`updated_at`
//! from the application clock so stored timestamps share one format.

pub mod machines;
pub mod nodes;
pub mod readings;
pub mod users;
pub mod visitors;
pub mod weather;

/// True when a sqlx error is a UNIQUE constraint violation
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation(),
        _ => false,
    }
}
