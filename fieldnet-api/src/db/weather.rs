//! Weather station queries

use fieldnet_common::db::WeatherRecord;
use fieldnet_common::time::now;
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool};

use crate::ingest::weather::WeatherInput;

pub async fn count(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM weather_station")
        .fetch_one(pool)
        .await
}

/// Records newest first
pub async fn list(pool: &SqlitePool, limit: i64, offset: i64) -> sqlx::Result<Vec<WeatherRecord>> {
    sqlx::query_as("SELECT * FROM weather_station ORDER BY date DESC, id DESC LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

/// Insert a record unless one exists for the same date
///
/// Returns true when a row was inserted.
pub async fn insert_if_absent<'e, E>(executor: E, record: &WeatherInput) -> sqlx::Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO weather_station (
            date, temperature, dew_point, solar_radiation, vapor_pressure_deficit,
            relative_humidity, precipitation, wind_speed, wind_gust, wind_direction,
            solar_panel, battery, delta_t, sun_duration, evapotranspiration, units,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (date) DO NOTHING
        "#,
    )
    .bind(record.date)
    .bind(record.temperature)
    .bind(record.dew_point)
    .bind(record.solar_radiation)
    .bind(record.vapor_pressure_deficit)
    .bind(record.relative_humidity)
    .bind(record.precipitation)
    .bind(record.wind_speed)
    .bind(record.wind_gust)
    .bind(record.wind_direction)
    .bind(record.solar_panel)
    .bind(record.battery)
    .bind(record.delta_t)
    .bind(record.sun_duration)
    .bind(record.evapotranspiration)
    .bind(Json(&record.units))
    .bind(stamp)
    .bind(stamp)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}
