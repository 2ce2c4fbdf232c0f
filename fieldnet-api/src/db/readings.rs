//! Node reading queries (`nodes_storage`)

use chrono::{DateTime, Utc};
use fieldnet_common::db::Reading;
use fieldnet_common::time::now;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::ingest::readings::ReadingInput;

/// Sortable columns; `node` sorts by the node id
const ORDER_COLUMNS: [&str; 21] = [
    "id",
    "node",
    "node_id",
    "date_time",
    "temperature",
    "humidity",
    "pressure",
    "altitude",
    "humidity_hd38",
    "humidity_soil",
    "temperature_soil",
    "conductivity_soil",
    "ph_soil",
    "nitrogen_soil",
    "phosphorus_soil",
    "potassium_soil",
    "battery_level",
    "created_at",
    "updated_at",
    "deleted_at",
    "is_active",
];

/// Listing sort order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingOrder {
    column: &'static str,
    descending: bool,
}

impl Default for ReadingOrder {
    fn default() -> Self {
        Self {
            column: "date_time",
            descending: true,
        }
    }
}

impl ReadingOrder {
    /// Parse an `order_by` value (`column` or `-column`)
    ///
    /// Unknown columns fall back to newest first.
    pub fn parse(value: Option<&str>) -> Self {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return Self::default();
        };
        let (name, descending) = match value.strip_prefix('-') {
            Some(name) => (name, true),
            None => (value, false),
        };

        match ORDER_COLUMNS.iter().find(|c| **c == name) {
            Some(&"node") => Self {
                column: "node_id",
                descending,
            },
            Some(column) => Self {
                column: *column,
                descending,
            },
            None => Self::default(),
        }
    }

    fn sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        format!(" ORDER BY {} {}, id {}", self.column, direction, direction)
    }
}

/// Listing filters
#[derive(Debug, Clone, Default)]
pub struct ReadingFilter {
    pub node_id: Option<i64>,
    /// Inclusive `date_time` bounds
    pub between: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub order: ReadingOrder,
}

impl ReadingFilter {
    fn push_where(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder.push(" WHERE is_active = 1");
        if let Some(node_id) = self.node_id {
            builder.push(" AND node_id = ").push_bind(node_id);
        }
        if let Some((start, end)) = self.between {
            builder
                .push(" AND date_time BETWEEN ")
                .push_bind(start)
                .push(" AND ")
                .push_bind(end);
        }
    }
}

pub async fn count(pool: &SqlitePool, filter: &ReadingFilter) -> sqlx::Result<i64> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM nodes_storage");
    filter.push_where(&mut builder);
    builder.build_query_scalar().fetch_one(pool).await
}

pub async fn list(
    pool: &SqlitePool,
    filter: &ReadingFilter,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<Reading>> {
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM nodes_storage");
    filter.push_where(&mut builder);
    builder.push(filter.order.sql());
    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder.build_query_as().fetch_all(pool).await
}

/// True when the node already has a reading at this instant
pub async fn exists_at(pool: &SqlitePool, node_id: i64, date_time: DateTime<Utc>) -> sqlx::Result<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT id FROM nodes_storage WHERE node_id = ? AND date_time = ?")
            .bind(node_id)
            .bind(date_time)
            .fetch_optional(pool)
            .await?;
    Ok(found.is_some())
}

/// Insert a reading unless one exists for the same node and instant
///
/// Returns true when a row was inserted.
pub async fn insert_if_absent<'e, E>(executor: E, reading: &ReadingInput) -> sqlx::Result<bool>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO nodes_storage (
            node_id, date_time, temperature, humidity, pressure, altitude,
            humidity_hd38, humidity_soil, temperature_soil, conductivity_soil,
            ph_soil, nitrogen_soil, phosphorus_soil, potassium_soil, battery_level,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (node_id, date_time) DO NOTHING
        "#,
    )
    .bind(reading.node_id)
    .bind(reading.date_time)
    .bind(reading.temperature)
    .bind(reading.humidity)
    .bind(reading.pressure)
    .bind(reading.altitude)
    .bind(reading.humidity_hd38)
    .bind(reading.humidity_soil)
    .bind(reading.temperature_soil)
    .bind(reading.conductivity_soil)
    .bind(reading.ph_soil)
    .bind(reading.nitrogen_soil)
    .bind(reading.phosphorus_soil)
    .bind(reading.potassium_soil)
    .bind(reading.battery_level)
    .bind(stamp)
    .bind(stamp)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fieldnet_common::db::init_memory_database;

    async fn pool_with_node() -> SqlitePool {
        let pool = init_memory_database().await.unwrap();
        sqlx::query("INSERT INTO nodes (name, type, latitude, longitude) VALUES ('n', 'worker', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    fn reading(day: u32, temperature: f64) -> ReadingInput {
        ReadingInput {
            node_id: 1,
            date_time: Utc.with_ymd_and_hms(2024, 2, day, 6, 0, 0).unwrap(),
            temperature,
            humidity: 60.0,
            pressure: 752.0,
            altitude: 2600.0,
            humidity_hd38: None,
            humidity_soil: None,
            temperature_soil: None,
            conductivity_soil: None,
            ph_soil: Some(6.5),
            nitrogen_soil: None,
            phosphorus_soil: None,
            potassium_soil: None,
            battery_level: None,
        }
    }

    #[test]
    fn test_order_parse() {
        assert_eq!(ReadingOrder::parse(None), ReadingOrder::default());
        assert_eq!(ReadingOrder::parse(Some("bogus")), ReadingOrder::default());
        assert_eq!(
            ReadingOrder::parse(Some("temperature")),
            ReadingOrder {
                column: "temperature",
                descending: false
            }
        );
        assert_eq!(
            ReadingOrder::parse(Some("-node")),
            ReadingOrder {
                column: "node_id",
                descending: true
            }
        );
        assert_eq!(ReadingOrder::parse(Some("-id; DROP TABLE nodes")), ReadingOrder::default());
    }

    #[tokio::test]
    async fn test_insert_if_absent_skips_duplicates() {
        let pool = pool_with_node().await;
        assert!(insert_if_absent(&pool, &reading(5, 20.0)).await.unwrap());
        assert!(!insert_if_absent(&pool, &reading(5, 25.0)).await.unwrap());
        assert!(exists_at(&pool, 1, reading(5, 0.0).date_time).await.unwrap());

        let rows = list(&pool, &ReadingFilter::default(), 10, 0).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].temperature, 20.0);
        assert_eq!(rows[0].ph_soil, Some(6.5));
    }

    #[tokio::test]
    async fn test_filters_and_order() {
        let pool = pool_with_node().await;
        for (day, temperature) in [(3, 18.0), (4, 22.0), (5, 19.0)] {
            insert_if_absent(&pool, &reading(day, temperature)).await.unwrap();
        }

        let newest_first = list(&pool, &ReadingFilter::default(), 10, 0).await.unwrap();
        let days: Vec<u32> = newest_first.iter().map(|r| chrono::Datelike::day(&r.date_time)).collect();
        assert_eq!(days, vec![5, 4, 3]);

        let filter = ReadingFilter {
            node_id: Some(1),
            between: Some((
                Utc.with_ymd_and_hms(2024, 2, 4, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 5, 23, 59, 59).unwrap(),
            )),
            order: ReadingOrder::parse(Some("temperature")),
        };
        assert_eq!(count(&pool, &filter).await.unwrap(), 2);
        let rows = list(&pool, &filter, 10, 0).await.unwrap();
        let temps: Vec<f64> = rows.iter().map(|r| r.temperature).collect();
        assert_eq!(temps, vec![19.0, 22.0]);

        let other_node = ReadingFilter {
            node_id: Some(2),
            ..Default::default()
        };
        assert_eq!(count(&pool, &other_node).await.unwrap(), 0);
    }
}
