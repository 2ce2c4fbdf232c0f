//! Visitor report queries

use fieldnet_common::db::Visitor;
use fieldnet_common::time::now;
use sqlx::SqlitePool;

/// Writable visitor columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VisitorInput {
    pub ip_address: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub user_id: Option<i64>,
}

impl VisitorInput {
    /// True when no geo field was supplied
    pub fn lacks_geo(&self) -> bool {
        self.latitude.is_none()
            && self.longitude.is_none()
            && self.city.is_none()
            && self.region.is_none()
            && self.country.is_none()
    }
}

pub async fn insert(pool: &SqlitePool, visitor: &VisitorInput) -> sqlx::Result<i64> {
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO visitors (
            ip_address, latitude, longitude, city, region, country, user_id, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&visitor.ip_address)
    .bind(&visitor.latitude)
    .bind(&visitor.longitude)
    .bind(&visitor.city)
    .bind(&visitor.region)
    .bind(&visitor.country)
    .bind(visitor.user_id)
    .bind(stamp)
    .bind(stamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn count(pool: &SqlitePool) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM visitors")
        .fetch_one(pool)
        .await
}

/// Visitors, most recent first
pub async fn list(pool: &SqlitePool, limit: i64, offset: i64) -> sqlx::Result<Vec<Visitor>> {
    sqlx::query_as("SELECT * FROM visitors ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?")
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnet_common::db::init_memory_database;

    #[tokio::test]
    async fn test_insert_and_list_recent_first() {
        let pool = init_memory_database().await.unwrap();
        for ip in ["10.0.0.1", "10.0.0.2"] {
            insert(
                &pool,
                &VisitorInput {
                    ip_address: ip.to_string(),
                    city: Some("Bogotá".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        }

        assert_eq!(count(&pool).await.unwrap(), 2);
        let rows = list(&pool, 10, 0).await.unwrap();
        assert_eq!(rows[0].ip_address, "10.0.0.2");
        assert_eq!(rows[1].city.as_deref(), Some("Bogotá"));
        assert!(rows[0].user_id.is_none());
    }

    #[test]
    fn test_lacks_geo() {
        let mut visitor = VisitorInput {
            ip_address: "::1".to_string(),
            ..Default::default()
        };
        assert!(visitor.lacks_geo());
        visitor.country = Some("CO".to_string());
        assert!(!visitor.lacks_geo());
    }
}
