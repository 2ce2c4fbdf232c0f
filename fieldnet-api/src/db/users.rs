//! User account queries

use fieldnet_common::db::User;
use fieldnet_common::time::now;
use sqlx::SqlitePool;

/// Writable profile columns
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserInput {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub code_phone: String,
    pub phone_number: String,
    pub city: String,
    pub profile_image: String,
    pub is_admin: bool,
    pub is_superuser: bool,
    pub is_active: bool,
}

pub async fn get(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn get_by_email(pool: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await
}

/// All users, ordered by id
pub async fn list(pool: &SqlitePool) -> sqlx::Result<Vec<User>> {
    sqlx::query_as("SELECT * FROM users ORDER BY id")
        .fetch_all(pool)
        .await
}

/// True when a user already has this email
pub async fn email_taken(pool: &SqlitePool, email: &str) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// True when a user already has this phone number
pub async fn phone_taken(pool: &SqlitePool, code_phone: &str, phone_number: &str) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM users WHERE code_phone = ? AND phone_number = ?",
    )
    .bind(code_phone)
    .bind(phone_number)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> sqlx::Result<bool> {
    let found: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE username = ?")
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

/// Insert a user, returning its id
pub async fn insert(
    pool: &SqlitePool,
    user: &UserInput,
    username: &str,
    password_hash: &str,
) -> sqlx::Result<i64> {
    let stamp = now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (
            email, username, first_name, last_name, document, code_phone, phone_number,
            city, profile_image, is_admin, is_superuser, is_active, password_hash,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(username)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.document)
    .bind(&user.code_phone)
    .bind(&user.phone_number)
    .bind(&user.city)
    .bind(&user.profile_image)
    .bind(user.is_admin)
    .bind(user.is_superuser)
    .bind(user.is_active)
    .bind(password_hash)
    .bind(stamp)
    .bind(stamp)
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Update profile columns; the password hash changes only when given
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    user: &UserInput,
    password_hash: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, first_name = ?, last_name = ?, document = ?, code_phone = ?,
            phone_number = ?, city = ?, profile_image = ?, is_admin = ?, is_superuser = ?,
            is_active = ?, password_hash = COALESCE(?, password_hash), updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.document)
    .bind(&user.code_phone)
    .bind(&user.phone_number)
    .bind(&user.city)
    .bind(&user.profile_image)
    .bind(user.is_admin)
    .bind(user.is_superuser)
    .bind(user.is_active)
    .bind(password_hash)
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn touch_last_login(pool: &SqlitePool, id: i64) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
        .bind(now())
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldnet_common::db::init_memory_database;

    fn ana() -> UserInput {
        UserInput {
            email: "ana@example.com".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Ruiz".to_string(),
            code_phone: "+57".to_string(),
            phone_number: "3001234567".to_string(),
            is_active: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_uniqueness_checks() {
        let pool = init_memory_database().await.unwrap();
        insert(&pool, &ana(), "ana", "hash").await.unwrap();

        assert!(email_taken(&pool, "ana@example.com").await.unwrap());
        assert!(!email_taken(&pool, "bob@example.com").await.unwrap());
        assert!(phone_taken(&pool, "+57", "3001234567").await.unwrap());
        assert!(!phone_taken(&pool, "+1", "3001234567").await.unwrap());
        assert!(username_taken(&pool, "ana").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_keeps_password_unless_given() {
        let pool = init_memory_database().await.unwrap();
        let id = insert(&pool, &ana(), "ana", "first").await.unwrap();

        let mut changed = ana();
        changed.city = "Medellín".to_string();
        update(&pool, id, &changed, None).await.unwrap();
        let user = get(&pool, id).await.unwrap().unwrap();
        assert_eq!(user.city, "Medellín");
        assert_eq!(user.password_hash, "first");

        update(&pool, id, &changed, Some("second")).await.unwrap();
        let user = get_by_email(&pool, "ana@example.com").await.unwrap().unwrap();
        assert_eq!(user.password_hash, "second");
    }

    #[tokio::test]
    async fn test_touch_last_login() {
        let pool = init_memory_database().await.unwrap();
        let id = insert(&pool, &ana(), "ana", "hash").await.unwrap();
        assert!(get(&pool, id).await.unwrap().unwrap().last_login.is_none());

        touch_last_login(&pool, id).await.unwrap();
        assert!(get(&pool, id).await.unwrap().unwrap().last_login.is_some());
    }
}
