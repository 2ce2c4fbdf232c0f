//! User accounts
//!
//! Usernames are never chosen by the client: they are derived from the
//! email local part and made unique with a random numeric suffix.

use axum::{extract::State, http::StatusCode, Json};
use fieldnet_common::db::User;
use fieldnet_common::validation::{merge_patch, Fields};
use fieldnet_common::ValidationErrors;
use rand::Rng;
use serde_json::{json, Map, Value};
use tracing::info;
use unicode_normalization::UnicodeNormalization;

use super::auth::AuthUser;
use super::payload::Payload;
use crate::db::users::{self, UserInput};
use crate::{error::ApiError, ApiResult, AppState};

/// Keys a partial update never changes
const READ_ONLY: [&str; 6] = [
    "id",
    "username",
    "last_login",
    "created_at",
    "updated_at",
    "deleted_at",
];

/// Privilege flags only an admin may change
const PRIVILEGES: [&str; 2] = ["is_admin", "is_superuser"];

/// Lower-case the domain part of an address
pub fn normalize_email(email: &str) -> String {
    match email.trim().rsplit_once('@') {
        Some((local, domain)) => format!("{}@{}", local, domain.to_lowercase()),
        None => email.trim().to_string(),
    }
}

/// URL-safe form of a name: ASCII alphanumerics, `_` and single hyphens
///
/// Accented letters lose their marks (`é` becomes `e`).
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for c in value.nfkd().filter(char::is_ascii) {
        let c = c.to_ascii_lowercase();
        if c.is_ascii_alphanumeric() || c == '_' {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c);
        } else if c == '-' || c.is_whitespace() {
            pending_hyphen = true;
        }
    }

    slug.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Derive an unused username from an email address
async fn unique_username(state: &AppState, email: &str) -> ApiResult<String> {
    let local = email.split('@').next().unwrap_or_default();
    let mut base = slugify(local);
    if base.is_empty() {
        base = "user".to_string();
    }

    let mut candidate = base.clone();
    while users::username_taken(&state.db, &candidate).await? {
        let suffix: u16 = rand::thread_rng().gen_range(1000..=9999);
        candidate = format!("{}-{}", base, suffix);
    }
    Ok(candidate)
}

/// Validate a user payload
///
/// Returns the profile and the new plain-text password, if one was given.
fn user_form(
    obj: &Map<String, Value>,
    require_password: bool,
) -> Result<(UserInput, Option<String>), ValidationErrors> {
    let mut f = Fields::new(obj);
    let email = f.email("email", 255);
    let first_name = f.string("first_name", 100);
    let last_name = f.string("last_name", 100);
    let document = f.blank_string("document", 50);
    let code_phone = f.blank_string("code_phone", 10);
    let phone_number = f.blank_string("phone_number", 50);
    let city = f.blank_string("city", 100);
    let profile_image = f.blank_string("profile_image", 250);
    let is_admin = f.boolean("is_admin", false);
    let is_superuser = f.boolean("is_superuser", false);
    let is_active = f.boolean("is_active", true);
    let password = if require_password {
        f.string("password", 128)
    } else {
        f.nullable_string("password", 128).filter(|p| !p.is_empty())
    };
    f.finish()?;

    match (email, first_name, last_name) {
        (Some(email), Some(first_name), Some(last_name)) => Ok((
            UserInput {
                email: normalize_email(&email),
                first_name,
                last_name,
                document,
                code_phone,
                phone_number,
                city,
                profile_image,
                is_admin,
                is_superuser,
                is_active,
            },
            password,
        )),
        _ => Err(ValidationErrors::single("non_field_errors", "Invalid data.")),
    }
}

/// Reject an email or phone number that is already registered
///
/// `body` limits the check to the keys the client sent; `None` checks both.
async fn check_unique(
    state: &AppState,
    user: &UserInput,
    body: Option<&Map<String, Value>>,
    action: &str,
) -> ApiResult<()> {
    let sent = |key: &str| body.map_or(true, |b| b.contains_key(key));

    if sent("email") && users::email_taken(&state.db, &user.email).await? {
        return Err(ApiError::BadRequest(format!(
            "Error {} user, email already exists",
            action
        )));
    }
    if (sent("phone_number") || sent("code_phone"))
        && !user.phone_number.is_empty()
        && users::phone_taken(&state.db, &user.code_phone, &user.phone_number).await?
    {
        return Err(ApiError::BadRequest(format!(
            "Error {} user, phone number already exists",
            action
        )));
    }
    Ok(())
}

/// POST /api/user/
///
/// Public sign-up. Privilege flags in the body are ignored.
pub async fn create_user(
    State(state): State<AppState>,
    Payload(body): Payload,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let (mut user, password) = user_form(&body, true).map_err(ApiError::Fields)?;
    user.is_admin = false;
    user.is_superuser = false;
    user.is_active = true;

    check_unique(&state, &user, None, "creating").await?;

    let password = password.unwrap_or_default();
    let hash = state.auth.hash_password(&password)?;
    let username = unique_username(&state, &user.email).await?;
    let id = users::insert(&state.db, &user, &username, &hash).await?;

    info!(user_id = id, username = %username, "User created");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "User created successfully" })),
    ))
}

/// PUT /api/user/
///
/// Partial update of the caller, or of the user named by `id`. Updating
/// another account or privilege flags requires an admin.
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    payload: Payload,
) -> ApiResult<Json<Value>> {
    let caller_is_admin = caller.is_admin || caller.is_superuser;

    let target: User = match payload.target_id() {
        Some(id) if id == caller.id => caller.clone(),
        Some(id) => {
            let user = users::get(&state.db, id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("User with id {} not found", id)))?;
            if !caller_is_admin {
                return Err(ApiError::Forbidden(
                    "You do not have permission to perform this action.".to_string(),
                ));
            }
            user
        }
        None if payload.0.contains_key("id") => {
            return Err(ApiError::NotFound(format!(
                "User with id {} not found",
                payload.0["id"]
            )))
        }
        None => caller.clone(),
    };

    let mut merged = match serde_json::to_value(&target) {
        Ok(Value::Object(obj)) => obj,
        _ => Map::new(),
    };
    let mut read_only: Vec<&str> = READ_ONLY.to_vec();
    if !caller_is_admin {
        read_only.extend(PRIVILEGES);
    }
    merge_patch(&mut merged, &payload.0, &read_only);

    let (user, password) = user_form(&merged, false).map_err(ApiError::Fields)?;
    check_unique(&state, &user, Some(&payload.0), "updating").await?;

    let hash = match password {
        Some(password) => Some(state.auth.hash_password(&password)?),
        None => None,
    };
    users::update(&state.db, target.id, &user, hash.as_deref()).await?;

    info!(user_id = target.id, by = caller.id, "User updated");

    Ok(Json(json!({ "message": "User updated successfully" })))
}

/// GET /api/user/list/
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_): AuthUser,
) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(users::list(&state.db).await?))
}
