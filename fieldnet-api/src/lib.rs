//! fieldnet-api library - field sensor data service
//!
//! Ingests node readings and weather station exports, records visitor
//! reports and ripener machine telemetry, and manages user accounts.

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{delete, get, post, MethodRouter},
    Router,
};
use fieldnet_common::auth::Authenticator;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub mod api;
pub mod db;
pub mod error;
pub mod geo;
pub mod ingest;
pub mod pagination;

pub use error::{ApiError, ApiResult};

use geo::GeoLookup;

/// Largest accepted request body (spreadsheet uploads)
const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub auth: Arc<Authenticator>,
    /// Default page size of paginated lists
    pub page_size: i64,
    /// Visitor geolocation, when an ipinfo token is configured
    pub geo: Option<GeoLookup>,
    /// Allowed CORS origins; empty allows any
    pub cors_origins: Vec<String>,
}

impl AppState {
    pub fn new(db: SqlitePool, auth: Authenticator, page_size: i64) -> Self {
        Self {
            db,
            auth: Arc::new(auth),
            page_size,
            geo: None,
            cors_origins: Vec::new(),
        }
    }

    pub fn with_geo(mut self, geo: GeoLookup) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = origins;
        self
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Route `path` both with and without its trailing slash
fn route_slashed(
    router: Router<AppState>,
    path: &str,
    method_router: MethodRouter<AppState>,
) -> Router<AppState> {
    router
        .route(path, method_router.clone())
        .route(path.trim_end_matches('/'), method_router)
}

/// Build application router
///
/// Authentication is per handler through the extractors in [`api::auth`].
pub fn build_router(state: AppState) -> Router {
    use api::{auth, nodes, ripener, storage, users, visitors, weather};

    let cors = cors_layer(&state.cors_origins);

    let routes: Vec<(&str, MethodRouter<AppState>)> = vec![
        (
            "/api/nodes/",
            get(nodes::list_nodes)
                .post(nodes::create_node)
                .put(nodes::update_node),
        ),
        ("/api/nodes/:id/", delete(nodes::delete_node)),
        (
            "/api/nodes/storage/",
            get(storage::list_readings).post(storage::create_readings),
        ),
        ("/api/nodes/storage/txt/", post(storage::upload_readings)),
        (
            "/api/nodes/weather-station/",
            get(weather::list_weather).post(weather::upload_weather),
        ),
        (
            "/api/reports/visitor/",
            get(visitors::list_visitors).post(visitors::create_visitor),
        ),
        (
            "/api/ripener/",
            get(ripener::list_machines)
                .post(ripener::create_machine)
                .put(ripener::update_machine),
        ),
        (
            "/api/ripener/nodes/",
            get(ripener::list_machine_nodes)
                .post(ripener::create_machine_node)
                .put(ripener::update_machine_node),
        ),
        ("/api/user/", post(users::create_user).put(users::update_user)),
        ("/api/user/list/", get(users::list_users)),
        ("/api/auth/login/", post(auth::login)),
        ("/api/auth/refresh/", post(auth::refresh)),
    ];

    routes
        .into_iter()
        .fold(Router::new(), |router, (path, method_router)| {
            route_slashed(router, path, method_router)
        })
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
