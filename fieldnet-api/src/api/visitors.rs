//! Visitor reports

use axum::{extract::State, http::StatusCode, Json};
use fieldnet_common::db::Visitor;
use fieldnet_common::validation::Fields;
use fieldnet_common::ValidationErrors;
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use super::auth::{AdminUser, OptionalUser};
use super::payload::Payload;
use crate::db::visitors::{self, VisitorInput};
use crate::geo::GeoLookup;
use crate::pagination::{Page, PageRequest};
use crate::{error::ApiError, ApiResult, AppState};

fn visitor_form(obj: &Map<String, Value>) -> Result<VisitorInput, ValidationErrors> {
    let mut f = Fields::new(obj);
    let ip_address = f.ip_address("ip_address");
    let mut optional = |name: &str| f.nullable_string(name, 100).filter(|v| !v.is_empty());
    let latitude = optional("latitude");
    let longitude = optional("longitude");
    let city = optional("city");
    let region = optional("region");
    let country = optional("country");
    f.finish()?;

    Ok(VisitorInput {
        ip_address: ip_address.unwrap_or_default(),
        latitude,
        longitude,
        city,
        region,
        country,
        user_id: None,
    })
}

/// Fill missing location fields from the IP address
async fn enrich(geo: &GeoLookup, visitor: &mut VisitorInput) {
    match geo.lookup(&visitor.ip_address).await {
        Ok(details) => {
            if let Some((lat, lon)) = details.coordinates() {
                visitor.latitude = Some(lat);
                visitor.longitude = Some(lon);
            }
            visitor.city = details.city;
            visitor.region = details.region;
            visitor.country = details.country;
        }
        Err(e) => warn!(ip = %visitor.ip_address, "Visitor geolocation failed: {}", e),
    }
}

/// POST /api/reports/visitor/
///
/// Anonymous or authenticated; an authenticated caller is recorded.
pub async fn create_visitor(
    State(state): State<AppState>,
    OptionalUser(user): OptionalUser,
    Payload(body): Payload,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut visitor =
        visitor_form(&body).map_err(|e| ApiError::invalid("Visitor not created", e))?;
    visitor.user_id = user.map(|u| u.id);

    if let Some(geo) = &state.geo {
        if visitor.lacks_geo() {
            enrich(geo, &mut visitor).await;
        }
    }

    let id = visitors::insert(&state.db, &visitor).await?;
    info!(visitor_id = id, ip = %visitor.ip_address, "Visitor recorded");

    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "Visitor created successfully" })),
    ))
}

/// GET /api/reports/visitor/
pub async fn list_visitors(
    State(state): State<AppState>,
    AdminUser(_): AdminUser,
    page: PageRequest,
) -> ApiResult<Json<Page<Visitor>>> {
    let total = visitors::count(&state.db).await?;
    let window = page.window(total)?;
    let results = visitors::list(&state.db, window.limit, window.offset).await?;
    Ok(Json(page.page(window, total, results)))
}
