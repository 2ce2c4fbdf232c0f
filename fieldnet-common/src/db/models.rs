//! Database row models
//!
//! Serialized field names match the REST payloads: foreign keys appear
//! under the related entity's name (`node`, `user`), not the column name.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::FromRow;

/// Sensor node types
pub const NODE_TYPES: [&str; 2] = ["master", "worker"];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Node {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub node_type: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// One node reading (`nodes_storage` row)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Reading {
    pub id: i64,
    #[serde(rename = "node")]
    pub node_id: i64,
    pub date_time: DateTime<Utc>,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub altitude: f64,
    pub humidity_hd38: Option<f64>,
    pub humidity_soil: Option<f64>,
    pub temperature_soil: Option<f64>,
    pub conductivity_soil: Option<f64>,
    pub ph_soil: Option<f64>,
    pub nitrogen_soil: Option<f64>,
    pub phosphorus_soil: Option<f64>,
    pub potassium_soil: Option<f64>,
    pub battery_level: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WeatherRecord {
    pub id: i64,
    pub date: DateTime<Utc>,
    pub temperature: f64,
    pub dew_point: f64,
    pub solar_radiation: i64,
    pub vapor_pressure_deficit: f64,
    pub relative_humidity: f64,
    pub precipitation: f64,
    pub wind_speed: f64,
    pub wind_gust: f64,
    pub wind_direction: i64,
    pub solar_panel: i64,
    pub battery: i64,
    pub delta_t: i64,
    pub sun_duration: i64,
    pub evapotranspiration: Option<f64>,
    pub units: Json<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Visitor {
    pub id: i64,
    pub ip_address: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    #[serde(rename = "user")]
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Ripener machine session
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Machine {
    pub id: i64,
    pub rod_set: f64,
    pub flow_pump: f64,
    pub time_start: DateTime<Utc>,
    pub time_on: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Telemetry of one node inside a ripener machine
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MachineNode {
    pub id: i64,
    #[serde(rename = "node")]
    pub machine_id: i64,
    pub temperature_rod: Option<f64>,
    pub temperature_environment: Option<f64>,
    pub humidity_environment: Option<f64>,
    pub concentration_c2h4: Option<f64>,
    pub concentration_ozone: Option<f64>,
    pub info_extra: Option<Json<Value>>,
    pub id_node: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub document: String,
    pub code_phone: String,
    pub phone_number: String,
    pub city: String,
    pub profile_image: String,
    pub is_admin: bool,
    pub is_superuser: bool,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}
