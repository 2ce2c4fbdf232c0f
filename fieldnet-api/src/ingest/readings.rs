//! Node reading lines
//!
//! One reading per line, 15 `;`-separated fields in a fixed order:
//!
//! ```text
//! node;date_time;temperature;humidity;pressure;altitude;humidity_hd38;
//! humidity_soil;temperature_soil;conductivity_soil;ph_soil;nitrogen_soil;
//! phosphorus_soil;potassium_soil;battery_level
//! ```
//!
//! Trailing extra fields are ignored. Empty optional fields are null.

use chrono::{DateTime, Utc};
use fieldnet_common::validation::{integer_of, DecimalSpec, Fields};
use fieldnet_common::ValidationErrors;
use serde_json::{Map, Value};

/// Field order of a reading line
pub const READING_FIELDS: [&str; 15] = [
    "node",
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
];

/// Header line prefix of exported `.txt` files
pub const HEADER_PREFIX: &str = "ID_NODO";

/// Date format of exported `.txt` files
pub const TXT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Precision of every sensor column
pub const SENSOR: DecimalSpec = DecimalSpec::new(10, 4);

/// Non-blank lines of a body, without line terminators
pub fn data_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim).filter(|line| !line.is_empty())
}

pub fn is_header(line: &str) -> bool {
    line.starts_with(HEADER_PREFIX)
}

/// Map a line's fields onto their names
///
/// Returns the number of fields found when the line is too short.
pub fn split_line(line: &str) -> Result<Map<String, Value>, usize> {
    let parts: Vec<&str> = line.split(';').collect();
    if parts.len() < READING_FIELDS.len() {
        return Err(parts.len());
    }

    Ok(READING_FIELDS
        .iter()
        .zip(parts)
        .map(|(name, value)| (name.to_string(), Value::String(value.trim().to_string())))
        .collect())
}

/// A validated reading, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingInput {
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
}

impl ReadingInput {
    /// Validate a reading payload, collecting every field error
    ///
    /// Existence of the node is checked by the caller.
    pub fn from_payload(obj: &Map<String, Value>) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(obj);

        let node_id = match obj.get("node") {
            None => {
                f.error("node", fieldnet_common::validation::REQUIRED);
                None
            }
            Some(value) => match integer_of(value) {
                Some(id) => Some(id),
                None => {
                    f.error("node", "Incorrect type. Expected pk value, received str.");
                    None
                }
            },
        };
        let date_time = f.datetime("date_time");
        let temperature = f.decimal("temperature", SENSOR);
        let humidity = f.decimal("humidity", SENSOR);
        let pressure = f.decimal("pressure", SENSOR);
        let altitude = f.decimal("altitude", SENSOR);
        let humidity_hd38 = f.nullable_decimal("humidity_hd38", SENSOR);
        let humidity_soil = f.nullable_decimal("humidity_soil", SENSOR);
        let temperature_soil = f.nullable_decimal("temperature_soil", SENSOR);
        let conductivity_soil = f.nullable_decimal("conductivity_soil", SENSOR);
        let ph_soil = f.nullable_decimal("ph_soil", SENSOR);
        let nitrogen_soil = f.nullable_decimal("nitrogen_soil", SENSOR);
        let phosphorus_soil = f.nullable_decimal("phosphorus_soil", SENSOR);
        let potassium_soil = f.nullable_decimal("potassium_soil", SENSOR);
        let battery_level = f.nullable_decimal("battery_level", SENSOR);

        f.finish()?;

        match (node_id, date_time, temperature, humidity, pressure, altitude) {
            (Some(node_id), Some(date_time), Some(temperature), Some(humidity), Some(pressure), Some(altitude)) => {
                Ok(ReadingInput {
                    node_id,
                    date_time,
                    temperature,
                    humidity,
                    pressure,
                    altitude,
                    humidity_hd38,
                    humidity_soil,
                    temperature_soil,
                    conductivity_soil,
                    ph_soil,
                    nitrogen_soil,
                    phosphorus_soil,
                    potassium_soil,
                    battery_level,
                })
            }
            _ => Err(ValidationErrors::single("non_field_errors", "Invalid data.")),
        }
    }
}
