//! Weather station spreadsheet import
//!
//! Layout of the first worksheet:
//! - Row 1: `"<Name> [<unit>]"` headers. Columns with an empty header are
//!   dropped.
//! - Row 2: column names. The first column's name replaces its row 1
//!   header (with the date format as unit); the last column's name
//!   replaces its row 1 header.
//! - Row 3 onward: data, mapped positionally onto [`WEATHER_FIELDS`].
//!
//! Every record carries a `units` object built from the headers.

use calamine::{Data, DataType, Range, Reader, Xlsx};
use chrono::{DateTime, Utc};
use fieldnet_common::validation::Fields;
use fieldnet_common::ValidationErrors;
use serde_json::{json, Map, Value};
use std::io::Cursor;
use thiserror::Error;

/// Record fields, in spreadsheet column order
pub const WEATHER_FIELDS: [&str; 15] = [
    "date",
    "temperature",
    "dew_point",
    "solar_radiation",
    "vapor_pressure_deficit",
    "relative_humidity",
    "precipitation",
    "wind_speed",
    "wind_gust",
    "wind_direction",
    "solar_panel",
    "battery",
    "delta_t",
    "sun_duration",
    "evapotranspiration",
];

const DATE_UNIT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Cannot read workbook: {0}")]
    Open(String),

    #[error("Workbook has no worksheet")]
    NoWorksheet,

    #[error("Worksheet needs a header row and a name row")]
    MissingHeaders,
}

/// Parse an `.xlsx` file into record payloads
pub fn parse_workbook(bytes: &[u8]) -> Result<Vec<Map<String, Value>>, WorkbookError> {
    let mut workbook: Xlsx<_> =
        Xlsx::new(Cursor::new(bytes)).map_err(|e| WorkbookError::Open(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or(WorkbookError::NoWorksheet)?
        .map_err(|e| WorkbookError::Open(e.to_string()))?;

    records_from_range(&range)
}

/// Convert a worksheet range into record payloads
pub fn records_from_range(range: &Range<Data>) -> Result<Vec<Map<String, Value>>, WorkbookError> {
    let mut rows = range.rows();
    let header_row = rows.next().ok_or(WorkbookError::MissingHeaders)?;
    let name_row = rows.next().ok_or(WorkbookError::MissingHeaders)?;

    let mut headers: Vec<Option<String>> = header_row.iter().map(cell_text).collect();
    let names: Vec<Option<String>> = name_row.iter().map(cell_text).collect();

    if let Some(first) = headers.first_mut() {
        *first = names
            .first()
            .cloned()
            .flatten()
            .map(|name| format!("{} [{}]", name, DATE_UNIT));
    }
    if headers.len() > 1 {
        let last = headers.len() - 1;
        headers[last] = names.get(last).cloned().flatten();
    }

    // Kept columns in order; a repeated header keeps its first position
    // and its last column's value
    let mut columns: Vec<(String, usize)> = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let Some(header) = header else { continue };
        match columns.iter_mut().find(|(h, _)| h == header) {
            Some(entry) => entry.1 = index,
            None => columns.push((header.clone(), index)),
        }
    }

    let mut units = Map::new();
    for (field, (header, _)) in WEATHER_FIELDS.iter().zip(&columns) {
        units.insert(field.to_string(), Value::String(unit_of(header)));
    }

    let records = rows
        .filter(|row| !row.iter().all(|cell| cell.is_empty()))
        .map(|row| {
            let mut record: Map<String, Value> = WEATHER_FIELDS
                .iter()
                .zip(&columns)
                .map(|(field, (_, index))| {
                    let value = row.get(*index).map(cell_value).unwrap_or(Value::Null);
                    (field.to_string(), value)
                })
                .collect();
            record.insert("units".to_string(), Value::Object(units.clone()));
            record
        })
        .collect();

    Ok(records)
}

/// Unit inside the brackets of a `"Name [unit]"` header
fn unit_of(header: &str) -> String {
    match header.split_once('[') {
        Some((_, rest)) => rest.trim_end().trim_end_matches(']').to_string(),
        None => String::new(),
    }
}

fn cell_text(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) if s.trim().is_empty() => None,
        other => Some(other.to_string().trim().to_string()),
    }
}

fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::String(s) if s.is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => json!(i),
        Data::Float(f) => json!(f),
        Data::Bool(b) => json!(b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) => Value::String(naive.format(DATE_UNIT).to_string()),
            None => json!(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::String(s.clone()),
    }
}

/// A validated weather record, ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherInput {
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
    pub units: Value,
}

impl WeatherInput {
    pub fn from_payload(obj: &Map<String, Value>) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(obj);

        let date = f.datetime("date");
        let temperature = f.float("temperature");
        let dew_point = f.float("dew_point");
        let solar_radiation = f.integer("solar_radiation");
        let vapor_pressure_deficit = f.float("vapor_pressure_deficit");
        let relative_humidity = f.float("relative_humidity");
        let precipitation = f.float("precipitation");
        let wind_speed = f.float("wind_speed");
        let wind_gust = f.float("wind_gust");
        let wind_direction = f.integer("wind_direction");
        let solar_panel = f.integer("solar_panel");
        let battery = f.integer("battery");
        let delta_t = f.integer("delta_t");
        let sun_duration = f.integer("sun_duration");
        let evapotranspiration = f.nullable_float("evapotranspiration");
        let units = f.json("units");

        f.finish()?;

        let missing = || ValidationErrors::single("non_field_errors", "Invalid data.");
        Ok(WeatherInput {
            date: date.ok_or_else(missing)?,
            temperature: temperature.ok_or_else(missing)?,
            dew_point: dew_point.ok_or_else(missing)?,
            solar_radiation: solar_radiation.ok_or_else(missing)?,
            vapor_pressure_deficit: vapor_pressure_deficit.ok_or_else(missing)?,
            relative_humidity: relative_humidity.ok_or_else(missing)?,
            precipitation: precipitation.ok_or_else(missing)?,
            wind_speed: wind_speed.ok_or_else(missing)?,
            wind_gust: wind_gust.ok_or_else(missing)?,
            wind_direction: wind_direction.ok_or_else(missing)?,
            solar_panel: solar_panel.ok_or_else(missing)?,
            battery: battery.ok_or_else(missing)?,
            delta_t: delta_t.ok_or_else(missing)?,
            sun_duration: sun_duration.ok_or_else(missing)?,
            evapotranspiration,
            units: units.ok_or_else(missing)?,
        })
    }
}

/// Validate every record, failing with the per-record errors if any is invalid
///
/// The error value lists one object per record, empty for valid ones.
pub fn validate_records(records: &[Map<String, Value>]) -> Result<Vec<WeatherInput>, Value> {
    let mut inputs = Vec::with_capacity(records.len());
    let mut details = Vec::with_capacity(records.len());
    let mut failed = false;

    for record in records {
        match WeatherInput::from_payload(record) {
            Ok(input) => {
                inputs.push(input);
                details.push(json!({}));
            }
            Err(errors) => {
                failed = true;
                details.push(json!(errors));
            }
        }
    }

    if failed {
        Err(Value::Array(details))
    } else {
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADERS: [&str; 15] = [
        "Fecha [ignored]",
        "Temperatura [°C]",
        "Punto de rocío [°C]",
        "Radiación solar [W/m2]",
        "VPD [kPa]",
        "Humedad relativa [%]",
        "Precipitación [mm]",
        "Velocidad del viento [m/s]",
        "Ráfaga [m/s]",
        "Dirección del viento [deg]",
        "Panel solar [mV]",
        "Batería [mV]",
        "Delta T [°C]",
        "Duración del sol [min]",
        "",
    ];

    fn sheet(rows: &[Vec<Data>]) -> Range<Data> {
        let mut range = Range::new((0, 0), (2 + rows.len() as u32 - 1, 14));
        for (col, header) in HEADERS.iter().enumerate() {
            if !header.is_empty() {
                range.set_value((0, col as u32), Data::String(header.to_string()));
            }
        }
        range.set_value((1, 0), Data::String("Fecha".to_string()));
        range.set_value((1, 14), Data::String("ET0 [mm]".to_string()));
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                range.set_value((2 + r as u32, c as u32), cell.clone());
            }
        }
        range
    }

    fn data_row(date: &str, evapotranspiration: Data) -> Vec<Data> {
        let mut row = vec![Data::String(date.to_string())];
        row.extend([18.4, 12.1].map(Data::Float));
        row.push(Data::Int(420));
        row.extend([0.8, 71.0, 0.0, 2.1, 4.5].map(Data::Float));
        row.extend([180, 6000, 4100, 3, 45].map(Data::Int));
        row.push(evapotranspiration);
        row
    }

    #[test]
    fn test_records_map_columns_positionally() {
        let range = sheet(&[data_row("2024-02-05 05:15:00", Data::Float(0.2))]);
        let records = records_from_range(&range).unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record["date"], "2024-02-05 05:15:00");
        assert_eq!(record["temperature"], 18.4);
        assert_eq!(record["solar_radiation"], 420);
        assert_eq!(record["sun_duration"], 45);
        assert_eq!(record["evapotranspiration"], 0.2);
    }

    #[test]
    fn test_units_from_headers() {
        let range = sheet(&[data_row("2024-02-05 05:15:00", Data::Empty)]);
        let records = records_from_range(&range).unwrap();
        let units = &records[0]["units"];

        assert_eq!(units["date"], DATE_UNIT);
        assert_eq!(units["temperature"], "°C");
        assert_eq!(units["relative_humidity"], "%");
        assert_eq!(units["evapotranspiration"], "mm");
    }

    #[test]
    fn test_empty_cells_are_null() {
        let range = sheet(&[data_row("2024-02-05 05:15:00", Data::String(String::new()))]);
        let records = records_from_range(&range).unwrap();
        assert!(records[0]["evapotranspiration"].is_null());

        let inputs = validate_records(&records).unwrap();
        assert!(inputs[0].evapotranspiration.is_none());
    }

    #[test]
    fn test_missing_name_row_rejected() {
        let mut range = Range::new((0, 0), (0, 1));
        range.set_value((0, 0), Data::String("Fecha [x]".to_string()));
        assert!(matches!(
            records_from_range(&range),
            Err(WorkbookError::MissingHeaders)
        ));
    }

    #[test]
    fn test_invalid_record_fails_whole_batch() {
        let mut bad = data_row("not a date", Data::Empty);
        bad[3] = Data::String("lots".to_string());
        let range = sheet(&[data_row("2024-02-05 05:15:00", Data::Empty), bad]);
        let records = records_from_range(&range).unwrap();

        let details = validate_records(&records).unwrap_err();
        let details = details.as_array().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0], json!({}));
        assert!(details[1].get("date").is_some());
        assert!(details[1].get("solar_radiation").is_some());
    }

    #[test]
    fn test_unit_of() {
        assert_eq!(unit_of("Temperatura [°C]"), "°C");
        assert_eq!(unit_of("ET0"), "");
    }
}
