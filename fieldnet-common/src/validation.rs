//! Request payload validation
//!
//! [`Fields`] reads typed values out of a JSON object and collects every
//! field error before failing, producing the `{"field": ["reason"]}` map
//! returned to API clients.
//!
//! Getters for required fields return `None` only when they recorded an
//! error, so once [`Fields::finish`] succeeds those values are present.

use crate::time::parse_datetime;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::net::IpAddr;

pub const REQUIRED: &str = "This field is required.";
pub const NOT_NULL: &str = "This field may not be null.";
pub const NOT_BLANK: &str = "This field may not be blank.";
pub const INVALID_NUMBER: &str = "A valid number is required.";
pub const INVALID_INTEGER: &str = "A valid integer is required.";
pub const INVALID_DATETIME: &str =
    "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].";

/// Field name to error messages
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Errors with a single message on one field
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(" ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Precision limits of a decimal column
#[derive(Debug, Clone, Copy)]
pub struct DecimalSpec {
    pub max_digits: u32,
    pub decimal_places: u32,
}

impl DecimalSpec {
    pub const fn new(max_digits: u32, decimal_places: u32) -> Self {
        Self {
            max_digits,
            decimal_places,
        }
    }
}

/// Typed reader over one JSON object
pub struct Fields<'a> {
    obj: &'a Map<String, Value>,
    errors: ValidationErrors,
}

impl<'a> Fields<'a> {
    pub fn new(obj: &'a Map<String, Value>) -> Self {
        Self {
            obj,
            errors: ValidationErrors::new(),
        }
    }

    /// Record an error produced outside the typed getters
    pub fn error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    /// Fail with every collected error, if any
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }

    /// Present and non-null value
    fn present(&mut self, name: &str) -> Option<&'a Value> {
        match self.obj.get(name) {
            None => {
                self.errors.add(name, REQUIRED);
                None
            }
            Some(Value::Null) => {
                self.errors.add(name, NOT_NULL);
                None
            }
            Some(value) => Some(value),
        }
    }

    /// Present value, or `None` when missing, null or an empty string
    fn optional(&self, name: &str) -> Option<&'a Value> {
        match self.obj.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if s.trim().is_empty() => None,
            Some(value) => Some(value),
        }
    }

    /// Required, non-blank string
    pub fn string(&mut self, name: &str, max_len: usize) -> Option<String> {
        let value = self.present(name)?;
        let text = self.as_text(name, value, max_len)?;
        if text.trim().is_empty() {
            self.errors.add(name, NOT_BLANK);
            return None;
        }
        Some(text)
    }

    /// Optional string that defaults to empty
    pub fn blank_string(&mut self, name: &str, max_len: usize) -> String {
        match self.obj.get(name) {
            None | Some(Value::Null) => String::new(),
            Some(value) => self.as_text(name, value, max_len).unwrap_or_default(),
        }
    }

    /// Optional string that may be null
    pub fn nullable_string(&mut self, name: &str, max_len: usize) -> Option<String> {
        match self.obj.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => self.as_text(name, value, max_len),
        }
    }

    fn as_text(&mut self, name: &str, value: &Value, max_len: usize) -> Option<String> {
        let text = match value {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => {
                self.errors.add(name, "Not a valid string.");
                return None;
            }
        };
        if text.chars().count() > max_len {
            self.errors.add(
                name,
                format!("Ensure this field has no more than {} characters.", max_len),
            );
            return None;
        }
        Some(text)
    }

    /// Required value from a fixed set of choices
    pub fn choice(&mut self, name: &str, choices: &[&str]) -> Option<String> {
        let value = self.present(name)?;
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        if choices.contains(&text.as_str()) {
            Some(text)
        } else {
            self.errors.add(name, format!("\"{}\" is not a valid choice.", text));
            None
        }
    }

    /// Required email address
    pub fn email(&mut self, name: &str, max_len: usize) -> Option<String> {
        let text = self.string(name, max_len)?;
        if is_valid_email(&text) {
            Some(text)
        } else {
            self.errors.add(name, "Enter a valid email address.");
            None
        }
    }

    /// Required IPv4 or IPv6 address
    pub fn ip_address(&mut self, name: &str) -> Option<String> {
        let text = self.string(name, 39)?;
        match text.parse::<IpAddr>() {
            Ok(addr) => Some(addr.to_string()),
            Err(_) => {
                self.errors.add(name, "Enter a valid IPv4 or IPv6 address.");
                None
            }
        }
    }

    /// Required decimal within the column precision
    pub fn decimal(&mut self, name: &str, spec: DecimalSpec) -> Option<f64> {
        let value = self.present(name)?;
        self.check_decimal(name, value, spec)
    }

    /// Optional decimal; missing, null and empty are `None`
    pub fn nullable_decimal(&mut self, name: &str, spec: DecimalSpec) -> Option<f64> {
        let value = self.optional(name)?;
        self.check_decimal(name, value, spec)
    }

    fn check_decimal(&mut self, name: &str, value: &Value, spec: DecimalSpec) -> Option<f64> {
        match validate_decimal(value, spec) {
            Ok(v) => Some(v),
            Err(message) => {
                self.errors.add(name, message);
                None
            }
        }
    }

    /// Required float
    pub fn float(&mut self, name: &str) -> Option<f64> {
        let value = self.present(name)?;
        self.check_float(name, value)
    }

    /// Optional float; missing, null and empty are `None`
    pub fn nullable_float(&mut self, name: &str) -> Option<f64> {
        let value = self.optional(name)?;
        self.check_float(name, value)
    }

    fn check_float(&mut self, name: &str, value: &Value) -> Option<f64> {
        match number_of(value) {
            Some(v) => Some(v),
            None => {
                self.errors.add(name, INVALID_NUMBER);
                None
            }
        }
    }

    /// Required integer; floats with no fractional part are accepted
    pub fn integer(&mut self, name: &str) -> Option<i64> {
        let value = self.present(name)?;
        self.check_integer(name, value)
    }

    /// Optional integer; missing, null and empty are `None`
    pub fn nullable_integer(&mut self, name: &str) -> Option<i64> {
        let value = self.optional(name)?;
        self.check_integer(name, value)
    }

    fn check_integer(&mut self, name: &str, value: &Value) -> Option<i64> {
        match integer_of(value) {
            Some(v) => Some(v),
            None => {
                self.errors.add(name, INVALID_INTEGER);
                None
            }
        }
    }

    /// Required datetime
    pub fn datetime(&mut self, name: &str) -> Option<DateTime<Utc>> {
        let value = self.present(name)?;
        match value.as_str().and_then(parse_datetime) {
            Some(dt) => Some(dt),
            None => {
                self.errors.add(name, INVALID_DATETIME);
                None
            }
        }
    }

    /// Required JSON value of any shape
    pub fn json(&mut self, name: &str) -> Option<Value> {
        self.present(name).cloned()
    }

    /// Optional JSON value
    pub fn nullable_json(&mut self, name: &str) -> Option<Value> {
        match self.obj.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.clone()),
        }
    }

    /// Optional boolean with a default
    pub fn boolean(&mut self, name: &str, default: bool) -> bool {
        match self.obj.get(name) {
            None | Some(Value::Null) => default,
            Some(Value::Bool(b)) => *b,
            Some(Value::Number(n)) if n.as_i64() == Some(1) => true,
            Some(Value::Number(n)) if n.as_i64() == Some(0) => false,
            Some(Value::String(s)) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => {
                    self.errors.add(name, "Must be a valid boolean.");
                    default
                }
            },
            Some(_) => {
                self.errors.add(name, "Must be a valid boolean.");
                default
            }
        }
    }
}

/// Numeric value of a JSON number or numeric string
pub fn number_of(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|v| v.is_finite())
}

/// Integer value of a JSON number or numeric string
pub fn integer_of(value: &Value) -> Option<i64> {
    if let Value::Number(n) = value {
        if let Some(i) = n.as_i64() {
            return Some(i);
        }
    }
    if let Value::String(s) = value {
        if let Ok(i) = s.trim().parse::<i64>() {
            return Some(i);
        }
    }
    let f = number_of(value)?;
    if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Validate a decimal against column precision, returning its value
///
/// Digits are counted on the value as written, so `1.50` has two decimal
/// places and leading zeros are not significant.
pub fn validate_decimal(value: &Value, spec: DecimalSpec) -> Result<f64, String> {
    let raw = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(INVALID_NUMBER.to_string()),
    };
    let number = raw
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| INVALID_NUMBER.to_string())?;

    // Exponent notation is expanded to plain positional form
    let text = if raw.contains(['e', 'E']) {
        format!("{}", number)
    } else {
        raw
    };
    let unsigned = text.trim_start_matches(['-', '+']);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, f),
        None => (unsigned, ""),
    };
    if !int_part.chars().chain(frac_part.chars()).all(|c| c.is_ascii_digit()) {
        return Err(INVALID_NUMBER.to_string());
    }

    let significant = format!("{}{}", int_part, frac_part);
    let significant = significant.trim_start_matches('0');
    let digit_count = significant.len().max(1) as u32;
    let exponent = frac_part.len() as u32;

    let (total_digits, whole_digits, decimal_places) = if exponent == 0 {
        (digit_count, digit_count, 0)
    } else if digit_count > exponent {
        (digit_count, digit_count - exponent, exponent)
    } else {
        (exponent, 0, exponent)
    };

    if total_digits > spec.max_digits {
        return Err(format!(
            "Ensure that there are no more than {} digits in total.",
            spec.max_digits
        ));
    }
    if decimal_places > spec.decimal_places {
        return Err(format!(
            "Ensure that there are no more than {} decimal places.",
            spec.decimal_places
        ));
    }
    let max_whole = spec.max_digits - spec.decimal_places;
    if whole_digits > max_whole {
        return Err(format!(
            "Ensure that there are no more than {} digits before the decimal point.",
            max_whole
        ));
    }

    Ok(number)
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Overlay `patch` onto `base`, skipping read-only keys
pub fn merge_patch(base: &mut Map<String, Value>, patch: &Map<String, Value>, read_only: &[&str]) {
    for (key, value) in patch {
        if !read_only.contains(&key.as_str()) {
            base.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COORD: DecimalSpec = DecimalSpec::new(9, 6);

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_decimal_accepts_within_precision() {
        assert_eq!(validate_decimal(&json!(4.123456), COORD).unwrap(), 4.123456);
        assert_eq!(validate_decimal(&json!("-74.1"), COORD).unwrap(), -74.1);
        assert_eq!(validate_decimal(&json!(0), COORD).unwrap(), 0.0);
        assert!(validate_decimal(&json!("0.000001"), COORD).is_ok());
    }

    #[test]
    fn test_decimal_rejects_too_many_places() {
        let err = validate_decimal(&json!(4.1234567), COORD).unwrap_err();
        assert_eq!(err, "Ensure that there are no more than 6 decimal places.");
    }

    #[test]
    fn test_decimal_rejects_whole_digits() {
        let err = validate_decimal(&json!(1234.5), COORD).unwrap_err();
        assert_eq!(
            err,
            "Ensure that there are no more than 3 digits before the decimal point."
        );
    }

    #[test]
    fn test_decimal_rejects_total_digits() {
        let err = validate_decimal(&json!("1234567.891"), DecimalSpec::new(5, 2)).unwrap_err();
        assert_eq!(err, "Ensure that there are no more than 5 digits in total.");
    }

    #[test]
    fn test_decimal_trailing_zeros_count() {
        assert!(validate_decimal(&json!("1.500"), DecimalSpec::new(5, 2)).is_err());
        assert!(validate_decimal(&json!("1.50"), DecimalSpec::new(5, 2)).is_ok());
    }

    #[test]
    fn test_decimal_rejects_non_numeric() {
        assert_eq!(validate_decimal(&json!("abc"), COORD).unwrap_err(), INVALID_NUMBER);
        assert_eq!(validate_decimal(&json!(true), COORD).unwrap_err(), INVALID_NUMBER);
        assert_eq!(validate_decimal(&json!("NaN"), COORD).unwrap_err(), INVALID_NUMBER);
    }

    #[test]
    fn test_fields_collects_all_errors() {
        let payload = obj(json!({
            "type": "router",
            "latitude": "north",
        }));
        let mut f = Fields::new(&payload);
        assert!(f.string("name", 255).is_none());
        assert!(f.choice("type", &["master", "worker"]).is_none());
        assert!(f.decimal("latitude", COORD).is_none());
        assert!(f.decimal("longitude", COORD).is_none());

        let errors = f.finish().unwrap_err();
        assert_eq!(errors.get("name").unwrap(), [REQUIRED.to_string()]);
        assert_eq!(
            errors.get("type").unwrap(),
            ["\"router\" is not a valid choice.".to_string()]
        );
        assert_eq!(errors.get("latitude").unwrap(), [INVALID_NUMBER.to_string()]);
        assert_eq!(errors.get("longitude").unwrap(), [REQUIRED.to_string()]);
    }

    #[test]
    fn test_null_and_blank_messages() {
        let payload = obj(json!({"name": null, "city": "  "}));
        let mut f = Fields::new(&payload);
        f.string("name", 10);
        f.string("city", 10);
        let errors = f.finish().unwrap_err();
        assert_eq!(errors.get("name").unwrap(), [NOT_NULL.to_string()]);
        assert_eq!(errors.get("city").unwrap(), [NOT_BLANK.to_string()]);
    }

    #[test]
    fn test_numbers_accepted_as_strings() {
        let payload = obj(json!({"document": 1234567890}));
        let mut f = Fields::new(&payload);
        assert_eq!(f.blank_string("document", 50), "1234567890");
        assert!(f.finish().is_ok());
    }

    #[test]
    fn test_max_length_enforced() {
        let payload = obj(json!({"id_node": "x".repeat(51)}));
        let mut f = Fields::new(&payload);
        assert!(f.nullable_string("id_node", 50).is_none());
        assert!(f.finish().is_err());
    }

    #[test]
    fn test_optional_numeric_empty_is_none() {
        let payload = obj(json!({"ph_soil": "", "battery": null}));
        let mut f = Fields::new(&payload);
        assert!(f.nullable_decimal("ph_soil", DecimalSpec::new(10, 4)).is_none());
        assert!(f.nullable_integer("battery").is_none());
        assert!(f.nullable_float("missing").is_none());
        assert!(f.finish().is_ok());
    }

    #[test]
    fn test_integer_accepts_whole_floats() {
        assert_eq!(integer_of(&json!(250.0)), Some(250));
        assert_eq!(integer_of(&json!("42")), Some(42));
        assert_eq!(integer_of(&json!(2.5)), None);
    }

    #[test]
    fn test_ip_and_email() {
        let payload = obj(json!({
            "ip": "::1",
            "bad_ip": "300.1.1.1",
            "email": "ana@example.com",
            "bad_email": "ana.example.com",
        }));
        let mut f = Fields::new(&payload);
        assert_eq!(f.ip_address("ip").as_deref(), Some("::1"));
        assert!(f.ip_address("bad_ip").is_none());
        assert!(f.email("email", 255).is_some());
        assert!(f.email("bad_email", 255).is_none());
        let errors = f.finish().unwrap_err();
        assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["bad_email", "bad_ip"]);
    }

    #[test]
    fn test_datetime_field() {
        let payload = obj(json!({"at": "2024-02-05T05:18:00Z", "bad": "05/02/2024"}));
        let mut f = Fields::new(&payload);
        assert!(f.datetime("at").is_some());
        assert!(f.datetime("bad").is_none());
        assert_eq!(f.finish().unwrap_err().get("bad").unwrap(), [INVALID_DATETIME.to_string()]);
    }

    #[test]
    fn test_merge_patch_skips_read_only() {
        let mut base = obj(json!({"id": 1, "name": "a", "type": "master"}));
        let patch = obj(json!({"id": 99, "name": "b"}));
        merge_patch(&mut base, &patch, &["id"]);
        assert_eq!(base["id"], 1);
        assert_eq!(base["name"], "b");
        assert_eq!(base["type"], "master");
    }
}
