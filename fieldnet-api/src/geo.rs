//! IP geolocation via ipinfo.io
//!
//! Used to fill the location of visitor reports that arrive without one.
//! Lookups are best-effort; callers log failures and carry on.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const IPINFO_BASE_URL: &str = "https://ipinfo.io";
const USER_AGENT: &str = concat!("fieldnet/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}")]
    Api(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// ipinfo.io details response (fields used here)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IpDetails {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    /// `"lat,lon"`
    pub loc: Option<String>,
}

impl IpDetails {
    /// Latitude and longitude from `loc`
    pub fn coordinates(&self) -> Option<(String, String)> {
        let (lat, lon) = self.loc.as_deref()?.split_once(',')?;
        Some((lat.trim().to_string(), lon.trim().to_string()))
    }
}

/// ipinfo.io client
#[derive(Debug, Clone)]
pub struct GeoLookup {
    http_client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GeoLookup {
    pub fn new(token: impl Into<String>) -> Result<Self, GeoError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| GeoError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            token: token.into(),
            base_url: IPINFO_BASE_URL.to_string(),
        })
    }

    /// Look up the details of one address
    pub async fn lookup(&self, ip_address: &str) -> Result<IpDetails, GeoError> {
        let url = format!("{}/{}", self.base_url, ip_address);

        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::Api(status.as_u16()));
        }

        let details: IpDetails = response
            .json()
            .await
            .map_err(|e| GeoError::Parse(e.to_string()))?;

        tracing::debug!(
            ip = %ip_address,
            country = details.country.as_deref().unwrap_or("-"),
            "Resolved visitor location"
        );

        Ok(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_details_parse() {
        let body = r#"{
            "ip": "181.49.0.1",
            "city": "Bogotá",
            "region": "Bogota D.C.",
            "country": "CO",
            "loc": "4.6097,-74.0817",
            "org": "AS10299 EMPRESAS MUNICIPALES DE CALI E.I.C.E. E.S.P"
        }"#;
        let details: IpDetails = serde_json::from_str(body).unwrap();
        assert_eq!(details.city.as_deref(), Some("Bogotá"));
        assert_eq!(
            details.coordinates(),
            Some(("4.6097".to_string(), "-74.0817".to_string()))
        );
    }

    #[test]
    fn test_bogon_has_no_coordinates() {
        let details: IpDetails = serde_json::from_str(r#"{"ip": "10.0.0.1", "bogon": true}"#).unwrap();
        assert!(details.coordinates().is_none());
        assert!(details.country.is_none());
    }
}
