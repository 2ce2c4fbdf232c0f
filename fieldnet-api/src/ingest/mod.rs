//! Parsers for bulk sensor data
//!
//! - [`readings`]: `;`-separated node readings, posted raw or uploaded as `.txt`
//! - [`weather`]: weather station `.xlsx` exports

pub mod readings;
pub mod weather;

/// True when an uploaded file name carries the given extension
pub fn has_extension(file_name: &str, extension: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
