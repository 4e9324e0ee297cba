// src/descriptor.rs

use crate::error::AppError;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Sidecar metadata for one media file.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Descriptor {
    pub capture_timestamp: Option<i64>,
    pub title: Option<String>,
    pub geo: Option<GeoPoint>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A descriptor together with the sidecar file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedDescriptor {
    pub path: PathBuf,
    pub descriptor: Descriptor,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDescriptor {
    title: Option<Value>,
    description: Option<Value>,
    photo_taken_time: Option<RawTakenTime>,
    geo_data: Option<RawGeoData>,
}

#[derive(Deserialize)]
struct RawTakenTime {
    timestamp: Option<RawTimestamp>,
}

// Takeout writes the timestamp as a decimal string.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct RawGeoData {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

// Scalar titles and descriptions are kept as text.
fn text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl From<RawDescriptor> for Descriptor {
    fn from(raw: RawDescriptor) -> Self {
        let capture_timestamp = raw
            .photo_taken_time
            .and_then(|t| t.timestamp)
            .and_then(|ts| match ts {
                RawTimestamp::Number(n) => Some(n),
                RawTimestamp::Text(s) => s.trim().parse().ok(),
            });

        // 0.0/0.0 means the export had no location.
        let geo = raw.geo_data.and_then(|g| match (g.latitude, g.longitude) {
            (Some(latitude), Some(longitude)) if latitude != 0.0 || longitude != 0.0 => {
                Some(GeoPoint { latitude, longitude })
            }
            _ => None,
        });

        Descriptor {
            capture_timestamp,
            title: text(raw.title),
            geo,
            description: text(raw.description).filter(|d| !d.trim().is_empty()),
        }
    }
}

impl Descriptor {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let raw: RawDescriptor = serde_json::from_str(json)?;
        Ok(raw.into())
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|source| AppError::DescriptorParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_takeout_descriptor() {
        let json = r#"{
            "title": "IMG_0001.JPG",
            "description": "Beach day",
            "photoTakenTime": { "timestamp": "1561288447", "formatted": "23 Jun 2019" },
            "geoData": { "latitude": 44.43, "longitude": 26.1, "altitude": 0.0 }
        }"#;

        let descriptor = Descriptor::from_json(json).unwrap();

        assert_eq!(descriptor.capture_timestamp, Some(1561288447));
        assert_eq!(descriptor.title.as_deref(), Some("IMG_0001.JPG"));
        assert_eq!(descriptor.description.as_deref(), Some("Beach day"));
        assert_eq!(
            descriptor.geo,
            Some(GeoPoint { latitude: 44.43, longitude: 26.1 })
        );
    }

    #[test]
    fn test_numeric_timestamp() {
        let descriptor = Descriptor::from_json(r#"{"photoTakenTime": {"timestamp": 100}}"#).unwrap();
        assert_eq!(descriptor.capture_timestamp, Some(100));
    }

    #[test]
    fn test_non_string_title_keeps_timestamp() {
        let descriptor =
            Descriptor::from_json(r#"{"title": 123, "photoTakenTime": {"timestamp": "5"}}"#).unwrap();
        assert_eq!(descriptor.title.as_deref(), Some("123"));
        assert_eq!(descriptor.capture_timestamp, Some(5));

        let descriptor =
            Descriptor::from_json(r#"{"title": {"x": 1}, "description": null}"#).unwrap();
        assert_eq!(descriptor.title, None);
        assert_eq!(descriptor.description, None);
    }

    #[test]
    fn test_zero_geo_and_empty_description_are_absent() {
        let json = r#"{
            "description": "",
            "geoData": { "latitude": 0.0, "longitude": 0.0 }
        }"#;

        let descriptor = Descriptor::from_json(json).unwrap();

        assert_eq!(descriptor.geo, None);
        assert_eq!(descriptor.description, None);
        assert_eq!(descriptor.capture_timestamp, None);
    }

    #[test]
    fn test_from_file_reports_parse_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.jpg.json");
        fs::write(&path, "{ not json").unwrap();

        match Descriptor::from_file(&path) {
            Err(AppError::DescriptorParse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {:?}", other),
        }
    }
}
