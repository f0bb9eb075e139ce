//! Photo table types
//!
//! - PhotoRecord: one row per raw photograph
//! - CaptureAttributes: the camera settings a sequence must share

use crate::error::{Error, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// Column holding the photo identity
pub const NAME_KEY: &str = "FileName";

/// Metadata key of the capture timestamp
pub const DATE_KEY: &str = "DateTimeOriginal";

/// Column holding the time group
pub const TIMEGROUP_KEY: &str = "TimeGroup";

/// Exif.Photo tags compared when grouping photos into sequences
pub const DEFAULT_CAPTURE_KEYS: &[&str] = &[
    "Contrast",
    "ExposureBiasValue",
    "ExposureMode",
    "ExposureProgram",
    "ExposureTime",
    "FNumber",
    "Flash",
    "FocalLength",
    "GainControl",
    "ISOSpeedRatings",
    "LightSource",
    "MaxApertureValue",
    "MeteringMode",
    "RecommendedExposureIndex",
    "Saturation",
    "SceneCaptureType",
    "SensingMethod",
    "SensitivityType",
    "Sharpness",
    "WhiteBalance",
];

const DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Camera settings keyed by tag name. Values are compared, never interpreted.
pub type CaptureAttributes = BTreeMap<String, String>;

/// One photograph in the table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRecord {
    /// File stem, unique across the table
    pub name: String,
    pub path: PathBuf,
    pub capture_attributes: CaptureAttributes,
    /// Seconds since the epoch
    pub capture_time: i64,
    pub time_group: i64,
    pub prev: Option<String>,
    pub next: Option<String>,

    // Derived from the filesystem, safe to recompute at any time
    #[serde(default)]
    pub has_jpeg: bool,
    #[serde(default)]
    pub has_pano: bool,
    #[serde(default)]
    pub has_xmp: bool,
}

impl PhotoRecord {
    /// Build an unlinked record from a flat metadata map.
    ///
    /// Every key in `capture_keys` and the `DateTimeOriginal` key must be
    /// present; surrounding whitespace is stripped from the values.
    pub fn from_metadata(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        metadata: &HashMap<String, String>,
        capture_keys: &[String],
    ) -> Result<Self> {
        if capture_keys.is_empty() {
            return Err(Error::NoCaptureKeys);
        }

        let mut capture_attributes = CaptureAttributes::new();
        for key in capture_keys {
            let value = metadata
                .get(key)
                .ok_or_else(|| Error::MissingKey(key.clone()))?;
            capture_attributes.insert(key.clone(), value.trim().to_string());
        }

        let date = metadata
            .get(DATE_KEY)
            .ok_or_else(|| Error::MissingKey(DATE_KEY.to_string()))?;

        Ok(Self {
            name: name.into(),
            path: path.into(),
            capture_attributes,
            capture_time: parse_capture_time(date)?,
            ..Default::default()
        })
    }

    /// True when the record has neither neighbour
    pub fn is_standalone(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Parse an EXIF `YYYY:MM:DD HH:MM:SS` timestamp into epoch seconds.
///
/// The camera clock has no zone; it is read as UTC since only differences
/// between photos are used.
pub fn parse_capture_time(value: &str) -> Result<i64> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT)
        .map(|dt| dt.and_utc().timestamp())
        .map_err(|_| Error::InvalidTimestamp(value.to_string()))
}
