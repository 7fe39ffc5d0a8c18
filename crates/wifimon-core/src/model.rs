//! Sample and location types, and their persisted JSON shape.
//!
//! A [`Sample`] serialises to:
//!
//! ```json
//! {
//!   "timestamp": "2025-04-05 08:00:00",
//!   "run_no": 3,
//!   "location": { "name": "ECC", "x": 67.12, "y": -43.45 },
//!   "download_speed": 53.1,
//!   "upload_speed": 21.7,
//!   "latency_ms": 41.0,
//!   "jitter_ms": 0.0,
//!   "packet_loss": 0.0,
//!   "rssi": 87
//! }
//! ```
//!
//! Older data files spell the location keys `position[name]`, `position[x]`
//! and `position[y]`; those are accepted on read.

use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::sensors::{PingStats, Throughput};

/// Wire format of [`Sample::timestamp`].
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format of the derived `date` grouping key.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Format of the derived `hour` grouping key.
pub const HOUR_FORMAT: &str = "%H:00";

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A named measurement point. Coordinates are only used for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(alias = "position[name]")]
    pub name: String,
    #[serde(alias = "position[x]")]
    pub x: f64,
    #[serde(alias = "position[y]")]
    pub y: f64,
}

impl Location {
    pub fn new(name: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            name: name.into(),
            x,
            y,
        }
    }

    /// A location is usable when it has a non-blank name and finite coordinates.
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.name, self.x, self.y)
    }
}

/// Parses `NAME:X:Y`. The name may itself contain colons.
impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.trim().rsplitn(3, ':');
        let (Some(y), Some(x), Some(name)) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("invalid location '{s}' (expected NAME:X:Y)"));
        };
        let x: f64 = x
            .trim()
            .parse()
            .map_err(|_| format!("invalid x coordinate in '{s}'"))?;
        let y: f64 = y
            .trim()
            .parse()
            .map_err(|_| format!("invalid y coordinate in '{s}'"))?;
        let location = Location::new(name.trim(), x, y);
        if !location.is_valid() {
            return Err(format!("invalid location '{s}'"));
        }
        Ok(location)
    }
}

// ---------------------------------------------------------------------------
// Sample
// ---------------------------------------------------------------------------

/// One measurement of one location within one run. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub run_no: u32,
    pub location: Location,
    /// Mbps.
    pub download_speed: Option<f64>,
    /// Mbps.
    pub upload_speed: Option<f64>,
    pub latency_ms: f64,
    /// Always 0.0 for ping-derived samples.
    pub jitter_ms: f64,
    /// Percent.
    pub packet_loss: f64,
    /// Signal quality, 0-100.
    pub rssi: Option<u8>,
}

impl Sample {
    /// Assemble a sample from the readings that must have succeeded.
    pub fn assemble(
        run_no: u32,
        location: Location,
        timestamp: NaiveDateTime,
        throughput: Throughput,
        ping: PingStats,
        rssi: Option<u8>,
    ) -> Self {
        Self {
            timestamp,
            run_no,
            location,
            download_speed: Some(throughput.download_mbps),
            upload_speed: Some(throughput.upload_mbps),
            latency_ms: ping.latency_ms,
            jitter_ms: ping.jitter_ms,
            packet_loss: ping.packet_loss_pct,
            rssi,
        }
    }

    /// `YYYY-MM-DD` of the collection time.
    pub fn date(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }

    /// `HH:00` of the collection time.
    pub fn hour(&self) -> String {
        self.timestamp.format(HOUR_FORMAT).to_string()
    }
}

/// Current local time truncated to whole seconds.
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

pub(crate) mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn ts(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 5)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn sample() -> Sample {
        Sample {
            timestamp: ts(8, 5, 9),
            run_no: 3,
            location: Location::new("ECC", 67.12, -43.45),
            download_speed: Some(53.123456789),
            upload_speed: Some(21.7),
            latency_ms: 41.0,
            jitter_ms: 0.0,
            packet_loss: 10.0,
            rssi: Some(87),
        }
    }

    #[test]
    fn sample_serialises_in_canonical_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["timestamp"], "2025-04-05 08:05:09");
        assert_eq!(value["run_no"], 3);
        assert_eq!(value["location"]["name"], "ECC");
        assert_eq!(value["location"]["x"], 67.12);
        assert_eq!(value["rssi"], 87);
    }

    #[test]
    fn null_fields_round_trip_as_none() {
        let mut s = sample();
        s.rssi = None;
        s.upload_speed = None;
        let json = serde_json::to_string(&s).unwrap();
        assert!(json.contains("\"rssi\":null"));
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn legacy_position_keys_are_accepted() {
        let json = r#"{
            "timestamp": "2025-04-05 08:00:00",
            "run_no": 1,
            "location": {"position[name]": "GEC", "position[x]": 70.21, "position[y]": -40.31},
            "download_speed": 12.5,
            "upload_speed": 4.25,
            "latency_ms": 30,
            "jitter_ms": 0,
            "packet_loss": 0,
            "rssi": 100
        }"#;
        let s: Sample = serde_json::from_str(json).unwrap();
        assert_eq!(s.location, Location::new("GEC", 70.21, -40.31));
        assert_eq!(s.latency_ms, 30.0);
        assert_eq!(s.rssi, Some(100));
    }

    #[test]
    fn bad_timestamp_is_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["timestamp"] = "05/04/2025 08:00".into();
        assert!(serde_json::from_value::<Sample>(value).is_err());
    }

    #[test]
    fn derived_date_and_hour() {
        let s = sample();
        assert_eq!(s.date(), "2025-04-05");
        assert_eq!(s.hour(), "08:00");
    }

    #[test]
    fn parse_location_triplet() {
        let loc: Location = "ECC:67.12:-43.45".parse().unwrap();
        assert_eq!(loc, Location::new("ECC", 67.12, -43.45));

        let loc: Location = "Lab 2:B:1:2".parse().unwrap();
        assert_eq!(loc.name, "Lab 2:B");
    }

    #[test]
    fn parse_location_rejects_garbage() {
        assert!("ECC".parse::<Location>().is_err());
        assert!("ECC:abc:1".parse::<Location>().is_err());
        assert!(":1:2".parse::<Location>().is_err());
        assert!("ECC:inf:2".parse::<Location>().is_err());
    }

    #[test]
    fn local_now_has_whole_seconds() {
        use chrono::Timelike;
        assert_eq!(local_now().nanosecond(), 0);
    }
}
