//! Read path: flatten the store into rows and summarise them.
//!
//! Every function here is a pure read. Entries that do not parse as a
//! [`Sample`] are skipped with a warning, so one bad record never hides the
//! rest of the history.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::model::Sample;
use crate::store::SampleStore;

/// One sample with its location flattened and grouping keys derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleRow {
    #[serde(serialize_with = "crate::model::timestamp_format::serialize")]
    pub timestamp: NaiveDateTime,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:00`
    pub hour: String,
    pub run_no: u32,
    pub location: String,
    pub x: f64,
    pub y: f64,
    pub download_speed: Option<f64>,
    pub upload_speed: Option<f64>,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    pub packet_loss: f64,
    pub rssi: Option<u8>,
}

impl From<Sample> for SampleRow {
    fn from(sample: Sample) -> Self {
        Self {
            date: sample.date(),
            hour: sample.hour(),
            timestamp: sample.timestamp,
            run_no: sample.run_no,
            location: sample.location.name,
            x: sample.location.x,
            y: sample.location.y,
            download_speed: sample.download_speed,
            upload_speed: sample.upload_speed,
            latency_ms: sample.latency_ms,
            jitter_ms: sample.jitter_ms,
            packet_loss: sample.packet_loss,
            rssi: sample.rssi,
        }
    }
}

/// Every valid sample in the store, in location-key order then append order.
///
/// An unreadable store yields no rows.
pub fn load_all(store: &dyn SampleStore) -> Vec<SampleRow> {
    let records = match store.scan() {
        Ok(records) => records,
        Err(e) => {
            error!("could not read samples: {e}");
            return Vec::new();
        }
    };

    let mut rows = Vec::new();
    for record in records {
        for (i, entry) in record.entries.into_iter().enumerate() {
            match serde_json::from_value::<Sample>(entry) {
                Ok(sample) => rows.push(SampleRow::from(sample)),
                Err(e) => warn!(
                    "skipping malformed entry #{i} under '{}': {e}",
                    record.location
                ),
            }
        }
    }
    rows
}

/// Up to `limit` rows, newest first across all locations.
pub fn read_recent(store: &dyn SampleStore, limit: usize) -> Vec<SampleRow> {
    let mut rows = load_all(store);
    rows.sort_by(|a, b| {
        b.timestamp
            .cmp(&a.timestamp)
            .then_with(|| b.run_no.cmp(&a.run_no))
    });
    rows.truncate(limit);
    rows
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// A numeric column of [`SampleRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    DownloadSpeed,
    UploadSpeed,
    LatencyMs,
    JitterMs,
    PacketLoss,
    Rssi,
}

impl Metric {
    pub const ALL: [Metric; 6] = [
        Metric::DownloadSpeed,
        Metric::UploadSpeed,
        Metric::LatencyMs,
        Metric::JitterMs,
        Metric::PacketLoss,
        Metric::Rssi,
    ];

    /// Field name in the persisted sample.
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::DownloadSpeed => "download_speed",
            Metric::UploadSpeed => "upload_speed",
            Metric::LatencyMs => "latency_ms",
            Metric::JitterMs => "jitter_ms",
            Metric::PacketLoss => "packet_loss",
            Metric::Rssi => "rssi",
        }
    }

    /// Axis label with unit.
    pub fn label(self) -> &'static str {
        match self {
            Metric::DownloadSpeed => "Download Speed (Mbps)",
            Metric::UploadSpeed => "Upload Speed (Mbps)",
            Metric::LatencyMs => "Latency (ms)",
            Metric::JitterMs => "Jitter (ms)",
            Metric::PacketLoss => "Packet Loss (%)",
            Metric::Rssi => "Signal Quality (%)",
        }
    }

    pub fn value(self, row: &SampleRow) -> Option<f64> {
        match self {
            Metric::DownloadSpeed => row.download_speed,
            Metric::UploadSpeed => row.upload_speed,
            Metric::LatencyMs => Some(row.latency_ms),
            Metric::JitterMs => Some(row.jitter_ms),
            Metric::PacketLoss => Some(row.packet_loss),
            Metric::Rssi => row.rssi.map(f64::from),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Metric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = Metric::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown metric '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Mean of each metric over a set of rows. `None` when no row has a value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricMeans {
    pub download_speed: Option<f64>,
    pub upload_speed: Option<f64>,
    pub latency_ms: Option<f64>,
    pub jitter_ms: Option<f64>,
    pub packet_loss: Option<f64>,
    pub rssi: Option<f64>,
}

impl MetricMeans {
    pub fn over(rows: &[&SampleRow]) -> Self {
        let avg = |metric: Metric| mean(rows.iter().filter_map(|r| metric.value(r)));
        Self {
            download_speed: avg(Metric::DownloadSpeed),
            upload_speed: avg(Metric::UploadSpeed),
            latency_ms: avg(Metric::LatencyMs),
            jitter_ms: avg(Metric::JitterMs),
            packet_loss: avg(Metric::PacketLoss),
            rssi: avg(Metric::Rssi),
        }
    }

    pub fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::DownloadSpeed => self.download_speed,
            Metric::UploadSpeed => self.upload_speed,
            Metric::LatencyMs => self.latency_ms,
            Metric::JitterMs => self.jitter_ms,
            Metric::PacketLoss => self.packet_loss,
            Metric::Rssi => self.rssi,
        }
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// `(timestamp, value)` pairs of one metric in time order, nulls dropped.
pub fn series(rows: &[SampleRow], metric: Metric) -> Vec<(NaiveDateTime, f64)> {
    let mut points: Vec<_> = rows
        .iter()
        .filter_map(|r| metric.value(r).map(|v| (r.timestamp, v)))
        .collect();
    points.sort_by_key(|&(ts, _)| ts);
    points
}

// ---------------------------------------------------------------------------
// Grouping
// ---------------------------------------------------------------------------

/// Key a summary can be grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Location,
    Date,
    Hour,
    Run,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Location,
        Dimension::Date,
        Dimension::Hour,
        Dimension::Run,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dimension::Location => "location",
            Dimension::Date => "date",
            Dimension::Hour => "hour",
            Dimension::Run => "run",
        }
    }

    fn key(self, row: &SampleRow) -> (u32, String) {
        match self {
            Dimension::Location => (0, row.location.clone()),
            Dimension::Date => (0, row.date.clone()),
            Dimension::Hour => (0, row.hour.clone()),
            Dimension::Run => (row.run_no, row.run_no.to_string()),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dimension {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "location" => Ok(Dimension::Location),
            "date" | "day" => Ok(Dimension::Date),
            "hour" => Ok(Dimension::Hour),
            "run" | "run_no" => Ok(Dimension::Run),
            other => Err(format!(
                "unknown dimension '{other}' (expected location, date, hour or run)"
            )),
        }
    }
}

/// Aggregate of every row sharing one key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    pub count: usize,
    pub means: MetricMeans,
}

/// Summaries per distinct key, sorted by key (runs numerically).
pub fn group_by(rows: &[SampleRow], dimension: Dimension) -> Vec<GroupSummary> {
    let mut groups: BTreeMap<(u32, String), Vec<&SampleRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(dimension.key(row)).or_default().push(row);
    }
    groups
        .into_iter()
        .map(|((_, key), members)| GroupSummary {
            key,
            count: members.len(),
            means: MetricMeans::over(&members),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Dashboard helpers
// ---------------------------------------------------------------------------

/// Row filter. `None` fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowFilter {
    pub location: Option<String>,
    pub date: Option<String>,
    pub hour: Option<String>,
}

impl RowFilter {
    pub fn is_empty(&self) -> bool {
        self.location.is_none() && self.date.is_none() && self.hour.is_none()
    }

    pub fn matches(&self, row: &SampleRow) -> bool {
        fn field_matches(wanted: Option<&String>, actual: &str) -> bool {
            wanted.is_none_or(|w| w == actual)
        }
        field_matches(self.location.as_ref(), &row.location)
            && field_matches(self.date.as_ref(), &row.date)
            && field_matches(self.hour.as_ref(), &row.hour)
    }

    pub fn apply(&self, rows: &[SampleRow]) -> Vec<SampleRow> {
        rows.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Distinct values available to each filter, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterOptions {
    pub locations: Vec<String>,
    pub dates: Vec<String>,
    pub hours: Vec<String>,
}

impl FilterOptions {
    pub fn from_rows(rows: &[SampleRow]) -> Self {
        let mut locations = BTreeSet::new();
        let mut dates = BTreeSet::new();
        let mut hours = BTreeSet::new();
        for row in rows {
            locations.insert(row.location.clone());
            dates.insert(row.date.clone());
            hours.insert(row.hour.clone());
        }
        Self {
            locations: locations.into_iter().collect(),
            dates: dates.into_iter().collect(),
            hours: hours.into_iter().collect(),
        }
    }
}

/// Per-location aggregate placed on the floor plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationSummary {
    pub location: String,
    pub x: f64,
    pub y: f64,
    pub count: usize,
    pub means: MetricMeans,
    /// Marker size, 10 for the least sampled location up to 50 for the most.
    pub marker_size: f64,
}

/// One summary per location, sorted by name. Coordinates come from the
/// location's first row.
pub fn location_summary(rows: &[SampleRow]) -> Vec<LocationSummary> {
    let mut groups: BTreeMap<&str, Vec<&SampleRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.location.as_str()).or_default().push(row);
    }
    let max_count = groups.values().map(Vec::len).max().unwrap_or(0);

    groups
        .into_iter()
        .map(|(location, members)| {
            let first = members[0];
            LocationSummary {
                location: location.to_string(),
                x: first.x,
                y: first.y,
                count: members.len(),
                means: MetricMeans::over(&members),
                marker_size: members.len() as f64 / max_count as f64 * 40.0 + 10.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Location;
    use crate::store::{JsonFileStore, MemoryStore};
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, day)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn sample(location: &str, run_no: u32, ts: NaiveDateTime, download: Option<f64>) -> Sample {
        Sample {
            timestamp: ts,
            run_no,
            location: Location::new(location, 67.12, -43.45),
            download_speed: download,
            upload_speed: Some(10.0),
            latency_ms: 40.0,
            jitter_ms: 0.0,
            packet_loss: 0.0,
            rssi: Some(80),
        }
    }

    fn row(location: &str, run_no: u32, ts: NaiveDateTime, download: Option<f64>) -> SampleRow {
        SampleRow::from(sample(location, run_no, ts, download))
    }

    #[test]
    fn empty_store_yields_nothing() {
        let store = MemoryStore::new();
        assert!(load_all(&store).is_empty());
        assert!(read_recent(&store, 10).is_empty());
        assert!(group_by(&[], Dimension::Location).is_empty());
        assert!(location_summary(&[]).is_empty());
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let good = serde_json::to_value(sample("ECC", 1, at(5, 8, 0), Some(50.0))).unwrap();
        let store = MemoryStore::from_json(json!({
            "ECC": [good, {"run_no": 2}, "junk"],
            "GEC": [{"timestamp": "yesterday", "run_no": 1}]
        }))
        .unwrap();
        let rows = load_all(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].location, "ECC");
        assert_eq!(rows[0].date, "2025-04-05");
        assert_eq!(rows[0].hour, "08:00");
    }

    #[test]
    fn repeated_reads_are_identical() {
        let store = MemoryStore::new();
        store.append(&sample("SDB", 1, at(5, 9, 0), Some(20.0))).unwrap();
        store.append(&sample("ECC", 1, at(5, 8, 0), Some(30.0))).unwrap();
        store.append(&sample("ECC", 2, at(6, 8, 0), None)).unwrap();
        assert_eq!(load_all(&store), load_all(&store));
    }

    #[test]
    fn file_round_trip_preserves_values() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("wifi_data.json"));
        let written = sample("ECC", 3, at(7, 14, 35), Some(87.123456789012));
        store.append(&written).unwrap();

        let rows = load_all(&store);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].download_speed, Some(87.123456789012));
        assert_eq!(rows[0].latency_ms, 40.0);
        assert_eq!(rows[0].rssi, Some(80));
        assert_eq!(rows[0].date, written.date());
        assert_eq!(rows[0].hour, written.hour());
    }

    #[test]
    fn recent_is_newest_first_and_limited() {
        let store = MemoryStore::new();
        store.append(&sample("ECC", 1, at(5, 8, 0), Some(1.0))).unwrap();
        store.append(&sample("GEC", 1, at(5, 8, 5), Some(2.0))).unwrap();
        store.append(&sample("ECC", 2, at(6, 8, 0), Some(3.0))).unwrap();

        let recent = read_recent(&store, 2);
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].download_speed, Some(3.0));
        assert_eq!(recent[1].download_speed, Some(2.0));
        assert!(read_recent(&store, 0).is_empty());
    }

    #[test]
    fn runs_group_numerically() {
        let rows = vec![
            row("ECC", 10, at(5, 8, 0), Some(10.0)),
            row("ECC", 2, at(5, 8, 0), Some(20.0)),
            row("GEC", 2, at(5, 8, 0), Some(40.0)),
        ];
        let groups = group_by(&rows, Dimension::Run);
        let keys: Vec<&str> = groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["2", "10"]);
        assert_eq!(groups[0].count, 2);
        assert_eq!(groups[0].means.download_speed, Some(30.0));
    }

    #[test]
    fn all_null_metric_has_no_mean() {
        let rows = vec![row("ECC", 1, at(5, 8, 0), None), row("ECC", 1, at(5, 9, 0), None)];
        let groups = group_by(&rows, Dimension::Location);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].means.download_speed, None);
        assert_eq!(groups[0].means.rssi, Some(80.0));
    }

    #[test]
    fn hours_and_dates_group_by_derived_keys() {
        let rows = vec![
            row("ECC", 1, at(5, 8, 0), Some(1.0)),
            row("ECC", 1, at(5, 8, 55), Some(3.0)),
            row("ECC", 2, at(6, 9, 10), Some(5.0)),
        ];
        let by_hour = group_by(&rows, Dimension::Hour);
        assert_eq!(by_hour[0].key, "08:00");
        assert_eq!(by_hour[0].means.download_speed, Some(2.0));
        let by_date = group_by(&rows, Dimension::Date);
        assert_eq!(by_date.len(), 2);
        assert_eq!(by_date[1].key, "2025-04-06");
    }

    #[test]
    fn filter_and_options() {
        let rows = vec![
            row("GEC", 1, at(5, 8, 0), Some(1.0)),
            row("ECC", 1, at(5, 9, 0), Some(2.0)),
            row("ECC", 2, at(6, 9, 0), Some(3.0)),
        ];
        let filter = RowFilter {
            location: Some("ECC".into()),
            hour: Some("09:00".into()),
            ..RowFilter::default()
        };
        assert_eq!(filter.apply(&rows).len(), 2);
        assert!(RowFilter::default().is_empty());
        assert_eq!(RowFilter::default().apply(&rows).len(), 3);

        let options = FilterOptions::from_rows(&rows);
        assert_eq!(options.locations, vec!["ECC", "GEC"]);
        assert_eq!(options.dates, vec!["2025-04-05", "2025-04-06"]);
        assert_eq!(options.hours, vec!["08:00", "09:00"]);
    }

    #[test]
    fn marker_size_scales_with_count() {
        let rows = vec![
            row("ECC", 1, at(5, 8, 0), Some(1.0)),
            row("ECC", 2, at(5, 9, 0), Some(1.0)),
            row("ECC", 3, at(5, 10, 0), Some(1.0)),
            row("ECC", 4, at(5, 11, 0), Some(1.0)),
            row("GEC", 1, at(5, 8, 0), Some(1.0)),
        ];
        let summary = location_summary(&rows);
        assert_eq!(summary[0].location, "ECC");
        assert_eq!(summary[0].marker_size, 50.0);
        assert_eq!(summary[1].count, 1);
        assert_eq!(summary[1].marker_size, 20.0);
        assert_eq!(summary[1].x, 67.12);
    }

    #[test]
    fn series_is_time_ordered_without_nulls() {
        let rows = vec![
            row("ECC", 2, at(5, 9, 0), Some(2.0)),
            row("ECC", 1, at(5, 8, 0), Some(1.0)),
            row("ECC", 3, at(5, 10, 0), None),
        ];
        let points = series(&rows, Metric::DownloadSpeed);
        assert_eq!(points, vec![(at(5, 8, 0), 1.0), (at(5, 9, 0), 2.0)]);
        assert_eq!(series(&rows, Metric::LatencyMs).len(), 3);
    }

    #[test]
    fn parse_metric_and_dimension() {
        assert_eq!("download-speed".parse::<Metric>(), Ok(Metric::DownloadSpeed));
        assert_eq!("RSSI".parse::<Metric>(), Ok(Metric::Rssi));
        assert!("bandwidth".parse::<Metric>().is_err());
        assert_eq!(Metric::LatencyMs.label(), "Latency (ms)");

        assert_eq!("Run".parse::<Dimension>(), Ok(Dimension::Run));
        assert_eq!("hour".parse::<Dimension>(), Ok(Dimension::Hour));
        assert!("week".parse::<Dimension>().is_err());
    }
}
