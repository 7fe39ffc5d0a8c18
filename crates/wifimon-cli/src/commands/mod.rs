pub mod collect;
pub mod next_run;
pub mod probe;
pub mod recent;
pub mod seed;
pub mod serve;
pub mod summary;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use wifimon_core::{JsonFileStore, MirroredStore, MonitorConfig, SampleStore, SensorSuite};

/// Load the config file, or defaults when none was given. Exits on error.
pub fn load_config(path: Option<&Path>) -> MonitorConfig {
    match MonitorConfig::load_or_default(path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Open the sample store, with CLI paths taking precedence over the config.
pub fn open_store(
    config: &MonitorConfig,
    store: Option<&Path>,
    mirror: Option<&Path>,
) -> Arc<dyn SampleStore> {
    let primary = JsonFileStore::new(store.unwrap_or(config.store_path.as_path()));
    match mirror.or(config.mirror_path.as_deref()) {
        Some(mirror) => Arc::new(MirroredStore::new(primary, JsonFileStore::new(mirror))),
        None => Arc::new(primary),
    }
}

pub fn make_sensors(config: &MonitorConfig, simulate: bool) -> SensorSuite {
    if simulate {
        SensorSuite::simulated()
    } else {
        SensorSuite::system(&config.sensors)
    }
}

/// Parse a duration string like "5m", "30s", "1h", "100ms". A bare number is seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();

    let (numeric, multiplier) = if let Some(rest) = s.strip_suffix("ms") {
        (rest, 1u64)
    } else if let Some(rest) = s.strip_suffix('s') {
        (rest, 1000)
    } else if let Some(rest) = s.strip_suffix('m') {
        (rest, 60_000)
    } else if let Some(rest) = s.strip_suffix('h') {
        (rest, 3_600_000)
    } else {
        (s, 1000)
    };

    let value: u64 = numeric
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 5s, 500ms, 1m)"))?;
    Ok(Duration::from_millis(value.saturating_mul(multiplier)))
}

/// Parse `YYYY-MM-DD`, `YYYY-MM-DD HH:MM` or `YYYY-MM-DD HH:MM:SS`.
pub fn parse_timestamp(s: &str) -> Result<NaiveDateTime, String> {
    let s = s.trim();
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, wifimon_core::model::TIMESTAMP_FORMAT) {
        return Ok(ts);
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        return Ok(ts);
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| format!("invalid timestamp '{s}' (expected YYYY-MM-DD [HH:MM[:SS]])"))
}

/// `12.346` → `"12.35"`, `None` → `"-"`.
pub fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.decimals$}"))
}
