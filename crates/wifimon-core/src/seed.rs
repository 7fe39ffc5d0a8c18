//! Synthetic dataset for dashboards and demos.
//!
//! Produces one sample per location every `interval` between `start` and
//! `end` inclusive, with readings drawn from [`SimulatedSensors`]. Run numbers
//! count up independently per location, starting at 1.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use log::info;

use crate::model::{Location, Sample};
use crate::sensors::simulated::SimulatedSensors;
use crate::store::{JsonFileStore, SampleStore, StoreError};

/// Largest dataset [`generate`] will build in memory.
pub const MAX_SAMPLES: u64 = 1_000_000;

#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("interval must be positive")]
    ZeroInterval,

    #[error("interval out of range: {0}")]
    IntervalOutOfRange(String),

    #[error("end {end} is before start {start}")]
    EndBeforeStart {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },

    #[error("{planned} samples requested, at most {max} allowed (use a longer interval or a shorter range)")]
    TooManySamples { planned: u128, max: u64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The five campus spots used by the demo dashboard.
pub fn demo_locations() -> Vec<Location> {
    vec![
        Location::new("ECC", 67.12, -43.45),
        Location::new("GEC", 70.21, -40.31),
        Location::new("SDB", 65.78, -42.50),
        Location::new("FOODCOURT", 68.33, -41.25),
        Location::new("LOUNGE", 69.0, -39.9),
    ]
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeedConfig {
    pub locations: Vec<Location>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub interval: Duration,
}

impl Default for SeedConfig {
    fn default() -> Self {
        let day = |d: u32, h: u32| {
            NaiveDate::from_ymd_opt(2025, 4, d)
                .and_then(|date| date.and_hms_opt(h, 0, 0))
                .unwrap_or_default()
        };
        Self {
            locations: demo_locations(),
            start: day(5, 8),
            end: day(8, 18),
            interval: Duration::from_secs(5 * 60),
        }
    }
}

/// Number of samples `config` would produce. Rejects an empty or reversed
/// range and datasets above [`MAX_SAMPLES`] without allocating anything.
pub fn planned_samples(config: &SeedConfig) -> Result<u64, SeedError> {
    if config.interval.is_zero() {
        return Err(SeedError::ZeroInterval);
    }
    if config.end < config.start {
        return Err(SeedError::EndBeforeStart {
            start: config.start,
            end: config.end,
        });
    }
    let span = (config.end - config.start)
        .to_std()
        .map_err(|e| SeedError::IntervalOutOfRange(e.to_string()))?;
    let per_location = span.as_nanos() / config.interval.as_nanos() + 1;
    let planned = per_location.saturating_mul(config.locations.len() as u128);
    match u64::try_from(planned) {
        Ok(n) if n <= MAX_SAMPLES => Ok(n),
        _ => Err(SeedError::TooManySamples {
            planned,
            max: MAX_SAMPLES,
        }),
    }
}

/// Build the dataset in memory, location by location.
pub fn generate(config: &SeedConfig) -> Result<Vec<Sample>, SeedError> {
    let planned = planned_samples(config)?;
    let step = TimeDelta::from_std(config.interval)
        .map_err(|e| SeedError::IntervalOutOfRange(e.to_string()))?;

    let mut samples = Vec::with_capacity(usize::try_from(planned).unwrap_or(0));
    for location in &config.locations {
        let mut timestamp = config.start;
        let mut run_no = 1u32;
        while timestamp <= config.end {
            samples.push(Sample::assemble(
                run_no,
                location.clone(),
                timestamp,
                SimulatedSensors::throughput(),
                SimulatedSensors::ping(),
                Some(SimulatedSensors::signal()),
            ));
            run_no += 1;
            let Some(next) = timestamp.checked_add_signed(step) else {
                break;
            };
            timestamp = next;
        }
    }
    Ok(samples)
}

/// Generate and append the dataset to `store` in one batch. Returns the
/// number of samples written.
pub fn seed(store: &dyn SampleStore, config: &SeedConfig) -> Result<usize, SeedError> {
    let samples = generate(config)?;
    store.append_batch(&samples)?;
    info!(
        "seeded {} samples across {} location(s)",
        samples.len(),
        config.locations.len()
    );
    Ok(samples.len())
}

/// Generate the dataset, then atomically replace the file behind `store`
/// with it. Any existing content is kept when generation or the write fails.
pub fn replace(store: &JsonFileStore, config: &SeedConfig) -> Result<usize, SeedError> {
    let samples = generate(config)?;
    store.replace(&samples)?;
    info!(
        "wrote {} fresh samples across {} location(s) to {}",
        samples.len(),
        config.locations.len(),
        store.path().display()
    );
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{Dimension, group_by, load_all};
    use crate::runs::next_run_number;
    use crate::store::JsonFileStore;

    fn small() -> SeedConfig {
        let start = NaiveDate::from_ymd_opt(2025, 4, 5)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap();
        SeedConfig {
            locations: demo_locations()[..2].to_vec(),
            start,
            end: start + TimeDelta::minutes(30),
            interval: Duration::from_secs(600),
        }
    }

    #[test]
    fn default_range_matches_demo_window() {
        let samples = generate(&SeedConfig::default()).unwrap();
        // 08:00 on the 5th to 18:00 on the 8th, every 5 minutes, inclusive.
        let per_location = (3 * 24 + 10) * 12 + 1;
        assert_eq!(samples.len(), 5 * per_location);
    }

    #[test]
    fn run_numbers_count_per_location() {
        let samples = generate(&small()).unwrap();
        assert_eq!(samples.len(), 8);
        let ecc: Vec<u32> = samples
            .iter()
            .filter(|s| s.location.name == "ECC")
            .map(|s| s.run_no)
            .collect();
        assert_eq!(ecc, vec![1, 2, 3, 4]);
        assert!(samples.iter().all(|s| s.jitter_ms == 0.0 && s.packet_loss == 0.0));
    }

    #[test]
    fn bad_ranges_are_rejected() {
        let mut config = small();
        config.interval = Duration::ZERO;
        assert!(matches!(generate(&config), Err(SeedError::ZeroInterval)));

        let mut config = small();
        std::mem::swap(&mut config.start, &mut config.end);
        assert!(matches!(generate(&config), Err(SeedError::EndBeforeStart { .. })));
    }

    #[test]
    fn seeded_file_is_readable() {
        let tmp = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(tmp.path().join("demo.json"));
        assert_eq!(seed(&store, &small()).unwrap(), 8);

        let rows = load_all(&store);
        assert_eq!(rows.len(), 8);
        assert_eq!(group_by(&rows, Dimension::Location).len(), 2);
        assert_eq!(next_run_number(&store), Ok(5));
    }

    #[test]
    fn planned_count_matches_generated() {
        assert_eq!(planned_samples(&small()).unwrap(), 8);
        assert_eq!(planned_samples(&SeedConfig::default()).unwrap(), 5 * 985);
    }

    #[test]
    fn oversized_dataset_is_rejected_before_generation() {
        let mut config = SeedConfig::default();
        config.end = config.start + TimeDelta::days(3 * 365);
        config.interval = Duration::from_secs(1);
        assert!(matches!(
            generate(&config),
            Err(SeedError::TooManySamples { max: MAX_SAMPLES, .. })
        ));
    }

    #[test]
    fn replace_overwrites_existing_history() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("demo.json");
        std::fs::write(&path, r#"{"OLD": [{"run_no": 9}]}"#).unwrap();
        let store = JsonFileStore::new(&path);

        assert_eq!(replace(&store, &small()).unwrap(), 8);
        let records = store.scan().unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.location != "OLD"));
    }

    #[test]
    fn failed_replace_keeps_existing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("demo.json");
        let original = r#"{"ECC":[{"run_no":1}]}"#;
        std::fs::write(&path, original).unwrap();

        let mut config = small();
        std::mem::swap(&mut config.start, &mut config.end);
        assert!(replace(&JsonFileStore::new(&path), &config).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), original);
    }
}
