//! `wifimon seed`: write a synthetic history.

use std::path::Path;

use wifimon_core::JsonFileStore;
use wifimon_core::seed::{self, SeedConfig};

pub fn run(output: &Path, start: Option<&str>, end: Option<&str>, interval: &str, force: bool) {
    let mut config = SeedConfig::default();
    if let Err(e) = apply_overrides(&mut config, start, end, interval) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }

    match write_dataset(output, &config, force) {
        Ok(n) => {
            println!(
                "Wrote {n} samples for {} locations to {}",
                config.locations.len(),
                output.display()
            );
            println!("  From:     {}", config.start);
            println!("  To:       {}", config.end);
            println!("  Interval: {}s", config.interval.as_secs());
        }
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Write the dataset to `output`. An existing file is only replaced with
/// `force`, and only once the new dataset has been generated.
fn write_dataset(output: &Path, config: &SeedConfig, force: bool) -> Result<usize, String> {
    if output.exists() && !force {
        return Err(format!(
            "{} already exists (use --force to replace it)",
            output.display()
        ));
    }
    seed::replace(&JsonFileStore::new(output), config).map_err(|e| e.to_string())
}

fn apply_overrides(
    config: &mut SeedConfig,
    start: Option<&str>,
    end: Option<&str>,
    interval: &str,
) -> Result<(), String> {
    if let Some(s) = start {
        config.start = super::parse_timestamp(s)?;
    }
    if let Some(e) = end {
        config.end = super::parse_timestamp(e)?;
    }
    config.interval = super::parse_duration(interval)?;
    Ok(())
}
