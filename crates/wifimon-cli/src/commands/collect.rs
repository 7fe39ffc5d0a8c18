//! `wifimon collect`: one collection pass in the foreground.

use std::path::Path;
use std::sync::atomic::Ordering;

use wifimon_core::{Location, MonitorConfig, Session, next_run_number, run_session};

/// Run the collect command.
pub fn run(
    config: &MonitorConfig,
    locations: Vec<Location>,
    delay: Option<&str>,
    store: Option<&Path>,
    mirror: Option<&Path>,
    simulate: bool,
) {
    let locations = if locations.is_empty() {
        config.locations.clone()
    } else {
        locations
    };
    if locations.is_empty() {
        eprintln!("Error: no locations given");
        eprintln!("Pass --location NAME:X:Y or list [[locations]] in the config file.");
        std::process::exit(1);
    }

    let delay = match delay.map(super::parse_duration) {
        None => config.collection().location_delay,
        Some(Ok(d)) => d,
        Some(Err(e)) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let store = super::open_store(config, store, mirror);
    let sensors = super::make_sensors(config, simulate);
    let run_no = match next_run_number(store.as_ref()) {
        Ok(n) => n,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let session = Session::new(run_no, locations);

    // Ctrl+C requests a stop; the loop honours it at the next location boundary.
    let stop = session.stop_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        stop.store(true, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not install Ctrl+C handler: {e}");
    }

    println!("Collecting run {}", session.run_no());
    println!(
        "  Locations: {}",
        session
            .locations()
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Delay:     {}ms", delay.as_millis());
    println!(
        "  Probes:    {}",
        sensors
            .infos()
            .iter()
            .map(|i| i.name)
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();

    let report = run_session(&session, &sensors, store.as_ref(), delay);

    println!();
    println!(
        "Run {}: {} sample(s) written{}",
        report.run_no,
        report.written.len(),
        if report.interrupted {
            " (stopped early)"
        } else {
            ""
        }
    );
    for (location, reason) in &report.skipped {
        println!("  skipped {location}: {reason}");
    }
}
