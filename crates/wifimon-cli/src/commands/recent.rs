//! `wifimon recent`: newest samples across all locations.

use std::path::Path;

use wifimon_core::{MonitorConfig, SampleRow, read_recent};

use super::fmt_opt;

pub fn run(config: &MonitorConfig, limit: usize, store: Option<&Path>, json: bool) {
    let store = super::open_store(config, store, None);
    let rows = read_recent(store.as_ref(), limit);

    if json {
        match serde_json::to_string_pretty(&rows) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if rows.is_empty() {
        println!("No samples yet.");
        println!("Collect some first: wifimon collect --location NAME:X:Y");
        return;
    }
    print_table(&rows);
}

fn print_table(rows: &[SampleRow]) {
    println!(
        "{:<19}  {:>4}  {:<12}  {:>8}  {:>8}  {:>7}  {:>5}  {:>4}",
        "Timestamp", "Run", "Location", "Down", "Up", "Ping", "Loss", "RSSI"
    );
    println!("{}", "-".repeat(80));
    for row in rows {
        println!(
            "{:<19}  {:>4}  {:<12}  {:>8}  {:>8}  {:>7.1}  {:>5.1}  {:>4}",
            row.timestamp.format(wifimon_core::model::TIMESTAMP_FORMAT),
            row.run_no,
            row.location,
            fmt_opt(row.download_speed, 2),
            fmt_opt(row.upload_speed, 2),
            row.latency_ms,
            row.packet_loss,
            row.rssi.map_or_else(|| "-".to_string(), |r| r.to_string()),
        );
    }
}
