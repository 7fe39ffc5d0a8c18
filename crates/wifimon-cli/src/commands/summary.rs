//! `wifimon summary`: per-group means.

use std::path::Path;

use wifimon_core::{Dimension, GroupSummary, MonitorConfig, RowFilter, group_by, load_all};

use super::fmt_opt;

pub fn run(config: &MonitorConfig, by: &str, filter: RowFilter, store: Option<&Path>, json: bool) {
    let dimension: Dimension = match by.parse() {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let store = super::open_store(config, store, None);
    let rows = filter.apply(&load_all(store.as_ref()));
    let groups = group_by(&rows, dimension);

    if json {
        let out = serde_json::json!({
            "dimension": dimension,
            "filter": filter,
            "groups": groups,
        });
        match serde_json::to_string_pretty(&out) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    if groups.is_empty() {
        println!("No samples match.");
        return;
    }
    print_table(dimension, &groups);
}

fn print_table(dimension: Dimension, groups: &[GroupSummary]) {
    println!(
        "{:<12}  {:>6}  {:>8}  {:>8}  {:>7}  {:>6}  {:>5}",
        dimension.as_str(),
        "Count",
        "Down",
        "Up",
        "Ping",
        "Loss",
        "RSSI"
    );
    println!("{}", "-".repeat(64));
    for g in groups {
        println!(
            "{:<12}  {:>6}  {:>8}  {:>8}  {:>7}  {:>6}  {:>5}",
            g.key,
            g.count,
            fmt_opt(g.means.download_speed, 2),
            fmt_opt(g.means.upload_speed, 2),
            fmt_opt(g.means.latency_ms, 1),
            fmt_opt(g.means.packet_loss, 1),
            fmt_opt(g.means.rssi, 0),
        );
    }
}
