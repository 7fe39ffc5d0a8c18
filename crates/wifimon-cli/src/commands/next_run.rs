use std::path::Path;

use wifimon_core::{MonitorConfig, next_run_number};

pub fn run(config: &MonitorConfig, store: Option<&Path>) {
    let store = super::open_store(config, store, None);
    match next_run_number(store.as_ref()) {
        Ok(n) => println!("{n}"),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}
