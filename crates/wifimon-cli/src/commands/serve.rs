use std::path::Path;
use std::sync::Arc;

use wifimon_core::{CollectionController, MonitorConfig};
use wifimon_server::AppState;

pub fn run(
    config: &MonitorConfig,
    host: Option<&str>,
    port: Option<u16>,
    store: Option<&Path>,
    mirror: Option<&Path>,
    simulate: bool,
) {
    let host = host.unwrap_or(config.server.host.as_str());
    let port = port.unwrap_or(config.server.port);

    let store = super::open_store(config, store, mirror);
    let sensors = Arc::new(super::make_sensors(config, simulate));
    let controller = CollectionController::new(store, sensors, config.collection());
    let state = Arc::new(AppState::new(controller, config.locations.clone()));

    let base = format!("http://{host}:{port}");
    println!("wifimon server v{}", wifimon_core::VERSION);
    println!("   {base}");
    println!(
        "   {} default location(s){}",
        config.locations.len(),
        if simulate { ", simulated probes" } else { "" }
    );
    println!();
    println!("   Endpoints:");
    println!("     GET  /                     API index (try: curl {base})");
    println!("     POST /collection/start     Start a run (body: {{\"locations\": [...]}})");
    println!("     POST /collection/stop      Stop the active run (?wait=true to block)");
    println!("     GET  /collection/status    Whether a run is active");
    println!("     GET  /samples/recent       Newest samples (?limit=N)");
    println!("     GET  /samples/summary      Means grouped by location|date|hour|run (?by=)");
    println!("     GET  /samples/locations    Per-location means and marker sizes");
    println!("     GET  /samples/series       One metric over time (?metric=)");
    println!("     GET  /samples/filters      Distinct locations, dates, hours");
    println!("     GET  /runs/next            Next run number");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(wifimon_server::run_server(state, host, port)) {
        eprintln!("Error: server failed on {host}:{port}: {e}");
        std::process::exit(1);
    }
}
