use std::time::Instant;

use wifimon_core::{MonitorConfig, SensorSuite};

/// Run every system probe once and print the readings or the failure.
pub fn run(config: &MonitorConfig) {
    let suite = SensorSuite::system(&config.sensors);
    println!("Probing (this can take a couple of minutes for the speed test)");
    for info in suite.infos() {
        println!("  {:<12} {} [{}]", info.name, info.description, info.tool);
    }
    println!();

    let t0 = Instant::now();
    let m = suite.measure();
    let elapsed = t0.elapsed();

    match &m.throughput {
        Ok(t) => println!(
            "  Throughput:  {:.2} Mbps down, {:.2} Mbps up",
            t.download_mbps, t.upload_mbps
        ),
        Err(e) => println!("  Throughput:  unavailable ({e})"),
    }
    match &m.ping {
        Ok(p) => println!(
            "  Ping:        {:.1} ms, {:.1}% loss, {:.1} ms jitter",
            p.latency_ms, p.packet_loss_pct, p.jitter_ms
        ),
        Err(e) => println!("  Ping:        unavailable ({e})"),
    }
    match &m.signal {
        Ok(q) => println!("  Signal:      {q}%"),
        Err(e) => println!("  Signal:      unavailable ({e})"),
    }
    println!("  Time:        {:.1}s", elapsed.as_secs_f64());

    if m.throughput.is_err() || m.ping.is_err() {
        println!();
        println!("  A collection run would skip this location.");
    }
}
