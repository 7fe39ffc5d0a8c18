//! Simulated probes producing plausible random readings.
//!
//! Used for dry runs of the collection loop on machines without the
//! measurement tools, and to generate demo datasets.

use rand::Rng;

use super::{
    PingSensor, PingStats, SensorError, SensorInfo, SignalSensor, Throughput, ThroughputSensor,
};

static SIMULATED_INFO: SensorInfo = SensorInfo {
    name: "simulated",
    description: "Random readings in typical campus WiFi ranges",
    tool: "none",
};

/// Download 10-100 Mbps, upload 4-50 Mbps, latency 30-120 ms, no loss,
/// signal 40-100%.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSensors;

impl SimulatedSensors {
    pub fn throughput() -> Throughput {
        let mut rng = rand::rng();
        Throughput {
            download_mbps: rng.random_range(10.0..100.0),
            upload_mbps: rng.random_range(4.0..50.0),
        }
    }

    pub fn ping() -> PingStats {
        let mut rng = rand::rng();
        PingStats {
            latency_ms: f64::from(rng.random_range(30u32..=120)),
            jitter_ms: 0.0,
            packet_loss_pct: 0.0,
        }
    }

    pub fn signal() -> u8 {
        rand::rng().random_range(40..=100)
    }
}

impl ThroughputSensor for SimulatedSensors {
    fn info(&self) -> &SensorInfo {
        &SIMULATED_INFO
    }

    fn measure(&self) -> Result<Throughput, SensorError> {
        Ok(Self::throughput())
    }
}

impl PingSensor for SimulatedSensors {
    fn info(&self) -> &SensorInfo {
        &SIMULATED_INFO
    }

    fn measure(&self) -> Result<PingStats, SensorError> {
        Ok(Self::ping())
    }
}

impl SignalSensor for SimulatedSensors {
    fn info(&self) -> &SensorInfo {
        &SIMULATED_INFO
    }

    fn measure(&self) -> Result<u8, SensorError> {
        Ok(Self::signal())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readings_stay_in_range() {
        for _ in 0..200 {
            let t = SimulatedSensors::throughput();
            assert!((10.0..100.0).contains(&t.download_mbps));
            assert!((4.0..50.0).contains(&t.upload_mbps));
            let p = SimulatedSensors::ping();
            assert!((30.0..=120.0).contains(&p.latency_ms));
            assert_eq!(p.jitter_ms, 0.0);
            assert!((40..=100).contains(&SimulatedSensors::signal()));
        }
    }
}
