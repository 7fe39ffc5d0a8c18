//! Measurement probes.
//!
//! Each probe wraps one external tool and turns every way it can go wrong
//! (tool missing, non-zero exit, timeout, unparseable output) into a
//! [`SensorError`]. Probes never panic and never block past their timeout.
//!
//! | probe | trait | system implementation |
//! |---|---|---|
//! | throughput | [`ThroughputSensor`] | [`speedtest::SpeedtestCli`] |
//! | latency / loss | [`PingSensor`] | [`ping::SystemPing`] |
//! | signal quality | [`SignalSensor`] | [`signal::SystemSignal`] |
//!
//! [`simulated::SimulatedSensors`] stands in for all three on machines
//! without the tools.

pub mod command;
pub mod ping;
pub mod signal;
pub mod simulated;
pub mod speedtest;

use std::time::Duration;

use log::warn;

use crate::config::SensorConfig;

/// Why a probe could not produce a reading.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SensorError {
    #[error("command not found: {0}")]
    ToolMissing(String),

    #[error("{command} timed out after {secs}s")]
    Timeout { command: String, secs: u64 },

    #[error("{command} failed: {detail}")]
    CommandFailed { command: String, detail: String },

    #[error("could not parse {what} from {command} output")]
    Parse { command: String, what: &'static str },

    #[error("not supported on this platform: {0}")]
    Unsupported(&'static str),
}

/// Static description of a probe.
#[derive(Debug, Clone)]
pub struct SensorInfo {
    /// Unique identifier (e.g. `"speedtest"`).
    pub name: &'static str,
    /// One-line human-readable description.
    pub description: &'static str,
    /// External tool the probe shells out to.
    pub tool: &'static str,
}

/// Download and upload throughput in Mbps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Throughput {
    pub download_mbps: f64,
    pub upload_mbps: f64,
}

/// Ping statistics over a fixed number of probes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PingStats {
    pub latency_ms: f64,
    /// Ping does not report inter-packet variance; always 0.0.
    pub jitter_ms: f64,
    pub packet_loss_pct: f64,
}

pub trait ThroughputSensor: Send + Sync {
    fn info(&self) -> &SensorInfo;
    fn measure(&self) -> Result<Throughput, SensorError>;
}

pub trait PingSensor: Send + Sync {
    fn info(&self) -> &SensorInfo;
    fn measure(&self) -> Result<PingStats, SensorError>;
}

pub trait SignalSensor: Send + Sync {
    fn info(&self) -> &SensorInfo;
    /// Signal quality as a 0-100 percentage.
    fn measure(&self) -> Result<u8, SensorError>;
}

/// The three readings taken at one location.
#[derive(Debug, Clone)]
pub struct Measurement {
    pub throughput: Result<Throughput, SensorError>,
    pub ping: Result<PingStats, SensorError>,
    pub signal: Result<u8, SensorError>,
}

/// One probe of each kind.
pub struct SensorSuite {
    throughput: Box<dyn ThroughputSensor>,
    ping: Box<dyn PingSensor>,
    signal: Box<dyn SignalSensor>,
}

impl SensorSuite {
    pub fn new(
        throughput: Box<dyn ThroughputSensor>,
        ping: Box<dyn PingSensor>,
        signal: Box<dyn SignalSensor>,
    ) -> Self {
        Self {
            throughput,
            ping,
            signal,
        }
    }

    /// Probes backed by the host's speedtest-cli, ping and wireless tooling.
    pub fn system(config: &SensorConfig) -> Self {
        Self::new(
            Box::new(speedtest::SpeedtestCli::new(Duration::from_secs(
                config.throughput_timeout_secs,
            ))),
            Box::new(ping::SystemPing::new(
                &config.ping_target,
                config.ping_count,
                Duration::from_secs(config.ping_timeout_secs),
            )),
            Box::new(signal::SystemSignal::new(Duration::from_secs(
                config.signal_timeout_secs,
            ))),
        )
    }

    /// Random plausible readings, for dry runs without measurement tools.
    pub fn simulated() -> Self {
        Self::new(
            Box::new(simulated::SimulatedSensors),
            Box::new(simulated::SimulatedSensors),
            Box::new(simulated::SimulatedSensors),
        )
    }

    /// Run every probe once, throughput first. Failures are logged, not raised.
    pub fn measure(&self) -> Measurement {
        let throughput = self.throughput.measure();
        if let Err(e) = &throughput {
            warn!("{} unavailable: {e}", self.throughput.info().name);
        }
        let ping = self.ping.measure();
        if let Err(e) = &ping {
            warn!("{} unavailable: {e}", self.ping.info().name);
        }
        let signal = self.signal.measure();
        if let Err(e) = &signal {
            warn!("{} unavailable: {e}", self.signal.info().name);
        }
        Measurement {
            throughput,
            ping,
            signal,
        }
    }

    pub fn infos(&self) -> [&SensorInfo; 3] {
        [
            self.throughput.info(),
            self.ping.info(),
            self.signal.info(),
        ]
    }
}
