//! Throughput probe backed by `speedtest-cli`.
//!
//! `speedtest-cli --json --secure` picks the best nearby server, runs a
//! download and an upload test, and prints a JSON report whose `download`
//! and `upload` fields are in bits per second. A full run usually takes
//! 20-40 seconds.

use std::time::Duration;

use serde::Deserialize;

use super::command::run_command_timed;
use super::{SensorError, SensorInfo, Throughput, ThroughputSensor};

const SPEEDTEST_PROGRAM: &str = "speedtest-cli";

static SPEEDTEST_INFO: SensorInfo = SensorInfo {
    name: "speedtest",
    description: "Download/upload throughput against the best speedtest.net server",
    tool: SPEEDTEST_PROGRAM,
};

pub struct SpeedtestCli {
    program: String,
    timeout: Duration,
}

impl SpeedtestCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: SPEEDTEST_PROGRAM.to_string(),
            timeout,
        }
    }

    /// Use a different executable, e.g. an absolute path.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }
}

#[derive(Deserialize)]
struct SpeedtestReport {
    /// bits/s
    download: f64,
    /// bits/s
    upload: f64,
}

/// Extract Mbps figures from a `speedtest-cli --json` report.
pub fn parse_speedtest_json(text: &str) -> Option<Throughput> {
    let report: SpeedtestReport = serde_json::from_str(text.trim()).ok()?;
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if !valid(report.download) || !valid(report.upload) {
        return None;
    }
    Some(Throughput {
        download_mbps: report.download / 1e6,
        upload_mbps: report.upload / 1e6,
    })
}

impl ThroughputSensor for SpeedtestCli {
    fn info(&self) -> &SensorInfo {
        &SPEEDTEST_INFO
    }

    fn measure(&self) -> Result<Throughput, SensorError> {
        let text = run_command_timed(&self.program, &["--json", "--secure"], self.timeout)?;
        parse_speedtest_json(&text).ok_or_else(|| SensorError::Parse {
            command: self.program.clone(),
            what: "throughput",
        })
    }
}
