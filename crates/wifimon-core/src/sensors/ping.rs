//! Latency and packet-loss probe backed by the system `ping`.
//!
//! Sends a fixed number of echo requests to a public address and reads the
//! summary lines. Three output dialects are understood:
//!
//! ```text
//! Linux:   10 packets transmitted, 10 received, 0% packet loss, time 9013ms
//!          rtt min/avg/max/mdev = 9.104/10.240/11.301/0.512 ms
//! macOS:   10 packets transmitted, 9 packets received, 10.0% packet loss
//!          round-trip min/avg/max/stddev = 9.1/10.2/11.3/0.5 ms
//! Windows: Packets: Sent = 10, Received = 10, Lost = 0 (0% loss),
//!          Minimum = 9ms, Maximum = 12ms, Average = 10ms
//! ```
//!
//! Jitter is reported as 0.0: the summary has no inter-packet variance
//! figure on every platform, so none is derived.

use std::time::Duration;

use super::command::{leading_number, run_command_timed, trailing_number};
use super::{PingSensor, PingStats, SensorError, SensorInfo};

static PING_INFO: SensorInfo = SensorInfo {
    name: "ping",
    description: "Average round-trip latency and packet loss to a public address",
    tool: "ping",
};

pub struct SystemPing {
    target: String,
    count: u32,
    timeout: Duration,
}

impl SystemPing {
    pub fn new(target: &str, count: u32, timeout: Duration) -> Self {
        Self {
            target: target.to_string(),
            count: count.max(1),
            timeout,
        }
    }
}

fn count_flag() -> &'static str {
    if cfg!(windows) { "-n" } else { "-c" }
}

/// Parse ping summary output into statistics.
pub fn parse_ping_output(text: &str) -> Option<PingStats> {
    let packet_loss_pct = parse_loss(text)?;
    let latency_ms = parse_average(text)?;
    Some(PingStats {
        latency_ms,
        jitter_ms: 0.0,
        packet_loss_pct,
    })
}

fn parse_loss(text: &str) -> Option<f64> {
    text.lines().find_map(|line| {
        let idx = line
            .find("% packet loss")
            .or_else(|| line.find("% loss"))?;
        trailing_number(&line[..idx])
    })
}

fn parse_average(text: &str) -> Option<f64> {
    text.lines().find_map(|line| {
        if let Some(idx) = line.find("min/avg/max") {
            let (_, values) = line[idx..].split_once('=')?;
            return values.split('/').nth(1).and_then(leading_number);
        }
        let idx = line.find("Average = ")?;
        leading_number(&line[idx + "Average = ".len()..])
    })
}

impl PingSensor for SystemPing {
    fn info(&self) -> &SensorInfo {
        &PING_INFO
    }

    fn measure(&self) -> Result<PingStats, SensorError> {
        let count = self.count.to_string();
        let text = run_command_timed(
            "ping",
            &[count_flag(), count.as_str(), self.target.as_str()],
            self.timeout,
        )?;
        parse_ping_output(&text).ok_or_else(|| SensorError::Parse {
            command: "ping".to_string(),
            what: "latency/packet loss",
        })
    }
}
