//! WiFi signal-quality probe.
//!
//! Reads the OS wireless interface report and returns a 0-100 quality
//! percentage:
//!
//! - Windows: `netsh wlan show interfaces` → `Signal : 87%`
//! - Linux: `nmcli -t -f ACTIVE,SIGNAL dev wifi` → `yes:87`
//! - macOS: `airport -I` → `agrCtlRSSI: -62` (dBm, mapped to quality)

use std::time::Duration;

use super::command::{leading_number, run_command_timed};
use super::{SensorError, SensorInfo, SignalSensor};

#[cfg(target_os = "macos")]
const AIRPORT: &str =
    "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport";

static SIGNAL_INFO: SensorInfo = SensorInfo {
    name: "wifi_signal",
    description: "Signal quality of the connected wireless interface",
    tool: if cfg!(windows) {
        "netsh"
    } else if cfg!(target_os = "macos") {
        "airport"
    } else {
        "nmcli"
    },
};

pub struct SystemSignal {
    timeout: Duration,
}

impl SystemSignal {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

/// `netsh wlan show interfaces`: the `Signal` line, e.g. `Signal : 87%`.
pub fn parse_netsh_signal(text: &str) -> Option<u8> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("Signal")?;
        let value = rest.trim_start().strip_prefix(':')?;
        to_percent(leading_number(value)?)
    })
}

/// `nmcli -t -f ACTIVE,SIGNAL dev wifi`: the row of the active connection.
pub fn parse_nmcli_signal(text: &str) -> Option<u8> {
    text.lines().find_map(|line| {
        let (active, signal) = line.trim().split_once(':')?;
        if active != "yes" {
            return None;
        }
        to_percent(leading_number(signal)?)
    })
}

/// `airport -I`: the `agrCtlRSSI` field in dBm, mapped onto 0-100.
pub fn parse_airport_signal(text: &str) -> Option<u8> {
    text.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("agrCtlRSSI")?;
        let value = rest.trim_start().strip_prefix(':')?;
        let dbm = leading_number(value)?;
        Some(dbm_to_quality(dbm))
    })
}

/// Map dBm to a quality percentage: -100 dBm or weaker is 0, -50 dBm or stronger is 100.
pub fn dbm_to_quality(dbm: f64) -> u8 {
    (2.0 * (dbm + 100.0)).clamp(0.0, 100.0).round() as u8
}

fn to_percent(v: f64) -> Option<u8> {
    (0.0..=100.0).contains(&v).then(|| v.round() as u8)
}

fn parse_failure(command: &str) -> SensorError {
    SensorError::Parse {
        command: command.to_string(),
        what: "signal quality",
    }
}

impl SignalSensor for SystemSignal {
    fn info(&self) -> &SensorInfo {
        &SIGNAL_INFO
    }

    #[cfg(windows)]
    fn measure(&self) -> Result<u8, SensorError> {
        let text = run_command_timed("netsh", &["wlan", "show", "interfaces"], self.timeout)?;
        parse_netsh_signal(&text).ok_or_else(|| parse_failure("netsh"))
    }

    #[cfg(target_os = "macos")]
    fn measure(&self) -> Result<u8, SensorError> {
        let text = run_command_timed(AIRPORT, &["-I"], self.timeout)?;
        parse_airport_signal(&text).ok_or_else(|| parse_failure("airport"))
    }

    #[cfg(target_os = "linux")]
    fn measure(&self) -> Result<u8, SensorError> {
        let text = run_command_timed(
            "nmcli",
            &["-t", "-f", "ACTIVE,SIGNAL", "dev", "wifi"],
            self.timeout,
        )?;
        parse_nmcli_signal(&text).ok_or_else(|| parse_failure("nmcli"))
    }

    #[cfg(not(any(windows, target_os = "macos", target_os = "linux")))]
    fn measure(&self) -> Result<u8, SensorError> {
        Err(SensorError::Unsupported("wifi signal quality"))
    }
}
