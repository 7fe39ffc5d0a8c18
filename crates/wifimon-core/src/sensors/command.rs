//! Running external measurement tools with a hard timeout.

use std::io::{ErrorKind, Read};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use super::SensorError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Run `program args...` and return its stdout.
///
/// The child is killed once `timeout` elapses. Stdout is drained on a helper
/// thread so a chatty tool cannot stall on a full pipe.
pub fn run_command_timed(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, SensorError> {
    debug!("running {program} {}", args.join(" "));
    let t0 = Instant::now();

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => SensorError::ToolMissing(program.to_string()),
            _ => SensorError::CommandFailed {
                command: program.to_string(),
                detail: e.to_string(),
            },
        })?;

    let stdout = child.stdout.take();
    let reader = thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout {
            let _ = out.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    });

    let deadline = t0 + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let text = reader.join().unwrap_or_default();
                debug!(
                    "{program} exited with {status} after {}ms",
                    t0.elapsed().as_millis()
                );
                if !status.success() {
                    return Err(SensorError::CommandFailed {
                        command: program.to_string(),
                        detail: format!("exit status {}", status.code().unwrap_or(-1)),
                    });
                }
                return Ok(text);
            }
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(SensorError::Timeout {
                        command: program.to_string(),
                        secs: timeout.as_secs(),
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(SensorError::CommandFailed {
                    command: program.to_string(),
                    detail: e.to_string(),
                });
            }
        }
    }
}

/// Parse the first number in `text`, allowing a leading sign and a decimal point.
pub(crate) fn leading_number(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let end = text
        .char_indices()
        .find(|&(i, c)| !(c.is_ascii_digit() || c == '.' || (i == 0 && (c == '-' || c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    text[..end].parse().ok()
}

/// Parse the number at the very end of `text`, e.g. `12.5` in `"received, 12.5"`.
pub(crate) fn trailing_number(text: &str) -> Option<f64> {
    let start = text
        .char_indices()
        .rev()
        .take_while(|&(_, c)| c.is_ascii_digit() || c == '.')
        .last()
        .map(|(i, _)| i)?;
    text[start..].parse().ok()
}
