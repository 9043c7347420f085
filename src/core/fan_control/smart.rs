//! Live drive temperature queries.
//!
//! The collector asks a [`TemperatureProbe`] for the current temperature of
//! every spun-up drive. The production implementation shells out to
//! `smartctl`, which reads the SMART attribute table without waking drives
//! that are in standby (`-n standby`).

use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// SMART attributes that carry the drive temperature in their raw value column.
const TEMPERATURE_ATTRIBUTES: [&str; 2] = ["Temperature_Celsius", "Airflow_Temperature_Cel"];

/// Raw value column of `smartctl -A` attribute rows.
const RAW_VALUE_COLUMN: usize = 9;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long to wait for pipe readers once the process has exited.
const PIPE_GRACE: Duration = Duration::from_millis(250);

/// Result of a single live temperature query.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Temperature(f64),
    /// The query ran but produced no usable temperature.
    NoReading,
    /// The environment does not allow raw device access.
    PermissionDenied(String),
    /// Spawn failure, timeout or unexpected exit.
    Failed(String),
}

/// Trait for reading a drive's temperature directly from the device.
///
/// Implementations must return within roughly `timeout`; a slow device is
/// reported as [`ProbeOutcome::Failed`].
pub trait TemperatureProbe: Send + Sync {
    fn query(&self, device: &str, timeout: Duration) -> ProbeOutcome;
}

/// Queries drives through the `smartctl` binary.
pub struct SmartctlProbe {
    program: String,
}

impl SmartctlProbe {
    pub fn new<S: Into<String>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SmartctlProbe {
    fn default() -> Self {
        Self::new("smartctl")
    }
}

impl TemperatureProbe for SmartctlProbe {
    fn query(&self, device: &str, timeout: Duration) -> ProbeOutcome {
        let path = device_path(device);

        let mut child = match Command::new(&self.program)
            .args(["-n", "standby", "-A", &path])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
                return ProbeOutcome::PermissionDenied(e.to_string())
            }
            Err(e) => return ProbeOutcome::Failed(format!("{}: {}", self.program, e)),
        };

        // Drain both pipes while waiting so a chatty command cannot fill them and stall.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return ProbeOutcome::Failed(format!(
                        "{} timed out after {:?}",
                        path, timeout
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return ProbeOutcome::Failed(e.to_string()),
            }
        };

        let grace = deadline.saturating_duration_since(Instant::now()).max(PIPE_GRACE);
        let stdout = stdout.recv_timeout(grace).unwrap_or_default();
        let stderr = stderr.recv_timeout(grace).unwrap_or_default();

        if !status.success() {
            let code = status.code();
            if is_permission_failure(code, &stderr) {
                return ProbeOutcome::PermissionDenied(format!(
                    "rc={}, stderr='{}'",
                    code.map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    stderr.trim()
                ));
            }
            return ProbeOutcome::NoReading;
        }

        match parse_attribute_temperature(&stdout) {
            Some(t) => ProbeOutcome::Temperature(t),
            None => ProbeOutcome::NoReading,
        }
    }
}

/// Read a child pipe to the end on a helper thread.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

/// `sdb` → `/dev/sdb`; absolute paths are used as given.
pub fn device_path(device: &str) -> String {
    if device.starts_with('/') {
        device.to_string()
    } else {
        format!("/dev/{}", device)
    }
}

/// Whether a failed smartctl run looks like missing device privileges.
///
/// Unprivileged containers often fail silently with exit code 2.
pub fn is_permission_failure(code: Option<i32>, stderr: &str) -> bool {
    if stderr.contains("Permission denied") || stderr.contains("Operation not permitted") {
        return true;
    }
    code == Some(2) && stderr.trim().is_empty()
}

/// Extract the temperature from `smartctl -A` output.
pub fn parse_attribute_temperature(output: &str) -> Option<f64> {
    output
        .lines()
        .filter(|line| TEMPERATURE_ATTRIBUTES.iter().any(|attr| line.contains(attr)))
        .find_map(|line| {
            line.split_whitespace()
                .nth(RAW_VALUE_COLUMN)
                .and_then(|raw| raw.parse::<f64>().ok())
        })
}
