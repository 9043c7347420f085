//! Actuator reachability check.

use std::time::Duration;

use crate::error::{FanError, Result};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Best-effort HTTP probe of the fan actuator.
///
/// Any response below 500 counts as online; errors and timeouts count as
/// offline.
pub struct LivenessProbe {
    client: reqwest::Client,
}

impl LivenessProbe {
    pub fn new() -> Result<Self> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| FanError::probe(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub async fn is_online(&self, host: &str) -> bool {
        let url = actuator_url(host);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().as_u16() < 500,
            Err(e) => {
                log::debug!("Actuator probe {} failed: {}", url, e);
                false
            }
        }
    }
}

/// `10.0.0.7` → `http://10.0.0.7/`; explicit schemes are kept.
pub fn actuator_url(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/", host)
    } else {
        format!("http://{}/", host)
    }
}
