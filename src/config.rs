use crate::error::{PaymentError, Result};
use std::time::Duration;

pub const DEFAULT_SERVER_URL: &str = "https://zapzap666.xyz";
pub const DEFAULT_QR_SERVICE_URL: &str = "https://api.qrserver.com/v1/create-qr-code/";

/// Upper bound for the monitoring timeout and the grace window.
pub const MAX_MONITOR_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing rules for watching one payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Delay between two status checks.
    pub poll_interval: Duration,
    /// How long after creation the attempt is watched before giving up.
    pub timeout: Duration,
    /// Tolerated clock skew between the client's creation time and the
    /// service's verification time.
    pub grace_window: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            timeout: Duration::from_secs(10 * 60),
            grace_window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub server_url: String,
    pub request_timeout: Duration,
    pub qr_service_url: String,
    pub monitor: MonitorSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            request_timeout: Duration::from_secs(15),
            qr_service_url: DEFAULT_QR_SERVICE_URL.to_string(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("server URL", &self.server_url),
            ("QR service URL", &self.qr_service_url),
        ] {
            let parsed = reqwest::Url::parse(url)
                .map_err(|e| PaymentError::ConfigError(format!("invalid {name} {url:?}: {e}")))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(PaymentError::ConfigError(format!(
                    "{name} must use http or https: {url}"
                )));
            }
        }

        if self.request_timeout.is_zero() {
            return Err(PaymentError::ConfigError(
                "request timeout must be greater than zero".to_string(),
            ));
        }
        if self.monitor.poll_interval.is_zero() {
            return Err(PaymentError::ConfigError(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        if self.monitor.timeout > MAX_MONITOR_DURATION {
            return Err(PaymentError::ConfigError(format!(
                "monitoring timeout must not exceed {}s",
                MAX_MONITOR_DURATION.as_secs()
            )));
        }
        if self.monitor.grace_window > MAX_MONITOR_DURATION {
            return Err(PaymentError::ConfigError(format!(
                "grace window must not exceed {}s",
                MAX_MONITOR_DURATION.as_secs()
            )));
        }
        if self.monitor.timeout < self.monitor.poll_interval {
            return Err(PaymentError::ConfigError(
                "monitoring timeout must not be shorter than the poll interval".to_string(),
            ));
        }
        Ok(())
    }
}
