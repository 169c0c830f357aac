//! Sensor Configuration
//!
//! Environment-backed configuration with development defaults. Certificate
//! and key provisioning is external; the sensor only consumes file paths.

use std::env;
use std::time::Duration;

/// TLS material and endpoint for one tier channel.
#[derive(Debug, Clone)]
pub struct TierConfig {
    pub host: String,
    pub port: u16,
    /// Client certificate chain (PEM).
    pub cert_path: String,
    /// Client private key (PEM).
    pub key_path: String,
    /// CA bundle used to authenticate the controller.
    pub ca_path: String,
}

impl TierConfig {
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Sensor process configuration.
#[derive(Debug, Clone)]
pub struct SensorConfig {
    /// Sampling cadence.
    pub sample_interval: Duration,
    /// Minimum confidence for a positive prediction to produce an alert.
    pub send_confidence_threshold: f64,
    /// Grace period for in-flight sends on shutdown.
    pub shutdown_grace: Duration,
    /// Controller HTTP base URL, probed for health at startup.
    pub controller_url: String,
    pub routine: TierConfig,
    pub urgent: TierConfig,
}

impl SensorConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self {
            sample_interval: Duration::from_secs(
                env_parse("FLARE_SAMPLE_INTERVAL_SECS", 5),
            ),
            send_confidence_threshold: env_parse("FLARE_SEND_CONFIDENCE", 0.85),
            shutdown_grace: Duration::from_secs(env_parse("FLARE_SHUTDOWN_GRACE_SECS", 5)),
            controller_url: env::var("FLARE_CONTROLLER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080".to_string()),
            routine: TierConfig {
                host: env::var("FLARE_ROUTINE_HOST")
                    .unwrap_or_else(|_| "127.0.0.100".to_string()),
                port: env_parse("FLARE_ROUTINE_PORT", 6000),
                cert_path: env::var("FLARE_ROUTINE_CERT")
                    .unwrap_or_else(|_| "certs/routine_cert.pem".to_string()),
                key_path: env::var("FLARE_ROUTINE_KEY")
                    .unwrap_or_else(|_| "certs/routine_key.pem".to_string()),
                ca_path: env::var("FLARE_CA_BUNDLE")
                    .unwrap_or_else(|_| "certs/ca.pem".to_string()),
            },
            urgent: TierConfig {
                host: env::var("FLARE_URGENT_HOST")
                    .unwrap_or_else(|_| "127.0.0.100".to_string()),
                port: env_parse("FLARE_URGENT_PORT", 6001),
                cert_path: env::var("FLARE_URGENT_CERT")
                    .unwrap_or_else(|_| "certs/urgent_cert.pem".to_string()),
                key_path: env::var("FLARE_URGENT_KEY")
                    .unwrap_or_else(|_| "certs/urgent_key.pem".to_string()),
                ca_path: env::var("FLARE_CA_BUNDLE")
                    .unwrap_or_else(|_| "certs/ca.pem".to_string()),
            },
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SensorConfig::from_env();
        assert_eq!(config.sample_interval, Duration::from_secs(5));
        assert_eq!(config.routine.port, 6000);
        assert_eq!(config.urgent.port, 6001);
        assert!(config.routine.endpoint().ends_with(":6000"));
    }
}
