//! Configuration module

use std::env;

/// TLS listener material for one tier.
#[derive(Debug, Clone)]
pub struct TierListenerConfig {
    pub bind_addr: String,
    /// Server certificate chain (PEM).
    pub cert_path: String,
    /// Server private key (PEM).
    pub key_path: String,
    /// CA bundle used to authenticate sensor clients (mutual auth).
    pub ca_path: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP ingestion port
    pub port: u16,

    /// Mitigation policy document (YAML)
    pub policy_path: String,

    /// Static flow pusher REST endpoint
    pub pusher_url: String,

    /// Datapaths under management, registered at startup
    pub datapaths: Vec<u64>,

    pub routine: TierListenerConfig,
    pub urgent: TierListenerConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let ca_path = env::var("FLARE_CA_BUNDLE").unwrap_or_else(|_| "certs/ca.pem".to_string());

        Self {
            port: parse_env("PORT", 8080),

            policy_path: env::var("FLARE_POLICY_FILE")
                .unwrap_or_else(|_| "configs/mitigation_policy.yaml".to_string()),

            pusher_url: env::var("FLARE_PUSHER_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8080/wm/staticflowpusher/json".to_string()),

            datapaths: env::var("FLARE_DATAPATHS")
                .ok()
                .map(|s| s.split(',').filter_map(|d| d.trim().parse().ok()).collect())
                .unwrap_or_else(|| vec![1]),

            routine: TierListenerConfig {
                bind_addr: env::var("FLARE_ROUTINE_BIND")
                    .unwrap_or_else(|_| "127.0.0.100:6000".to_string()),
                cert_path: env::var("FLARE_ROUTINE_CERT")
                    .unwrap_or_else(|_| "certs/routine_cert.pem".to_string()),
                key_path: env::var("FLARE_ROUTINE_KEY")
                    .unwrap_or_else(|_| "certs/routine_key.pem".to_string()),
                ca_path: ca_path.clone(),
            },

            urgent: TierListenerConfig {
                bind_addr: env::var("FLARE_URGENT_BIND")
                    .unwrap_or_else(|_| "127.0.0.100:6001".to_string()),
                cert_path: env::var("FLARE_URGENT_CERT")
                    .unwrap_or_else(|_| "certs/urgent_cert.pem".to_string()),
                key_path: env::var("FLARE_URGENT_KEY")
                    .unwrap_or_else(|_| "certs/urgent_key.pem".to_string()),
                ca_path,
            },
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
