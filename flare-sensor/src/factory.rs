//! Alert Factory
//!
//! Assembles a well-formed Alert from a feature vector and classifier output.
//! The only failure mode is a classifier contract violation (confidence out
//! of range); the tick is skipped and sampling resumes at the next interval.

use std::net::Ipv4Addr;

use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;

use flare_schema::{Alert, RecommendedAction, TcpFlags};

use crate::classifier::Prediction;
use crate::sampler::FeatureVector;

/// The frozen classifier returned output outside its documented contract.
#[derive(Debug, Error)]
#[error("classifier contract violation: confidence {confidence} outside [0.0, 1.0]")]
pub struct ClassifierContractViolation {
    pub confidence: f64,
}

/// Builds Alerts for one monitored protocol. Endpoint attribution is
/// best-effort; when the data plane cannot name a pair, both endpoints stay
/// 0.0.0.0.
pub struct AlertFactory {
    protocol: String,
    source_ip: Ipv4Addr,
    destination_ip: Ipv4Addr,
}

impl AlertFactory {
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            source_ip: Ipv4Addr::UNSPECIFIED,
            destination_ip: Ipv4Addr::UNSPECIFIED,
        }
    }

    /// Use attributed endpoints instead of 0.0.0.0.
    pub fn with_endpoints(mut self, source: Ipv4Addr, destination: Ipv4Addr) -> Self {
        self.source_ip = source;
        self.destination_ip = destination;
        self
    }

    /// Assemble an Alert. Each monitored flag is set when its counter is
    /// non-zero; SYN is not monitored and stays false. Label 1 recommends
    /// RATE_LIMIT, anything else NO_ACTION.
    pub fn build(
        &self,
        features: &FeatureVector,
        prediction: Prediction,
    ) -> Result<Alert, ClassifierContractViolation> {
        if !prediction.confidence.is_finite()
            || prediction.confidence < 0.0
            || prediction.confidence > 1.0
        {
            return Err(ClassifierContractViolation {
                confidence: prediction.confidence,
            });
        }

        let recommended_action = if prediction.label == 1 {
            RecommendedAction::RateLimit
        } else {
            RecommendedAction::NoAction
        };

        Ok(Alert {
            alert_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: self.source_ip,
            destination_ip: self.destination_ip,
            protocol: self.protocol.clone(),
            flags: TcpFlags {
                rst: features.rst() > 0,
                fin: features.fin() > 0,
                syn: false,
                frag: features.frag() > 0,
            },
            classifier_confidence: prediction.confidence,
            recommended_action,
        })
    }
}
