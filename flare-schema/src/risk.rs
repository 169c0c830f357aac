//! Risk Tiering
//!
//! Maps a validated Alert to the transport tier that carries it. The rule is
//! fixed and order-independent; there is no state and no failure mode.

use serde::{Deserialize, Serialize};

use crate::alert::Alert;

/// Confidence above which an alert is urgent on its own. The FRAG and RST
/// signals bypass this gate entirely.
pub const HIGH_RISK_CONFIDENCE: f64 = 0.9;

/// Transport tier for a classified alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Urgent,
    Routine,
}

impl RiskTier {
    /// Classify an alert: urgent iff confidence > 0.9, or the FRAG or RST
    /// flag is set.
    pub fn of(alert: &Alert) -> RiskTier {
        let high_risk = alert.classifier_confidence > HIGH_RISK_CONFIDENCE
            || alert.flags.frag
            || alert.flags.rst;

        if high_risk {
            RiskTier::Urgent
        } else {
            RiskTier::Routine
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::Urgent => "urgent",
            RiskTier::Routine => "routine",
        }
    }
}

impl std::fmt::Display for RiskTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
