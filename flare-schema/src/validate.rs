//! Alert Validation
//!
//! Schema contract enforcement for the Alert wire format. Runs at every
//! process boundary: once when the sensor emits an alert and again when the
//! controller ingests one. Total and side-effect-free; a violating alert is
//! dropped and never forwarded.

use thiserror::Error;

use crate::alert::Alert;

/// Violation of the Alert schema contract.
#[derive(Debug, Error)]
pub enum SchemaViolation {
    /// The payload is not a well-formed Alert object (missing field, unknown
    /// field, wrong type, unrecognized action tag).
    #[error("malformed alert: {0}")]
    Malformed(String),

    /// `classifier_confidence` outside [0.0, 1.0].
    #[error("classifier_confidence {0} outside [0.0, 1.0]")]
    ConfidenceOutOfRange(f64),
}

impl Alert {
    /// Parse and validate an Alert from its wire form.
    pub fn from_json(payload: &str) -> Result<Alert, SchemaViolation> {
        let alert: Alert = serde_json::from_str(payload)
            .map_err(|e| SchemaViolation::Malformed(e.to_string()))?;
        alert.validate()?;
        Ok(alert)
    }

    /// Check the value-level invariants the type system cannot express.
    ///
    /// Field presence, the fixed flag key set and the action tag set are
    /// already guaranteed by the typed parse; what remains is the confidence
    /// range.
    pub fn validate(&self) -> Result<(), SchemaViolation> {
        if !self.classifier_confidence.is_finite()
            || self.classifier_confidence < 0.0
            || self.classifier_confidence > 1.0
        {
            return Err(SchemaViolation::ConfidenceOutOfRange(
                self.classifier_confidence,
            ));
        }
        Ok(())
    }
}
