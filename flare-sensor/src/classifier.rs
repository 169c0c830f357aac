//! Classifier Seam
//!
//! The classification ensemble is trained and frozen elsewhere; the pipeline
//! only sees `predict`. The bundled threshold classifier is the stand-in used
//! by the demo loop and by tests.

use crate::sampler::FeatureVector;

/// Output of the frozen classifier for one feature vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// 1 = malicious pattern, 0 = benign.
    pub label: u8,
    /// Model confidence. The contract requires [0.0, 1.0]; the alert factory
    /// enforces it.
    pub confidence: f64,
}

/// Frozen `predict(features) -> (label, confidence)` collaborator.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> Prediction;
}

/// Stand-in classifier: positive when any monitored counter crosses a fixed
/// burst threshold, confidence scaled by how far past the threshold the
/// largest counter is.
pub struct ThresholdClassifier {
    pub burst_threshold: u64,
}

impl Default for ThresholdClassifier {
    fn default() -> Self {
        Self { burst_threshold: 2 }
    }
}

impl Classifier for ThresholdClassifier {
    fn predict(&self, features: &FeatureVector) -> Prediction {
        let peak = features.as_slice().iter().copied().max().unwrap_or(0);
        if peak > self.burst_threshold {
            let over = (peak - self.burst_threshold) as f64;
            Prediction {
                label: 1,
                confidence: (0.85 + over * 0.05).min(0.99),
            }
        } else {
            Prediction {
                label: 0,
                confidence: 0.6,
            }
        }
    }
}
