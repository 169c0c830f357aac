//! Feature Sampling
//!
//! Builds one FeatureVector per sampling tick from data-plane counters. The
//! actual register acquisition lives behind the [`CounterReader`] seam; the
//! monitored register set and its order are fixed.

use async_trait::async_trait;
use thiserror::Error;

/// Monitored flag counters, in feature-vector order.
pub const MONITORED_REGISTERS: [&str; 3] = ["rst_count", "fin_count", "frag_count"];

/// One sample of the monitored flag counters. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureVector {
    counts: [u64; 3],
}

impl FeatureVector {
    pub fn new(rst: u64, fin: u64, frag: u64) -> Self {
        Self {
            counts: [rst, fin, frag],
        }
    }

    pub fn rst(&self) -> u64 {
        self.counts[0]
    }

    pub fn fin(&self) -> u64 {
        self.counts[1]
    }

    pub fn frag(&self) -> u64 {
        self.counts[2]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.counts
    }
}

#[derive(Debug, Error)]
pub enum SampleError {
    #[error("counter read failed for {register}: {reason}")]
    CounterRead { register: String, reason: String },
}

/// External collaborator: reads one stateful counter from the data plane.
#[async_trait]
pub trait CounterReader: Send + Sync {
    /// Sum of all cells of the named register on the monitored datapath.
    async fn read_counter(&self, register: &str) -> Result<u64, SampleError>;
}

/// Produces one FeatureVector per sampling tick.
#[async_trait]
pub trait FeatureSampler: Send {
    async fn sample(&mut self) -> Result<FeatureVector, SampleError>;
}

/// Samples the monitored registers through a [`CounterReader`].
pub struct RegisterSampler<R: CounterReader> {
    reader: R,
}

impl<R: CounterReader> RegisterSampler<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: CounterReader> FeatureSampler for RegisterSampler<R> {
    async fn sample(&mut self) -> Result<FeatureVector, SampleError> {
        let mut counts = [0u64; 3];
        for (slot, register) in counts.iter_mut().zip(MONITORED_REGISTERS) {
            *slot = self.reader.read_counter(register).await?;
        }
        Ok(FeatureVector {
            counts,
        })
    }
}

/// Deterministic sampler for the demo/soak loop: emits a repeating pattern of
/// quiet ticks and RST bursts.
pub struct SyntheticSampler {
    tick: u64,
}

impl SyntheticSampler {
    pub fn new() -> Self {
        Self { tick: 0 }
    }
}

impl Default for SyntheticSampler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeatureSampler for SyntheticSampler {
    async fn sample(&mut self) -> Result<FeatureVector, SampleError> {
        self.tick += 1;
        // Every third tick looks like an RST flood.
        let fv = if self.tick % 3 == 0 {
            FeatureVector::new(3, 0, 0)
        } else {
            FeatureVector::new(0, 0, 0)
        };
        Ok(fv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedReader;

    #[async_trait]
    impl CounterReader for FixedReader {
        async fn read_counter(&self, register: &str) -> Result<u64, SampleError> {
            Ok(match register {
                "rst_count" => 3,
                "fin_count" => 1,
                "frag_count" => 0,
                other => {
                    return Err(SampleError::CounterRead {
                        register: other.to_string(),
                        reason: "unknown register".to_string(),
                    })
                }
            })
        }
    }

    #[tokio::test]
    async fn test_register_sampler_preserves_order() {
        let mut sampler = RegisterSampler::new(FixedReader);
        let fv = sampler.sample().await.unwrap();
        assert_eq!(fv.as_slice(), &[3, 1, 0]);
        assert_eq!(fv.rst(), 3);
        assert_eq!(fv.fin(), 1);
        assert_eq!(fv.frag(), 0);
    }

    #[tokio::test]
    async fn test_synthetic_sampler_bursts() {
        let mut sampler = SyntheticSampler::new();
        let first = sampler.sample().await.unwrap();
        let second = sampler.sample().await.unwrap();
        let third = sampler.sample().await.unwrap();
        assert_eq!(first.rst(), 0);
        assert_eq!(second.rst(), 0);
        assert_eq!(third.rst(), 3);
    }
}
