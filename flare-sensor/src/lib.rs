//! FLARE Sensor
//!
//! The sampling process of the alert lifecycle pipeline: polls data-plane
//! counters on a fixed interval, classifies the feature vector, assembles and
//! validates an Alert, and delivers it over the risk-appropriate secure
//! channel. Classification and raw counter acquisition are external
//! collaborators behind the [`classifier::Classifier`] and
//! [`sampler::FeatureSampler`] seams.

pub mod channel;
pub mod classifier;
pub mod config;
pub mod factory;
pub mod pipeline;
pub mod sampler;
