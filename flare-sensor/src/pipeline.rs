//! Sampling Pipeline
//!
//! The fixed-interval loop that drives sample → classify → build → validate →
//! route → send. The loop suspends only at the interval boundary; local
//! errors (classifier contract, schema) skip the tick, transport failures
//! drop the alert. There is no retry and no persistent queue.

use std::time::Duration;

use tokio::sync::watch;

use flare_schema::{Alert, RiskTier};

use crate::channel::{DeliveryResult, SecureChannelSync};
use crate::classifier::Classifier;
use crate::factory::AlertFactory;
use crate::sampler::FeatureSampler;

/// Outcome of one sampling tick, reported for observability and tests.
#[derive(Debug)]
pub enum TickOutcome {
    /// Nothing alert-worthy this tick.
    Quiet,
    /// Alert built and delivered.
    Sent { tier: RiskTier },
    /// Alert built but the channel reported a failure; the alert is gone.
    Dropped { tier: RiskTier },
    /// Tick skipped on a local error.
    Skipped,
}

/// One sampling process: sampler + frozen classifier + alert factory +
/// dual-channel sync.
pub struct SensorPipeline<S, C> {
    sampler: S,
    classifier: C,
    factory: AlertFactory,
    channels: SecureChannelSync,
    /// Positive predictions below this confidence are not worth signaling.
    send_confidence_threshold: f64,
}

impl<S, C> SensorPipeline<S, C>
where
    S: FeatureSampler,
    C: Classifier,
{
    pub fn new(
        sampler: S,
        classifier: C,
        factory: AlertFactory,
        channels: SecureChannelSync,
        send_confidence_threshold: f64,
    ) -> Self {
        Self {
            sampler,
            classifier,
            factory,
            channels,
            send_confidence_threshold,
        }
    }

    /// Run one tick of the pipeline.
    pub async fn tick(&mut self) -> TickOutcome {
        let features = match self.sampler.sample().await {
            Ok(fv) => fv,
            Err(e) => {
                log::warn!("sampling failed, tick skipped: {e}");
                return TickOutcome::Skipped;
            }
        };

        let prediction = self.classifier.predict(&features);
        log::debug!(
            "features {:?} -> label {} confidence {:.4}",
            features.as_slice(),
            prediction.label,
            prediction.confidence
        );

        if prediction.label != 1 || prediction.confidence <= self.send_confidence_threshold {
            return TickOutcome::Quiet;
        }

        let alert = match self.factory.build(&features, prediction) {
            Ok(alert) => alert,
            Err(e) => {
                log::error!("{e}; tick skipped");
                return TickOutcome::Skipped;
            }
        };

        // Same validation the controller applies at ingestion.
        if let Err(e) = alert.validate() {
            log::error!("built alert failed schema validation, dropped: {e}");
            return TickOutcome::Skipped;
        }

        self.route_and_send(alert).await
    }

    async fn route_and_send(&self, alert: Alert) -> TickOutcome {
        let tier = RiskTier::of(&alert);
        log::info!("{tier} alert {}", alert.alert_id);

        match self.channels.send(tier, &alert).await {
            DeliveryResult::Delivered { tier } => TickOutcome::Sent { tier },
            DeliveryResult::Failed { tier, error } => {
                log::warn!("alert {} dropped on {tier} tier: {error}", alert.alert_id);
                TickOutcome::Dropped { tier }
            }
        }
    }

    /// Run the sampling loop until `stop` flips, then release the channels
    /// within the grace period.
    pub async fn run(
        mut self,
        interval: Duration,
        shutdown_grace: Duration,
        mut stop: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        log::info!("sampling loop started (interval {interval:?})");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = stop.changed() => {
                    if *stop.borrow() {
                        break;
                    }
                }
            }
        }

        log::info!("sampling loop stopping");
        self.channels.shutdown(shutdown_grace).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{AlertTransport, TransportError};
    use crate::classifier::ThresholdClassifier;
    use crate::sampler::{FeatureVector, SampleError, SyntheticSampler};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingTransport {
        frames: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AlertTransport for RecordingTransport {
        async fn deliver(&mut self, frame: &str) -> Result<(), TransportError> {
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    fn channels_with(
        urgent: Arc<Mutex<Vec<String>>>,
        routine: Arc<Mutex<Vec<String>>>,
    ) -> SecureChannelSync {
        SecureChannelSync::start(
            RecordingTransport { frames: urgent },
            RecordingTransport { frames: routine },
        )
    }

    struct RstBurstSampler;

    #[async_trait]
    impl FeatureSampler for RstBurstSampler {
        async fn sample(&mut self) -> Result<FeatureVector, SampleError> {
            Ok(FeatureVector::new(3, 0, 0))
        }
    }

    #[tokio::test]
    async fn test_rst_burst_end_to_end_tick() {
        let urgent = Arc::new(Mutex::new(Vec::new()));
        let routine = Arc::new(Mutex::new(Vec::new()));

        let mut pipeline = SensorPipeline::new(
            RstBurstSampler,
            ThresholdClassifier::default(),
            AlertFactory::new("TCP"),
            channels_with(urgent.clone(), routine.clone()),
            0.85,
        );

        let outcome = pipeline.tick().await;
        assert!(matches!(
            outcome,
            TickOutcome::Sent {
                tier: RiskTier::Urgent
            }
        ));

        // RST flag forces the urgent tier regardless of confidence.
        assert_eq!(urgent.lock().unwrap().len(), 1);
        assert!(routine.lock().unwrap().is_empty());

        let line = urgent.lock().unwrap()[0].clone();
        let alert = Alert::from_json(&line).unwrap();
        assert!(alert.flags.rst);
        assert!(!alert.flags.fin);
        assert!(!alert.flags.frag);
        assert_eq!(
            alert.recommended_action,
            flare_schema::RecommendedAction::RateLimit
        );
    }

    struct HangingTransport;

    #[async_trait]
    impl AlertTransport for HangingTransport {
        async fn deliver(&mut self, _frame: &str) -> Result<(), TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_tick_completes_when_tier_endpoint_hangs() {
        let routine = Arc::new(Mutex::new(Vec::new()));
        let channels = SecureChannelSync::start_with_timeout(
            HangingTransport,
            RecordingTransport { frames: routine },
            Duration::from_millis(50),
        );

        let mut pipeline = SensorPipeline::new(
            RstBurstSampler,
            ThresholdClassifier::default(),
            AlertFactory::new("TCP"),
            channels,
            0.85,
        );

        // The urgent endpoint never responds; the tick must still return
        // within the delivery bound, reporting the drop.
        let outcome = tokio::time::timeout(Duration::from_secs(2), pipeline.tick())
            .await
            .expect("tick must not stall on a hung tier endpoint");
        assert!(matches!(
            outcome,
            TickOutcome::Dropped {
                tier: RiskTier::Urgent
            }
        ));
    }

    #[tokio::test]
    async fn test_quiet_tick_sends_nothing() {
        let urgent = Arc::new(Mutex::new(Vec::new()));
        let routine = Arc::new(Mutex::new(Vec::new()));

        let mut pipeline = SensorPipeline::new(
            SyntheticSampler::new(),
            ThresholdClassifier::default(),
            AlertFactory::new("TCP"),
            channels_with(urgent.clone(), routine.clone()),
            0.85,
        );

        // First synthetic tick is quiet.
        let outcome = pipeline.tick().await;
        assert!(matches!(outcome, TickOutcome::Quiet));
        assert!(urgent.lock().unwrap().is_empty());
        assert!(routine.lock().unwrap().is_empty());
    }
}
