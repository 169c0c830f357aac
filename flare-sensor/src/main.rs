//! FLARE Sensor Process
//!
//! Wires the sampling pipeline to the configured tier channels and runs it
//! until interrupted. The binary ships with the synthetic sampler and the
//! stand-in threshold classifier; a deployment substitutes its own
//! `FeatureSampler`/`Classifier` implementations through the library API.

use std::time::Duration;

use tokio::sync::watch;

use flare_sensor::channel::SecureChannelSync;
use flare_sensor::classifier::ThresholdClassifier;
use flare_sensor::config::SensorConfig;
use flare_sensor::factory::AlertFactory;
use flare_sensor::pipeline::SensorPipeline;
use flare_sensor::sampler::SyntheticSampler;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SensorConfig::from_env();
    log::info!(
        "FLARE sensor starting (urgent {}, routine {})",
        config.urgent.endpoint(),
        config.routine.endpoint()
    );

    probe_controller(&config.controller_url).await;

    let channels = match SecureChannelSync::connect_tls(&config.urgent, &config.routine) {
        Ok(channels) => channels,
        Err(e) => {
            log::error!("tier channel setup failed: {e}");
            std::process::exit(1);
        }
    };

    let pipeline = SensorPipeline::new(
        SyntheticSampler::new(),
        ThresholdClassifier::default(),
        AlertFactory::new("TCP"),
        channels,
        config.send_confidence_threshold,
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    let loop_task = tokio::spawn(pipeline.run(
        config.sample_interval,
        config.shutdown_grace,
        stop_rx,
    ));

    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("signal handler failed: {e}");
    }
    log::info!("shutdown requested");
    let _ = stop_tx.send(true);

    let _ = loop_task.await;
    log::info!("FLARE sensor stopped");
}

/// Best-effort controller reachability probe. A failure is logged, not
/// fatal: the controller may come up after the sensor.
async fn probe_controller(base_url: &str) {
    let client = match reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            log::warn!("health probe client setup failed: {e}");
            return;
        }
    };

    match client.get(format!("{base_url}/health")).send().await {
        Ok(res) if res.status().is_success() => {
            log::info!("controller healthy at {base_url}");
        }
        Ok(res) => log::warn!("controller health probe returned {}", res.status()),
        Err(e) => log::warn!("controller not reachable yet: {e}"),
    }
}
