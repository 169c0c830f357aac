//! FLARE Controller Process
//!
//! Startup order matters: the mitigation policy is loaded first and is the
//! only fatal failure class; operating under an undefined policy is unsafe.
//! Datapaths are then registered (table-miss rules installed), the tier TLS
//! listeners spawned, and finally the HTTP ingestion server runs until
//! interrupted.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flare_controller::dispatch::{ActionDispatcher, FlowMitigationHandlers};
use flare_controller::flow::FlowTableManager;
use flare_controller::pusher::RestFlowPusher;
use flare_controller::{config, handlers, listener, policy, AppState};
use flare_schema::RiskTier;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flare_controller=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = config::Config::from_env();

    tracing::info!("FLARE controller starting...");

    // Fatal: the controller must not run under an undefined policy.
    let rules = match policy::load_policy(&config.policy_path) {
        Ok(rules) => {
            tracing::info!("loaded {} mitigation policy rules", rules.len());
            rules
        }
        Err(e) => {
            tracing::error!("{e}");
            std::process::exit(1);
        }
    };

    let pusher = match RestFlowPusher::new(&config.pusher_url) {
        Ok(pusher) => pusher,
        Err(e) => {
            tracing::error!("flow pusher setup failed: {e}");
            std::process::exit(1);
        }
    };

    let flows = Arc::new(FlowTableManager::new(Arc::new(pusher)));
    for datapath in &config.datapaths {
        // A datapath that refuses its table-miss rule stays non-active;
        // reported here, retried on its next connection event.
        if let Err(e) = flows.datapath_connected(*datapath).await {
            tracing::warn!("datapath {datapath} registration failed: {e}");
        }
    }

    let dispatcher = Arc::new(ActionDispatcher::new(Arc::new(
        FlowMitigationHandlers::new(flows.clone()),
    )));

    let state = AppState {
        policy: Arc::new(rules),
        dispatcher,
        flows,
    };

    // Tier listeners: independent failure domains, one task each.
    for (tier, tier_config) in [
        (RiskTier::Urgent, config.urgent.clone()),
        (RiskTier::Routine, config.routine.clone()),
    ] {
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(e) = listener::run_tier_listener(tier, tier_config, state).await {
                tracing::error!("{tier} tier listener failed: {e:#}");
            }
        });
    }

    let app = create_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("HTTP ingestion listening on http://{addr}");

    let http = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("bind {addr} failed: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(http, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("server error: {e}");
    }
    tracing::info!("FLARE controller stopped");
}

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::check))
        .route("/alert", post(handlers::alert::receive))
        .route("/flows", get(handlers::flows::list))
        .route("/datapaths", get(handlers::flows::datapaths))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("signal handler failed: {e}");
    }
    tracing::info!("shutdown requested");
}
