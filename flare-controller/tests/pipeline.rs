//! End-to-end pipeline tests: ingestion payload through validation, policy
//! evaluation, dispatch and flow actuation against a recording programmer.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use flare_controller::dispatch::{ActionDispatcher, FlowMitigationHandlers};
use flare_controller::flow::{
    ActuationError, DatapathId, FlowAction, FlowMatch, FlowProgrammer, FlowTableManager,
};
use flare_controller::pipeline::process_alert;
use flare_controller::policy::{FlagName, PolicyActionKind, PolicyRule};
use flare_controller::AppState;
use flare_schema::RiskTier;

#[derive(Default)]
struct RecordingProgrammer {
    installs: Mutex<Vec<(DatapathId, FlowMatch, u16, Vec<FlowAction>)>>,
}

#[async_trait]
impl FlowProgrammer for RecordingProgrammer {
    async fn install_flow(
        &self,
        datapath_id: DatapathId,
        match_key: FlowMatch,
        priority: u16,
        actions: &[FlowAction],
        _idle_timeout: u32,
        _hard_timeout: u32,
    ) -> Result<(), ActuationError> {
        self.installs
            .lock()
            .unwrap()
            .push((datapath_id, match_key, priority, actions.to_vec()));
        Ok(())
    }

    async fn remove_flow(
        &self,
        _datapath_id: DatapathId,
        _match_key: FlowMatch,
    ) -> Result<(), ActuationError> {
        Ok(())
    }
}

async fn state_with_rst_rule(
    programmer: Arc<RecordingProgrammer>,
) -> AppState {
    let flows = Arc::new(FlowTableManager::new(programmer));
    flows.datapath_connected(1).await.unwrap();

    let rules = vec![PolicyRule {
        action: PolicyActionKind::RateLimitFlag,
        flag: Some(FlagName::RST),
        rate: Some(100),
        frag_type: None,
    }];

    AppState {
        policy: Arc::new(rules),
        dispatcher: Arc::new(ActionDispatcher::new(Arc::new(
            FlowMitigationHandlers::new(flows.clone()),
        ))),
        flows,
    }
}

/// Alert as the sensor would emit it for feature vector [RST=3, FIN=0,
/// FRAG=0] with classifier output (1, 0.92).
fn rst_alert_json() -> String {
    r#"{
        "alert_id": "e7b3f13e-1234-45ab-b123-1234567890ab",
        "timestamp": "2025-07-05T12:34:56Z",
        "source_ip": "192.168.1.10",
        "destination_ip": "10.0.0.5",
        "protocol": "TCP",
        "flags": {"RST": true, "FIN": false, "SYN": false, "FRAG": false},
        "classifier_confidence": 0.92,
        "recommended_action": "RATE_LIMIT"
    }"#
    .to_string()
}

#[tokio::test]
async fn test_rst_alert_end_to_end() {
    let programmer = Arc::new(RecordingProgrammer::default());
    let state = state_with_rst_rule(programmer.clone()).await;

    let processed = process_alert(&state, &rst_alert_json()).await.unwrap();

    // Routed urgent (RST flag), and the single RST rule fired exactly once.
    assert_eq!(processed.tier, RiskTier::Urgent);
    assert_eq!(processed.actions.len(), 1);
    assert!(processed.actions[0].contains("rate limit RST @ 100"));
    assert_eq!(processed.drop_flow_datapaths, 1);

    // Programmer saw: table-miss at connect, the rate-limit entry, and the
    // urgent drop flow.
    let installs = programmer.installs.lock().unwrap();
    assert_eq!(installs.len(), 3);
    assert_eq!(installs[0].2, 0);
    assert_eq!(installs[1].3, vec![FlowAction::RateLimit { rate: 100 }]);
    assert_eq!(installs[2].3, vec![FlowAction::Drop]);
}

#[tokio::test]
async fn test_duplicate_alert_keeps_single_entry_per_key() {
    let programmer = Arc::new(RecordingProgrammer::default());
    let state = state_with_rst_rule(programmer.clone()).await;

    process_alert(&state, &rst_alert_json()).await.unwrap();
    process_alert(&state, &rst_alert_json()).await.unwrap();

    // The rate-limit entry and the urgent drop flow share the endpoint-pair
    // key, and the second alert refreshes rather than duplicates: one
    // bookkeeping entry survives, carrying the final (drop) install.
    let entries = state.flows.active_entries().await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actions, vec![FlowAction::Drop]);
}

#[tokio::test]
async fn test_schema_violation_forwards_nothing() {
    let programmer = Arc::new(RecordingProgrammer::default());
    let state = state_with_rst_rule(programmer.clone()).await;

    let missing_confidence = rst_alert_json().replace(r#""classifier_confidence": 0.92,"#, "");
    assert!(process_alert(&state, &missing_confidence).await.is_err());

    // Only the connect-time table-miss install happened.
    assert_eq!(programmer.installs.lock().unwrap().len(), 1);
    assert!(state.flows.active_entries().await.is_empty());
}

#[tokio::test]
async fn test_routine_alert_without_matches_is_processed_quietly() {
    let programmer = Arc::new(RecordingProgrammer::default());
    let state = state_with_rst_rule(programmer.clone()).await;

    let routine = rst_alert_json()
        .replace(r#""RST": true"#, r#""RST": false"#)
        .replace("0.92", "0.5")
        .replace("RATE_LIMIT", "NO_ACTION");

    let processed = process_alert(&state, &routine).await.unwrap();
    assert_eq!(processed.tier, RiskTier::Routine);
    assert!(processed.actions.is_empty());
    assert_eq!(processed.drop_flow_datapaths, 0);
    assert!(state.flows.active_entries().await.is_empty());
}

#[tokio::test]
async fn test_state_flush_removes_destination_entries() {
    let programmer = Arc::new(RecordingProgrammer::default());
    let state = state_with_rst_rule(programmer.clone()).await;

    // First alert installs an entry toward 10.0.0.5.
    process_alert(&state, &rst_alert_json()).await.unwrap();
    assert_eq!(state.flows.active_entries().await.len(), 1);

    // A STATE_FLUSH recommendation for the same destination clears them.
    let flush = rst_alert_json()
        .replace(r#""RST": true"#, r#""RST": false"#)
        .replace("RATE_LIMIT", "STATE_FLUSH")
        .replace("0.92", "0.5");
    let processed = process_alert(&state, &flush).await.unwrap();

    assert_eq!(processed.actions.len(), 1);
    assert!(processed.actions[0].contains("state flushed for destination 10.0.0.5"));
    assert!(state.flows.active_entries().await.is_empty());
}
