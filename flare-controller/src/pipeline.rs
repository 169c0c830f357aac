//! Alert Processing Pipeline
//!
//! The single ingestion path shared by the HTTP endpoint and the tier TLS
//! listeners: re-validate at the trust boundary, evaluate policy, dispatch
//! mitigation handlers, and install the urgent drop flow where the risk tier
//! calls for it.

use serde::Serialize;
use uuid::Uuid;

use flare_schema::{Alert, RiskTier, SchemaViolation};

use crate::flow::{FlowAction, FlowMatch, DROP_IDLE_TIMEOUT_SECS, MITIGATION_DROP_PRIORITY};
use crate::policy;
use crate::AppState;

/// Summary of one processed alert, returned to HTTP callers and logged for
/// tier-channel ingestion.
#[derive(Debug, Serialize)]
pub struct ProcessedAlert {
    pub alert_id: Uuid,
    pub tier: RiskTier,
    /// Receipt summaries, one per dispatched action.
    pub actions: Vec<String>,
    /// Datapaths a drop flow was installed on for an urgent alert.
    pub drop_flow_datapaths: usize,
}

/// Run one alert through validation, policy, dispatch and flow actuation.
///
/// The urgent drop flow shares its endpoint-pair match key with any
/// rate-limit entry installed for the same alert, so the drop (strictly
/// stronger, higher priority) replaces that entry in the bookkeeping.
pub async fn process_alert(
    state: &AppState,
    payload: &str,
) -> Result<ProcessedAlert, SchemaViolation> {
    let alert = Alert::from_json(payload)?;
    let tier = RiskTier::of(&alert);
    tracing::info!(
        "received alert {} ({tier}, confidence {:.4})",
        alert.alert_id,
        alert.classifier_confidence
    );

    let mitigations = policy::evaluate(&alert, &state.policy);
    if mitigations.is_empty() {
        tracing::info!("alert {}: no mitigation required", alert.alert_id);
    }
    let receipts = state.dispatcher.dispatch(&alert, &mitigations).await;

    // Urgent alerts additionally black-hole the offending endpoint pair on
    // every datapath, idempotently.
    let mut drop_flow_datapaths = 0;
    if tier == RiskTier::Urgent {
        let match_key = FlowMatch::new(alert.source_ip, alert.destination_ip);
        let results = state
            .flows
            .install_on_all(
                match_key,
                MITIGATION_DROP_PRIORITY,
                vec![FlowAction::Drop],
                DROP_IDLE_TIMEOUT_SECS,
                0,
            )
            .await;
        drop_flow_datapaths = results.iter().filter(|(_, r)| r.is_ok()).count();
        tracing::info!(
            "alert {}: mitigation drop flow {match_key} on {drop_flow_datapaths}/{} datapaths",
            alert.alert_id,
            results.len()
        );
    }

    Ok(ProcessedAlert {
        alert_id: alert.alert_id,
        tier,
        actions: receipts.iter().map(|r| r.summary()).collect(),
        drop_flow_datapaths,
    })
}
